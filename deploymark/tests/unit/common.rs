//! Hand-written fakes for the control loop collaborators

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use deploymark::deploy::control::{ControlLoopDeps, ControlLoopParams};
use deploymark::deploy::fleet::{ConvergenceWaiter, DeployedShaLookup};
use deploymark::deploy::git::AuthorLookup;
use deploymark::deploy::mutator::MarkForDeployment;
use deploymark::deploy::ExitStatus;
use deploymark::errors::{DeployError, WaitError};
use deploymark::slack::client::{ChatContent, ChatPoster, PostResult};
use deploymark::slack::notifier::{NotifierDeps, UrlContext};
use deploymark::storage::deploy_info::{DeployInfo, PipelineStep};

pub const NEW_SHA: &str = "1111111111111111111111111111111111111111";
pub const OLD_SHA: &str = "2222222222222222222222222222222222222222";

/// Records marked commits and replays scripted results
#[derive(Default)]
pub struct FakeMarker {
    results: Mutex<VecDeque<ExitStatus>>,
    pub marked: Mutex<Vec<String>>,
}

impl FakeMarker {
    pub fn with_results(results: &[ExitStatus]) -> Self {
        Self {
            results: Mutex::new(results.iter().copied().collect()),
            marked: Mutex::new(Vec::new()),
        }
    }

    pub fn marked(&self) -> Vec<String> {
        self.marked.lock().unwrap().clone()
    }
}

#[async_trait]
impl MarkForDeployment for FakeMarker {
    async fn mark(&self, _service: &str, _deploy_group: &str, commit: &str, _git_url: &str) -> ExitStatus {
        self.marked.lock().unwrap().push(commit.to_string());
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ExitStatus::Success)
    }
}

/// Returns a fixed outcome, or never returns when `hang` is set
pub struct FakeWaiter {
    outcome: Result<(), WaitError>,
    hang: bool,
    pub calls: AtomicUsize,
}

impl FakeWaiter {
    pub fn returning(outcome: Result<(), WaitError>) -> Self {
        Self {
            outcome,
            hang: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn hanging() -> Self {
        Self {
            outcome: Ok(()),
            hang: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConvergenceWaiter for FakeWaiter {
    async fn wait(&self, _deploy_group: &str, _commit: &str, _timeout: Duration) -> Result<(), WaitError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            std::future::pending::<()>().await;
        }
        self.outcome.clone()
    }
}

pub struct FakeDeployedSha {
    sha: Option<String>,
    pub calls: AtomicUsize,
}

impl FakeDeployedSha {
    pub fn new(sha: Option<&str>) -> Self {
        Self {
            sha: sha.map(str::to_string),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DeployedShaLookup for FakeDeployedSha {
    async fn currently_deployed_sha(&self, _deploy_group: &str) -> Result<Option<String>, DeployError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.sha.clone())
    }
}

/// Keeps every posted message
#[derive(Default)]
pub struct RecordingPoster {
    pub posts: Mutex<Vec<(Vec<String>, ChatContent)>>,
}

impl RecordingPoster {
    pub fn count(&self) -> usize {
        self.posts.lock().unwrap().len()
    }

    pub fn texts(&self) -> Vec<String> {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .map(|(_, content)| content.text.clone())
            .collect()
    }
}

#[async_trait]
impl ChatPoster for RecordingPoster {
    async fn post(&self, channels: &[String], content: &ChatContent) -> Result<Vec<PostResult>, DeployError> {
        self.posts
            .lock()
            .unwrap()
            .push((channels.to_vec(), content.clone()));
        Ok(channels
            .iter()
            .map(|channel| PostResult {
                ok: true,
                error: None,
                channel: Some(channel.clone()),
                ts: Some("1.0".to_string()),
            })
            .collect())
    }
}

/// Fails every post, as when Slack is unreachable
#[derive(Default)]
pub struct FailingPoster {
    pub calls: AtomicUsize,
}

#[async_trait]
impl ChatPoster for FailingPoster {
    async fn post(&self, _channels: &[String], _content: &ChatContent) -> Result<Vec<PostResult>, DeployError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(DeployError::HttpStatus {
            status: 503,
            body: "slack is down".to_string(),
        })
    }
}

/// `git log` failing, with whatever it printed
pub struct FailingAuthors;

#[async_trait]
impl AuthorLookup for FailingAuthors {
    async fn get_authors(&self, _git_url: &str, _old_commit: &str, _commit: &str) -> (i32, String) {
        (128, "carol".to_string())
    }
}

pub struct FakeAuthors;

#[async_trait]
impl AuthorLookup for FakeAuthors {
    async fn get_authors(&self, _git_url: &str, _old_commit: &str, _commit: &str) -> (i32, String) {
        (0, "alice bob".to_string())
    }
}

pub fn deploy_info(step: PipelineStep) -> DeployInfo {
    DeployInfo {
        pipeline: vec![step],
        slack_channels: vec!["#deploys".to_string()],
        git_url: None,
    }
}

pub fn notifying_step() -> PipelineStep {
    PipelineStep {
        slack_notify: Some(true),
        ..PipelineStep::new("prod.everything")
    }
}

pub fn url_context() -> UrlContext {
    UrlContext {
        build_url: None,
        user: "deployer".to_string(),
        host: "build01".to_string(),
    }
}

pub fn notifier_deps(poster: Arc<RecordingPoster>) -> NotifierDeps {
    NotifierDeps {
        poster,
        authors: Arc::new(FakeAuthors),
        url_context: url_context(),
        default_channels: Vec::new(),
    }
}

pub fn params(block: bool, auto_rollback: bool) -> ControlLoopParams {
    ControlLoopParams {
        service: "web".to_string(),
        deploy_group: "prod.everything".to_string(),
        commit: NEW_SHA.to_string(),
        old_commit: Some(OLD_SHA.to_string()),
        git_url: "git@git:services/web".to_string(),
        block,
        auto_rollback,
        timeout: Duration::from_secs(60),
    }
}

pub struct Harness {
    pub marker: Arc<FakeMarker>,
    pub waiter: Arc<FakeWaiter>,
    pub deployed: Arc<FakeDeployedSha>,
    pub poster: Arc<RecordingPoster>,
}

impl Harness {
    pub fn new(marker: FakeMarker, waiter: FakeWaiter, deployed: FakeDeployedSha) -> Self {
        Self {
            marker: Arc::new(marker),
            waiter: Arc::new(waiter),
            deployed: Arc::new(deployed),
            poster: Arc::new(RecordingPoster::default()),
        }
    }

    pub fn deps(&self) -> ControlLoopDeps {
        ControlLoopDeps {
            marker: self.marker.clone(),
            waiter: self.waiter.clone(),
            deployed: self.deployed.clone(),
            notifier: notifier_deps(self.poster.clone()),
        }
    }
}
