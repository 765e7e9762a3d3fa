//! Deployment lifecycle notifications

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::deploy::git::AuthorLookup;
use crate::deploy::ExitStatus;
use crate::slack::client::{ChatContent, ChatPoster};
use crate::slack::interactions::get_slack_blocks_for_deployment;
use crate::storage::deploy_info::{DeployInfo, NotifyEvent};
use crate::utils::{current_user, host_name, short_sha};

/// Where a run was started from, for message footers
#[derive(Debug, Clone, Default)]
pub struct UrlContext {
    /// CI build URL, when running under CI
    pub build_url: Option<String>,
    pub user: String,
    pub host: String,
}

impl UrlContext {
    /// Capture `BUILD_URL`, the invoking user and the host name
    pub fn from_env() -> Self {
        Self {
            build_url: std::env::var("BUILD_URL").ok().filter(|u| !u.is_empty()),
            user: current_user(),
            host: host_name(),
        }
    }
}

/// Collaborators of the notifier
#[derive(Clone)]
pub struct NotifierDeps {
    pub poster: Arc<dyn ChatPoster>,
    pub authors: Arc<dyn AuthorLookup>,
    pub url_context: UrlContext,

    /// Channels used when the service lists none
    pub default_channels: Vec<String>,
}

/// Format space separated usernames as Slack mentions
pub fn format_authors(authors: &str) -> String {
    let mentions: Vec<String> = authors
        .split_whitespace()
        .map(|author| format!("<@{}>", author))
        .collect();
    format!("Authors: {}", mentions.join(", "))
}

/// Posts deployment lifecycle messages, gated by the service's pipeline
/// configuration
pub struct SlackDeployNotifier {
    service: String,
    deploy_info: DeployInfo,
    deploy_group: String,
    commit: String,
    old_commit: Option<String>,
    git_url: String,
    auto_rollback: bool,
    channels: Vec<String>,
    deps: NotifierDeps,
}

impl SlackDeployNotifier {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        service: &str,
        deploy_info: DeployInfo,
        deploy_group: &str,
        commit: &str,
        old_commit: Option<&str>,
        git_url: &str,
        auto_rollback: bool,
        deps: NotifierDeps,
    ) -> Self {
        let channels = if deploy_info.slack_channels.is_empty() {
            deps.default_channels.clone()
        } else {
            deploy_info.slack_channels.clone()
        };

        Self {
            service: service.to_string(),
            deploy_info,
            deploy_group: deploy_group.to_string(),
            commit: commit.to_string(),
            old_commit: old_commit.map(str::to_string),
            git_url: git_url.to_string(),
            auto_rollback,
            channels,
            deps,
        }
    }

    fn should_notify(&self, event: NotifyEvent) -> bool {
        // Re-marking the running commit is a no-op worth no message
        if self.old_commit.as_deref() == Some(self.commit.as_str()) {
            return false;
        }
        self.deploy_info
            .step(&self.deploy_group)
            .map(|step| step.should_notify(event))
            .unwrap_or(false)
    }

    fn old_commit_label(&self) -> &str {
        self.old_commit.as_deref().map(short_sha).unwrap_or("(none)")
    }

    pub async fn get_authors_to_be_notified(&self) -> String {
        let old_commit = self.old_commit.as_deref().unwrap_or("");
        let (status, authors) = self
            .deps
            .authors
            .get_authors(&self.git_url, old_commit, &self.commit)
            .await;
        if status != 0 {
            debug!("Author lookup exited with {}, output: {:?}", status, authors);
        }
        format_authors(&authors)
    }

    pub fn get_url_message(&self) -> String {
        match &self.deps.url_context.build_url {
            Some(build_url) => format!("<{}/consoleFull|Jenkins Job>", build_url.trim_end_matches('/')),
            None => format!(
                "(Run by <@{}> on {})",
                self.deps.url_context.user, self.deps.url_context.host
            ),
        }
    }

    async fn send(&self, content: ChatContent) {
        if self.channels.is_empty() {
            debug!("No channels configured for {}, not notifying", self.service);
            return;
        }
        match self.deps.poster.post(&self.channels, &content).await {
            Ok(results) => {
                let failed = results.iter().filter(|r| !r.ok).count();
                if failed > 0 {
                    error!("{} of {} Slack posts failed", failed, results.len());
                }
            }
            Err(e) => error!("Failed to post Slack notification for {}: {}", self.service, e),
        }
    }

    async fn compose(&self, headline: String) -> String {
        format!(
            "{}\n{}\n{}",
            headline,
            self.get_authors_to_be_notified().await,
            self.get_url_message()
        )
    }

    pub async fn notify_after_mark(&self, ret: ExitStatus) {
        if !self.should_notify(NotifyEvent::AfterMark) {
            return;
        }

        if ret.is_success() {
            let message = self
                .compose(format!(
                    "*{}* - Marked *{}* for deployment on *{}*.",
                    self.service,
                    short_sha(&self.commit),
                    self.deploy_group
                ))
                .await;
            let content = if self.auto_rollback {
                ChatContent::with_blocks(message.clone(), get_slack_blocks_for_deployment(&message))
            } else {
                ChatContent::text(message)
            };
            self.send(content).await;
        } else {
            let message = self
                .compose(format!(
                    "*{}* - mark-for-deployment failed on *{}* for *{}*.",
                    self.service,
                    self.deploy_group,
                    short_sha(&self.commit)
                ))
                .await;
            self.send(ChatContent::text(message)).await;
        }
    }

    pub async fn notify_after_good_deploy(&self) {
        if !self.should_notify(NotifyEvent::AfterGoodDeploy) {
            return;
        }
        let message = self
            .compose(format!(
                "*{}* - Finished deployment of *{}* to *{}*.",
                self.service,
                short_sha(&self.commit),
                self.deploy_group
            ))
            .await;
        self.send(ChatContent::text(message)).await;
    }

    pub async fn notify_after_auto_rollback(&self) {
        if !self.should_notify(NotifyEvent::AfterAutoRollback) {
            return;
        }
        info!("Notifying about rollback of {} in {}", self.service, self.deploy_group);
        let message = self
            .compose(format!(
                "*{}* - Deployment of *{}* to *{}* *failed*! Rolled back to *{}*.",
                self.service,
                short_sha(&self.commit),
                self.deploy_group,
                self.old_commit_label()
            ))
            .await;
        self.send(ChatContent::text(message)).await;
    }

    pub async fn notify_after_abort(&self) {
        if !self.should_notify(NotifyEvent::AfterAbort) {
            return;
        }
        let message = self
            .compose(format!(
                "*{}* - Deployment of *{}* to *{}* *aborted*, but was not rolled back. \
                 Roll back to *{}* manually if needed.",
                self.service,
                short_sha(&self.commit),
                self.deploy_group,
                self.old_commit_label()
            ))
            .await;
        self.send(ChatContent::text(message)).await;
    }
}
