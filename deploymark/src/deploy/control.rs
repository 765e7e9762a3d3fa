//! Mark-for-deployment control loop
//!
//! Writes the desired-state ref, optionally waits for the fleet to converge,
//! and rolls the ref back to the previous commit when the wait ends in a way
//! that warrants it. A rollback is fire-and-forget: the loop does not wait
//! for the previous commit to converge again.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tracing::{error, info, warn};

use crate::deploy::fleet::{ConvergenceWaiter, DeployedShaLookup};
use crate::deploy::fsm::{ControlLoopEvent, ControlLoopFsm, ControlLoopState};
use crate::deploy::mutator::MarkForDeployment;
use crate::deploy::ExitStatus;
use crate::errors::WaitError;
use crate::slack::notifier::{NotifierDeps, SlackDeployNotifier};
use crate::storage::deploy_info::DeployInfo;
use crate::utils::short_sha;

/// Future that resolves when the operator cancels the wait
pub type CancelSignal = BoxFuture<'static, ()>;

/// What to mark and how to follow up
#[derive(Debug, Clone)]
pub struct ControlLoopParams {
    pub service: String,
    pub deploy_group: String,
    pub commit: String,

    /// Rollback target; `None` when the deploy group was never deployed
    pub old_commit: Option<String>,
    pub git_url: String,

    /// Wait for the fleet to converge after marking
    pub block: bool,

    /// Restore `old_commit` when the wait is cancelled or times out
    pub auto_rollback: bool,
    pub timeout: Duration,
}

/// Collaborators of one control loop run
#[derive(Clone)]
pub struct ControlLoopDeps {
    pub marker: Arc<dyn MarkForDeployment>,
    pub waiter: Arc<dyn ConvergenceWaiter>,
    pub deployed: Arc<dyn DeployedShaLookup>,
    pub notifier: NotifierDeps,
}

/// Whether a failed wait should revert the desired state.
///
/// Cancellation always does (with auto-rollback on). A timeout does unless
/// the deploy group already runs `commit`. Other wait failures never do.
pub fn should_roll_back(
    error: &WaitError,
    auto_rollback: bool,
    deployed_sha: Option<&str>,
    commit: &str,
) -> bool {
    if !auto_rollback {
        return false;
    }
    match error {
        WaitError::Cancelled => true,
        WaitError::Timeout(_) => deployed_sha != Some(commit),
        WaitError::Failed(_) => false,
    }
}

/// Single-pass mark → wait → rollback state machine
pub struct DeploymentControlLoop {
    params: ControlLoopParams,
    fsm: ControlLoopFsm,
    marker: Arc<dyn MarkForDeployment>,
    waiter: Arc<dyn ConvergenceWaiter>,
    deployed: Arc<dyn DeployedShaLookup>,
    notifier: SlackDeployNotifier,
}

impl DeploymentControlLoop {
    pub fn new(params: ControlLoopParams, deploy_info: DeployInfo, deps: ControlLoopDeps) -> Self {
        let notifier = SlackDeployNotifier::new(
            &params.service,
            deploy_info,
            &params.deploy_group,
            &params.commit,
            params.old_commit.as_deref(),
            &params.git_url,
            params.auto_rollback,
            deps.notifier,
        );

        Self {
            params,
            fsm: ControlLoopFsm::new(),
            marker: deps.marker,
            waiter: deps.waiter,
            deployed: deps.deployed,
            notifier,
        }
    }

    /// Get current state
    pub fn state(&self) -> ControlLoopState {
        self.fsm.state()
    }

    /// Why the deploy was aborted or rolled back, if it was
    pub fn reason(&self) -> Option<&str> {
        self.fsm.reason()
    }

    pub fn params(&self) -> &ControlLoopParams {
        &self.params
    }

    fn transition(&mut self, event: ControlLoopEvent) {
        if let Err(e) = self.fsm.process(event) {
            error!("{}", e);
        }
    }

    /// Run the loop to completion.
    ///
    /// `cancel_signal` is only observed while waiting for convergence.
    pub async fn run(&mut self, cancel_signal: CancelSignal) -> ExitStatus {
        let ret = self
            .marker
            .mark(
                &self.params.service,
                &self.params.deploy_group,
                &self.params.commit,
                &self.params.git_url,
            )
            .await;
        self.notifier.notify_after_mark(ret).await;

        if !ret.is_success() {
            self.transition(ControlLoopEvent::MarkFailed);
            return ExitStatus::Failure;
        }
        self.transition(ControlLoopEvent::MarkSucceeded);

        if !self.params.block {
            info!(
                "Marked {} for {}; not waiting for the deployment to finish",
                short_sha(&self.params.commit),
                self.params.deploy_group
            );
            return ExitStatus::Success;
        }

        match self.wait(cancel_signal).await {
            Ok(()) => {
                self.notifier.notify_after_good_deploy().await;
                self.transition(ControlLoopEvent::DeployFinished);
                ExitStatus::Success
            }
            Err(e) => self.handle_wait_failure(e).await,
        }
    }

    async fn wait(&self, cancel_signal: CancelSignal) -> Result<(), WaitError> {
        tokio::select! {
            result = self.waiter.wait(
                &self.params.deploy_group,
                &self.params.commit,
                self.params.timeout,
            ) => result,
            _ = cancel_signal => {
                warn!("Wait for {} cancelled by operator", self.params.deploy_group);
                Err(WaitError::Cancelled)
            }
        }
    }

    async fn handle_wait_failure(&mut self, wait_error: WaitError) -> ExitStatus {
        warn!("Deployment of {} did not finish: {}", self.params.deploy_group, wait_error);

        let deployed_sha = if self.params.auto_rollback && matches!(wait_error, WaitError::Timeout(_)) {
            match self
                .deployed
                .currently_deployed_sha(&self.params.deploy_group)
                .await
            {
                Ok(sha) => sha,
                Err(e) => {
                    warn!("Could not look up the deployed sha, assuming it differs: {}", e);
                    None
                }
            }
        } else {
            None
        };

        if should_roll_back(
            &wait_error,
            self.params.auto_rollback,
            deployed_sha.as_deref(),
            &self.params.commit,
        ) {
            return self.roll_back(wait_error.to_string()).await;
        }

        if self.params.auto_rollback && matches!(wait_error, WaitError::Timeout(_)) {
            info!(
                "{} already runs {}, not rolling back",
                self.params.deploy_group,
                short_sha(&self.params.commit)
            );
        }
        self.notifier.notify_after_abort().await;
        self.transition(ControlLoopEvent::DeployAborted(wait_error.to_string()));
        ExitStatus::Failure
    }

    async fn roll_back(&mut self, reason: String) -> ExitStatus {
        self.transition(ControlLoopEvent::RollbackStarted(reason));

        match self.params.old_commit.clone() {
            Some(old_commit) => {
                info!(
                    "Rolling {} back to {}",
                    self.params.deploy_group,
                    short_sha(&old_commit)
                );
                let ret = self
                    .marker
                    .mark(
                        &self.params.service,
                        &self.params.deploy_group,
                        &old_commit,
                        &self.params.git_url,
                    )
                    .await;
                if !ret.is_success() {
                    error!(
                        "Rollback of {} to {} failed; the desired state still points at {}",
                        self.params.deploy_group,
                        short_sha(&old_commit),
                        short_sha(&self.params.commit)
                    );
                }
            }
            None => {
                warn!(
                    "No previous commit recorded for {}, leaving the desired state at {}",
                    self.params.deploy_group,
                    short_sha(&self.params.commit)
                );
            }
        }

        self.notifier.notify_after_auto_rollback().await;
        ExitStatus::Failure
    }
}
