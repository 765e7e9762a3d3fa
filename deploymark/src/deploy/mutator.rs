//! Desired-state mutation with retries

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::audit::AuditSink;
use crate::deploy::ExitStatus;
use crate::errors::DeployError;
use crate::utils::{calc_exp_backoff, short_sha, CooldownOptions};

/// Transport that moves a remote ref
#[async_trait]
pub trait RefTransport: Send + Sync {
    /// Point `ref_name` at `git_url` to `commit`
    async fn mutate_ref(
        &self,
        git_url: &str,
        ref_name: &str,
        commit: &str,
        force: bool,
    ) -> Result<(), DeployError>;
}

/// Records a commit as the desired version of a deploy group
#[async_trait]
pub trait MarkForDeployment: Send + Sync {
    async fn mark(&self, service: &str, deploy_group: &str, commit: &str, git_url: &str) -> ExitStatus;
}

/// Mutator options
#[derive(Debug, Clone)]
pub struct MutatorOptions {
    /// Total attempts, including the first
    pub attempts: u32,

    /// Delay between attempts
    pub cooldown: CooldownOptions,

    /// Prefix of the per deploy group branch
    pub ref_prefix: String,
}

impl Default for MutatorOptions {
    fn default() -> Self {
        Self {
            attempts: 3,
            cooldown: CooldownOptions::default(),
            ref_prefix: "paasta-".to_string(),
        }
    }
}

/// Force-writes the desired-state ref, retrying transient failures
pub struct DesiredStateMutator {
    transport: Arc<dyn RefTransport>,
    audit: Arc<dyn AuditSink>,
    options: MutatorOptions,
}

impl DesiredStateMutator {
    pub fn new(
        transport: Arc<dyn RefTransport>,
        audit: Arc<dyn AuditSink>,
        options: MutatorOptions,
    ) -> Self {
        Self {
            transport,
            audit,
            options,
        }
    }

    /// Ref holding the desired commit of `deploy_group`
    pub fn ref_name(&self, deploy_group: &str) -> String {
        format!("refs/heads/{}{}", self.options.ref_prefix, deploy_group)
    }

    /// Like [`MarkForDeployment::mark`], sleeping between attempts with `sleep_fn`
    pub async fn mark_with_sleep<S, F>(
        &self,
        service: &str,
        deploy_group: &str,
        commit: &str,
        git_url: &str,
        sleep_fn: S,
    ) -> ExitStatus
    where
        S: Fn(Duration) -> F,
        F: Future<Output = ()>,
    {
        let ref_name = self.ref_name(deploy_group);
        let attempts = self.options.attempts.max(1);

        for attempt in 0..attempts {
            if attempt > 0 {
                sleep_fn(calc_exp_backoff(&self.options.cooldown, attempt - 1)).await;
            }

            match self
                .transport
                .mutate_ref(git_url, &ref_name, commit, true)
                .await
            {
                Ok(()) => {
                    info!(
                        "Marked {} for deployment in deploy group {} of {}",
                        short_sha(commit),
                        deploy_group,
                        service
                    );
                    self.audit
                        .log_audit(
                            "mark-for-deployment",
                            serde_json::json!({
                                "deploy_group": deploy_group,
                                "commit": commit,
                            }),
                            service,
                        )
                        .await;
                    return ExitStatus::Success;
                }
                Err(e) => {
                    warn!(
                        "Attempt {}/{} to update {} failed: {}",
                        attempt + 1,
                        attempts,
                        ref_name,
                        e
                    );
                }
            }
        }

        error!(
            "Giving up marking {} for deployment in {} after {} attempts",
            short_sha(commit),
            deploy_group,
            attempts
        );
        ExitStatus::Failure
    }
}

#[async_trait]
impl MarkForDeployment for DesiredStateMutator {
    async fn mark(&self, service: &str, deploy_group: &str, commit: &str, git_url: &str) -> ExitStatus {
        self.mark_with_sleep(service, deploy_group, commit, git_url, tokio::time::sleep)
            .await
    }
}
