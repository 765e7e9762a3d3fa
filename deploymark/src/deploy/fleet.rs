//! Fleet convergence observation

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::{DeployError, WaitError};
use crate::http::client::HttpClient;
use crate::utils::short_sha;

/// Waits for a deploy group to run a commit
#[async_trait]
pub trait ConvergenceWaiter: Send + Sync {
    async fn wait(&self, deploy_group: &str, commit: &str, timeout: Duration) -> Result<(), WaitError>;
}

/// Reports which commit a deploy group is running
#[async_trait]
pub trait DeployedShaLookup: Send + Sync {
    async fn currently_deployed_sha(&self, deploy_group: &str) -> Result<Option<String>, DeployError>;
}

/// One running instance of a deploy group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceStatus {
    pub name: String,
    pub git_sha: Option<String>,
    #[serde(default)]
    pub healthy: bool,
}

/// Status of a deploy group as reported by the status API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeployGroupStatus {
    /// Commit every instance is running, if they agree
    #[serde(default)]
    pub deployed_sha: Option<String>,

    #[serde(default)]
    pub instances: Vec<InstanceStatus>,
}

impl DeployGroupStatus {
    /// Every instance runs `commit` and is healthy
    pub fn converged_on(&self, commit: &str) -> bool {
        !self.instances.is_empty()
            && self
                .instances
                .iter()
                .all(|i| i.healthy && i.git_sha.as_deref() == Some(commit))
    }

    fn pending(&self, commit: &str) -> usize {
        self.instances
            .iter()
            .filter(|i| !i.healthy || i.git_sha.as_deref() != Some(commit))
            .count()
    }
}

/// Polls the deployment status API of one service
pub struct FleetStatusClient {
    http: HttpClient,
    service: String,
    poll_interval: Duration,
}

impl FleetStatusClient {
    pub fn new(http: HttpClient, service: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            http,
            service: service.into(),
            poll_interval,
        }
    }

    /// Fetch the status of a deploy group
    pub async fn status(&self, deploy_group: &str) -> Result<DeployGroupStatus, DeployError> {
        self.http
            .get(&["services", self.service.as_str(), "deploy_groups", deploy_group, "status"])
            .await
    }

    async fn poll_until_converged(&self, deploy_group: &str, commit: &str) -> Result<(), WaitError> {
        loop {
            match self.status(deploy_group).await {
                Ok(status) if status.converged_on(commit) => {
                    info!(
                        "{} of {} converged on {}",
                        deploy_group,
                        self.service,
                        short_sha(commit)
                    );
                    return Ok(());
                }
                Ok(status) => {
                    debug!(
                        "{} of {}: {} of {} instances still pending",
                        deploy_group,
                        self.service,
                        status.pending(commit),
                        status.instances.len()
                    );
                }
                Err(DeployError::HttpStatus { status: 404, body }) => {
                    return Err(WaitError::Failed(format!(
                        "unknown deploy group {} of {}: {}",
                        deploy_group, self.service, body
                    )));
                }
                Err(e) => {
                    warn!("Failed to fetch status of {}, retrying: {}", deploy_group, e);
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl ConvergenceWaiter for FleetStatusClient {
    async fn wait(&self, deploy_group: &str, commit: &str, timeout: Duration) -> Result<(), WaitError> {
        info!(
            "Waiting up to {:?} for {} of {} to run {}",
            timeout,
            deploy_group,
            self.service,
            short_sha(commit)
        );
        match tokio::time::timeout(timeout, self.poll_until_converged(deploy_group, commit)).await {
            Ok(result) => result,
            Err(_) => Err(WaitError::Timeout(timeout)),
        }
    }
}

#[async_trait]
impl DeployedShaLookup for FleetStatusClient {
    async fn currently_deployed_sha(&self, deploy_group: &str) -> Result<Option<String>, DeployError> {
        match self.status(deploy_group).await {
            Ok(status) => Ok(status.deployed_sha),
            // A deploy group that was never deployed has no status yet
            Err(DeployError::HttpStatus { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
