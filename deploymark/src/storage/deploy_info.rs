//! Per-service deploy configuration (`<soa_dir>/<service>/deploy.json`)

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::DeployError;
use crate::filesys::file::File;

/// A lifecycle event that may produce a chat notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyEvent {
    AfterMark,
    AfterGoodDeploy,
    AfterAutoRollback,
    AfterAbort,
}

/// One step of a service's deploy pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStep {
    /// Deploy group this step targets
    pub step: String,

    /// Default for every notification of this step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slack_notify: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_after_mark: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_after_good_deploy: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_after_auto_rollback: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_after_abort: Option<bool>,
}

impl PipelineStep {
    pub fn new(step: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            ..Default::default()
        }
    }

    /// Whether `event` should notify: the per-event flag wins, then
    /// `slack_notify`, then off.
    pub fn should_notify(&self, event: NotifyEvent) -> bool {
        let specific = match event {
            NotifyEvent::AfterMark => self.notify_after_mark,
            NotifyEvent::AfterGoodDeploy => self.notify_after_good_deploy,
            NotifyEvent::AfterAutoRollback => self.notify_after_auto_rollback,
            NotifyEvent::AfterAbort => self.notify_after_abort,
        };
        specific.or(self.slack_notify).unwrap_or(false)
    }
}

/// Deploy configuration of one service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployInfo {
    #[serde(default)]
    pub pipeline: Vec<PipelineStep>,

    #[serde(default)]
    pub slack_channels: Vec<String>,

    /// Overrides the default git URL of the service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_url: Option<String>,
}

impl DeployInfo {
    /// Find the pipeline step for a deploy group
    pub fn step(&self, deploy_group: &str) -> Option<&PipelineStep> {
        self.pipeline.iter().find(|step| step.step == deploy_group)
    }

    /// Validate that `deploy_group` is part of the pipeline
    pub fn require_step(&self, deploy_group: &str) -> Result<&PipelineStep, DeployError> {
        self.step(deploy_group).ok_or_else(|| {
            let known: Vec<&str> = self.pipeline.iter().map(|s| s.step.as_str()).collect();
            DeployError::ValidationError(format!(
                "deploy group {} is not in the pipeline (known: {})",
                deploy_group,
                known.join(", ")
            ))
        })
    }
}

/// Load `<soa_dir>/<service>/deploy.json`
pub async fn load_deploy_info(soa_dir: &Path, service: &str) -> Result<DeployInfo, DeployError> {
    let file = File::new(soa_dir.join(service).join("deploy.json"));
    if !file.exists().await {
        return Err(DeployError::ConfigError(format!(
            "{} not found for service {}",
            file.path().display(),
            service
        )));
    }
    file.read_json().await
}
