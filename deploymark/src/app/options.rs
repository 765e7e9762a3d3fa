//! Command line options for a mark-for-deployment run

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::DeployError;
use crate::utils::is_full_git_sha;

/// Options for one mark-for-deployment run
#[derive(Debug, Clone)]
pub struct MarkOptions {
    pub service: String,
    pub deploy_group: String,
    pub commit: String,

    /// Overrides the url from deploy.json and the configured template
    pub git_url: Option<String>,

    /// Wait for the deploy group to converge
    pub block: bool,

    pub auto_rollback: bool,

    /// Falls back to the configured default when unset
    pub timeout: Option<Duration>,

    /// Require the image to be present in the registry before marking
    pub verify_image: bool,

    /// Overrides the configured soa directory
    pub soa_dir: Option<PathBuf>,

    pub verbose: bool,
}

impl MarkOptions {
    /// Build options from `--key=value` style arguments
    pub fn from_args(args: &HashMap<String, String>) -> Result<Self, DeployError> {
        let service = required(args, "service")?;
        let deploy_group = required(args, "deploy-group")?;
        let commit = required(args, "commit")?;
        if !is_full_git_sha(&commit) {
            return Err(DeployError::ValidationError(format!(
                "commit must be a full 40 character git sha, got '{}'",
                commit
            )));
        }

        let timeout = match args.get("timeout") {
            Some(raw) => {
                let secs: u64 = raw.parse().map_err(|_| {
                    DeployError::ValidationError(format!("timeout must be a number of seconds, got '{}'", raw))
                })?;
                if secs == 0 {
                    return Err(DeployError::ValidationError("timeout must be positive".to_string()));
                }
                Some(Duration::from_secs(secs))
            }
            None => None,
        };

        Ok(Self {
            service,
            deploy_group,
            commit,
            git_url: args.get("git-url").cloned(),
            block: flag(args, "block"),
            auto_rollback: flag(args, "auto-rollback"),
            timeout,
            verify_image: flag(args, "verify-image"),
            soa_dir: args.get("soa-dir").map(PathBuf::from),
            verbose: flag(args, "verbose"),
        })
    }
}

fn required(args: &HashMap<String, String>, key: &str) -> Result<String, DeployError> {
    match args.get(key).map(|v| v.trim()) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(DeployError::ValidationError(format!("--{} is required", key))),
    }
}

fn flag(args: &HashMap<String, String>, key: &str) -> bool {
    matches!(args.get(key).map(String::as_str), Some("true") | Some("1") | Some("yes"))
}

/// Interaction listener options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub host: String,
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}
