//! Git-backed desired-state transport and author lookup

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::deploy::mutator::RefTransport;
use crate::errors::DeployError;
use crate::utils::short_sha;

/// Lists the authors of the commits between two shas
#[async_trait]
pub trait AuthorLookup: Send + Sync {
    /// Returns the lookup's exit status and space separated usernames
    async fn get_authors(&self, git_url: &str, old_commit: &str, commit: &str) -> (i32, String);
}

/// Pushes refs with the `git` CLI from a local clone
pub struct GitRefTransport {
    checkout: PathBuf,
}

impl GitRefTransport {
    pub fn new(checkout: impl Into<PathBuf>) -> Self {
        Self {
            checkout: checkout.into(),
        }
    }
}

#[async_trait]
impl RefTransport for GitRefTransport {
    async fn mutate_ref(
        &self,
        git_url: &str,
        ref_name: &str,
        commit: &str,
        force: bool,
    ) -> Result<(), DeployError> {
        let refspec = format!("{}:{}", commit, ref_name);
        debug!("Pushing {} to {}", refspec, git_url);

        let mut command = Command::new("git");
        command.current_dir(&self.checkout).arg("push");
        if force {
            command.arg("--force");
        }
        let output = command
            .arg(git_url)
            .arg(&refspec)
            .output()
            .await
            .map_err(|e| DeployError::MutationError(format!("Failed to run git push: {}", e)))?;

        if !output.status.success() {
            return Err(DeployError::MutationError(format!(
                "git push of {} failed: {}",
                refspec,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        info!("Updated {} at {} to {}", ref_name, git_url, short_sha(commit));
        Ok(())
    }
}

/// Reads commit authors from a local clone with `git log`
pub struct GitAuthorLookup {
    checkout: Option<PathBuf>,
}

impl GitAuthorLookup {
    pub fn new(checkout: Option<PathBuf>) -> Self {
        Self { checkout }
    }
}

/// Unique usernames (email local parts) in first-seen order
pub fn usernames_from_emails(emails: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for email in emails.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let name = email.split('@').next().unwrap_or(email).to_string();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

#[async_trait]
impl AuthorLookup for GitAuthorLookup {
    async fn get_authors(&self, git_url: &str, old_commit: &str, commit: &str) -> (i32, String) {
        let Some(checkout) = &self.checkout else {
            debug!("No local checkout of {}, skipping author lookup", git_url);
            return (1, String::new());
        };

        let mut command = Command::new("git");
        command.current_dir(checkout).args(["log", "--format=%ae"]);
        if old_commit.is_empty() {
            command.args(["--max-count=1", commit]);
        } else {
            command.arg(format!("{}..{}", old_commit, commit));
        }

        match command.output().await {
            Ok(output) => {
                let code = output.status.code().unwrap_or(1);
                if code != 0 {
                    warn!(
                        "git log for authors exited with {}: {}",
                        code,
                        String::from_utf8_lossy(&output.stderr).trim()
                    );
                }
                let emails = String::from_utf8_lossy(&output.stdout);
                (code, usernames_from_emails(&emails).join(" "))
            }
            Err(e) => {
                warn!("Failed to run git log for authors: {}", e);
                (1, String::new())
            }
        }
    }
}
