//! Finite State Machine for mark-for-deployment

use std::fmt;

use serde::{Deserialize, Serialize};

/// Control loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlLoopState {
    /// Initial state, desired-state ref not yet written
    MarkForDeployment,

    /// The ref could not be written
    MfdFailed,

    /// The ref points at the new commit; the fleet may still be converging
    Deploying,

    /// The wait ended without convergence and nothing was rolled back
    DeployAborted,

    /// The ref was pointed back at the previous commit
    StartRollback,

    /// The fleet converged on the new commit
    Deployed,
}

impl ControlLoopState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlLoopState::MarkForDeployment => "mark_for_deployment",
            ControlLoopState::MfdFailed => "mfd_failed",
            ControlLoopState::Deploying => "deploying",
            ControlLoopState::DeployAborted => "deploy_aborted",
            ControlLoopState::StartRollback => "start_rollback",
            ControlLoopState::Deployed => "deployed",
        }
    }
}

impl fmt::Display for ControlLoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Control loop event
#[derive(Debug, Clone)]
pub enum ControlLoopEvent {
    /// The desired-state ref was written
    MarkSucceeded,

    /// Every attempt to write the ref failed
    MarkFailed,

    /// The fleet converged
    DeployFinished,

    /// The wait failed and no rollback follows
    DeployAborted(String),

    /// The wait failed and the previous commit is being restored
    RollbackStarted(String),
}

/// Mark-for-deployment FSM
#[derive(Debug, Clone)]
pub struct ControlLoopFsm {
    state: ControlLoopState,
    reason: Option<String>,
}

impl ControlLoopFsm {
    /// Create a new FSM in the initial state
    pub fn new() -> Self {
        Self {
            state: ControlLoopState::MarkForDeployment,
            reason: None,
        }
    }

    /// Get current state
    pub fn state(&self) -> ControlLoopState {
        self.state
    }

    /// Why the deploy was aborted or rolled back, if it was
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: ControlLoopEvent) -> Result<(), String> {
        let new_state = match (&self.state, &event) {
            (ControlLoopState::MarkForDeployment, ControlLoopEvent::MarkSucceeded) => {
                ControlLoopState::Deploying
            }
            (ControlLoopState::MarkForDeployment, ControlLoopEvent::MarkFailed) => {
                ControlLoopState::MfdFailed
            }

            (ControlLoopState::Deploying, ControlLoopEvent::DeployFinished) => {
                ControlLoopState::Deployed
            }
            (ControlLoopState::Deploying, ControlLoopEvent::DeployAborted(reason)) => {
                self.reason = Some(reason.clone());
                ControlLoopState::DeployAborted
            }
            (ControlLoopState::Deploying, ControlLoopEvent::RollbackStarted(reason)) => {
                self.reason = Some(reason.clone());
                ControlLoopState::StartRollback
            }

            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(())
    }
}

impl Default for ControlLoopFsm {
    fn default() -> Self {
        Self::new()
    }
}
