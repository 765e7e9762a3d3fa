//! Deployment module

pub mod control;
pub mod docker;
pub mod fleet;
pub mod fsm;
pub mod git;
pub mod mutator;

/// Numeric result of a mark or a control loop run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success = 0,
    Failure = 1,
}

impl ExitStatus {
    /// Process exit code
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == ExitStatus::Success
    }
}
