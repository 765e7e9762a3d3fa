//! Error types for deploymark

use std::time::Duration;

use thiserror::Error;

/// Main error type for deploymark
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("URL error: {0}")]
    UrlError(#[from] url::ParseError),

    /// A requirement for marking was not met; nothing was mutated
    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Mutation error: {0}")]
    MutationError(String),

    #[error("Interaction parsing error: {0}")]
    InteractionParse(String),

    /// A request did not carry a valid Slack signature
    #[error("Signature error: {0}")]
    SignatureError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Server error: {0}")]
    ServerError(String),
}

/// Outcome of a convergence wait that did not succeed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WaitError {
    /// The fleet did not converge before the deadline
    #[error("deployment did not converge within {0:?}")]
    Timeout(Duration),

    /// The operator interrupted the wait
    #[error("deployment wait was cancelled")]
    Cancelled,

    #[error("deployment wait failed: {0}")]
    Failed(String),
}
