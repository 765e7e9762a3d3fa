//! deploymark library
//!
//! Desired-state mutation, deployment control loop with automatic rollback,
//! and the Slack surface around it.

pub mod app;
pub mod audit;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod server;
pub mod slack;
pub mod storage;
pub mod utils;
