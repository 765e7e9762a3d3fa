//! Slack notifications and interactions

pub mod client;
pub mod interactions;
pub mod notifier;
pub mod signature;
