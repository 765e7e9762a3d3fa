//! Slack Web API and Block Kit models
//!
//! Only the subset deploymark sends and receives is modelled. Unknown fields
//! in inbound payloads are ignored.

pub mod models;

pub use models::*;
