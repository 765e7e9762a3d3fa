//! Configuration storage

pub mod deploy_info;
pub mod layout;
pub mod settings;
