//! Persistent state under the application root

pub mod deployment_status;
pub mod env_file;
pub mod error_log;
pub mod layout;
pub mod registry;
pub mod settings;
