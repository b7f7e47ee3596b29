//! Application-level operations behind the REST API

pub mod applications;
pub mod database;
pub mod target;
