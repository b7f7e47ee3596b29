//! REST API

pub mod auth;
pub mod handlers;
pub mod serve;
pub mod state;
