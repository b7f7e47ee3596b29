//! Deckhand Library
//!
//! Core modules for the Deckhand deployment dashboard.

pub mod app;
pub mod authn;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod logs;
pub mod server;
pub mod services;
pub mod storage;
pub mod utils;
