//! Deployment of Node.js applications

pub mod command;
pub mod ecosystem;
pub mod fsm;
pub mod git;
pub mod npm;
pub mod orchestrator;
pub mod pm2;
