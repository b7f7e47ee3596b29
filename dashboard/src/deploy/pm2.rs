//! PM2 process manager commands

use std::fmt;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::deploy::command::CommandSpec;

/// How PM2 is told which process to act on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pm2Ident {
    Id(u32),
    Name(String),
}

impl Pm2Ident {
    /// The numeric id when one is known, else the name
    pub fn resolve(pm2_id: Option<u32>, name: &str) -> Self {
        match pm2_id {
            Some(id) => Self::Id(id),
            None => Self::Name(name.to_string()),
        }
    }
}

impl fmt::Display for Pm2Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{}", id),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// An entry of `pm2 jlist`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pm2Process {
    #[serde(default)]
    pub pm_id: Option<u32>,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub pm2_env: Pm2Env,

    #[serde(default)]
    pub monit: Pm2Monit,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pm2Env {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub pm_uptime: Option<i64>,
    #[serde(default)]
    pub restart_time: Option<u64>,
    #[serde(default)]
    pub pm_err_log_path: Option<String>,
    #[serde(default)]
    pub pm_out_log_path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pm2Monit {
    #[serde(default)]
    pub cpu: Option<f64>,
    #[serde(default)]
    pub memory: Option<u64>,
}

/// Parse `pm2 jlist` output.
///
/// PM2 sometimes prints banners instead of JSON; anything that does not look
/// like JSON or fails to parse yields an empty table.
pub fn parse_process_list(stdout: &str) -> Vec<Pm2Process> {
    let stdout = stdout.trim();
    if !(stdout.starts_with('[') || stdout.starts_with('{')) {
        return Vec::new();
    }
    match serde_json::from_str::<Vec<Pm2Process>>(stdout) {
        Ok(processes) => processes,
        Err(e) => {
            warn!("Failed to parse PM2 output: {}", e);
            Vec::new()
        }
    }
}

fn pm2<I, S>(args: I) -> CommandSpec
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    CommandSpec::new("pm2").args(args).require_prefix("pm2")
}

/// `pm2 start <ecosystem config>`
pub fn start_config(config: &Path) -> CommandSpec {
    pm2(["start".to_string(), config.to_string_lossy().into_owned()])
}

pub fn start(ident: &Pm2Ident) -> CommandSpec {
    pm2(["start".to_string(), ident.to_string()])
}

pub fn stop(ident: &Pm2Ident) -> CommandSpec {
    pm2(["stop".to_string(), ident.to_string()])
}

pub fn restart(ident: &Pm2Ident) -> CommandSpec {
    pm2(["restart".to_string(), ident.to_string()])
}

pub fn delete(ident: &Pm2Ident) -> CommandSpec {
    pm2(["delete".to_string(), ident.to_string()])
}

/// Persist the process table so it survives a reboot
pub fn save() -> CommandSpec {
    pm2(["save"])
}

pub fn jlist() -> CommandSpec {
    pm2(["jlist"])
}

/// `tail -n <lines> <path>`
pub fn tail(path: &str, lines: usize) -> CommandSpec {
    CommandSpec::new("tail")
        .args(["-n".to_string(), lines.to_string(), path.to_string()])
        .require_prefix("tail")
}
