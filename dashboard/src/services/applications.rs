//! Operations on deployed and discovered applications

use std::sync::Arc;

use chrono::Utc;
use openapi_server::models::{ApplicationSummary, LogLine};
use tracing::{info, warn};

use crate::deploy::command::{CommandRunner, ExecResult};
use crate::deploy::ecosystem;
use crate::deploy::pm2::{self, Pm2Ident, Pm2Process};
use crate::errors::DashboardError;
use crate::services::target::{AppId, AppTarget};
use crate::storage::layout::StorageLayout;
use crate::storage::registry::Registry;

/// Lines returned by [`ApplicationService::logs`] when none are requested
pub const DEFAULT_LOG_LINES: usize = 100;

/// Start, stop, inspect and remove applications through PM2
#[derive(Clone)]
pub struct ApplicationService {
    layout: StorageLayout,
    registry: Registry,
    runner: Arc<dyn CommandRunner>,
}

impl ApplicationService {
    pub fn new(layout: StorageLayout, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            registry: Registry::new(layout.clone()),
            layout,
            runner,
        }
    }

    /// Parse and resolve an id from a request path
    pub async fn resolve(&self, raw_id: &str) -> Result<AppTarget, DashboardError> {
        let id = AppId::parse(raw_id)?;
        AppTarget::resolve(&id, &self.registry, &self.layout).await
    }

    async fn process_table(&self, fallback: &str) -> Result<Vec<Pm2Process>, DashboardError> {
        let result = self.runner.run(&pm2::jlist()).await;
        if !result.success {
            return Err(command_error(result, fallback));
        }
        Ok(pm2::parse_process_list(&result.stdout))
    }

    /// Registry entries merged with live PM2 data, followed by applications
    /// found on disk that the registry doesn't know about
    pub async fn list(&self) -> Result<Vec<ApplicationSummary>, DashboardError> {
        let processes = self.process_table("Failed to list applications").await?;
        let records = self.registry.list().await;
        let mut applications = Vec::with_capacity(records.len());

        for record in &records {
            let process = processes.iter().find(|p| {
                (record.pm2_id.is_some() && p.pm_id == record.pm2_id) || p.name == record.name
            });

            if record.pm2_id.is_none() {
                if let Some(pm_id) = process.and_then(|p| p.pm_id) {
                    info!("Recording PM2 id {} for {}", pm_id, record.name);
                    if let Err(e) = self.registry.update_pm2_id(&record.id, pm_id).await {
                        warn!("Could not store PM2 id of {}: {}", record.name, e);
                    }
                }
            }

            applications.push(summarize(record.id.clone(), &record.name, process));
        }

        for name in self.discover().await {
            if records.iter().any(|r| r.name == name) {
                continue;
            }
            let process = processes.iter().find(|p| p.name == name);
            applications.push(summarize(AppId::discovered(&name), &name, process));
        }

        Ok(applications)
    }

    /// Non-hidden directories of the application root holding a `package.json`
    async fn discover(&self) -> Vec<String> {
        let names = match self.layout.apps_dir().list_visible_dirs().await {
            Ok(names) => names,
            Err(_) => return Vec::new(),
        };

        let mut found = Vec::new();
        for name in names {
            if self.layout.manifest_file(&name).exists().await {
                found.push(name);
            }
        }
        found
    }

    pub async fn start(&self, target: &AppTarget) -> Result<(), DashboardError> {
        let config = ecosystem::ensure(&self.layout.app_dir(target.name()), target.name()).await?;

        match target {
            AppTarget::Discovered { .. } => {
                let result = self.runner.run(&pm2::start_config(config.path())).await;
                if !result.success {
                    return Err(command_error(result, "Failed to start application"));
                }
                self.runner.run(&pm2::save()).await;
            }
            AppTarget::Registered(_) => {
                let result = self.runner.run(&pm2::start(&ident(target))).await;
                if !result.success {
                    return Err(command_error(result, "Failed to start application"));
                }
            }
        }

        info!("Started {}", target.name());
        Ok(())
    }

    pub async fn stop(&self, target: &AppTarget) -> Result<(), DashboardError> {
        let result = self.runner.run(&pm2::stop(&ident(target))).await;
        if !result.success {
            return Err(command_error(result, "Failed to stop application"));
        }
        info!("Stopped {}", target.name());
        Ok(())
    }

    pub async fn restart(&self, target: &AppTarget) -> Result<(), DashboardError> {
        ecosystem::ensure(&self.layout.app_dir(target.name()), target.name()).await?;

        let result = self.runner.run(&pm2::restart(&ident(target))).await;
        if !result.success {
            return Err(command_error(result, "Failed to restart application"));
        }
        info!("Restarted {}", target.name());
        Ok(())
    }

    /// Drop the application from PM2, the registry and the disk
    pub async fn remove(&self, target: &AppTarget) -> Result<(), DashboardError> {
        // a process that is already gone is fine
        self.runner.run(&pm2::delete(&ident(target))).await;
        self.runner.run(&pm2::save()).await;

        if let AppTarget::Registered(record) = target {
            self.registry.delete(&record.id).await?;
        }
        self.layout.app_dir(target.name()).delete().await?;

        info!("Removed {}", target.name());
        Ok(())
    }

    /// Last `lines` lines of the PM2 error and output logs, errors first
    pub async fn logs(&self, target: &AppTarget, lines: usize) -> Result<Vec<LogLine>, DashboardError> {
        let processes = self.process_table("Failed to get application info").await?;
        let Some(process) = processes.into_iter().find(|p| p.name == target.name()) else {
            return Ok(Vec::new());
        };

        let mut logs = Vec::new();
        let sources = [
            ("error", process.pm2_env.pm_err_log_path.as_deref()),
            ("info", process.pm2_env.pm_out_log_path.as_deref()),
        ];
        for (level, path) in sources {
            let Some(path) = path else { continue };
            let result = self.runner.run(&pm2::tail(path, lines)).await;
            if !result.success {
                continue;
            }
            logs.extend(to_log_lines(&result.stdout, target.name(), level));
        }

        let excess = logs.len().saturating_sub(lines);
        logs.drain(..excess);
        Ok(logs)
    }
}

fn ident(target: &AppTarget) -> Pm2Ident {
    Pm2Ident::resolve(target.pm2_id(), target.name())
}

fn command_error(result: ExecResult, fallback: &str) -> DashboardError {
    DashboardError::Command(result.error.unwrap_or_else(|| fallback.to_string()))
}

fn summarize(id: String, name: &str, process: Option<&Pm2Process>) -> ApplicationSummary {
    let env = process.map(|p| &p.pm2_env);
    let monit = process.map(|p| &p.monit);
    ApplicationSummary {
        id,
        name: name.to_string(),
        status: env
            .and_then(|e| e.status.clone())
            .unwrap_or_else(|| "stopped".to_string()),
        uptime: env.and_then(|e| e.pm_uptime).unwrap_or(0),
        restarts: env.and_then(|e| e.restart_time).unwrap_or(0),
        cpu: monit.and_then(|m| m.cpu).unwrap_or(0.0),
        memory: monit.and_then(|m| m.memory).unwrap_or(0),
    }
}

fn to_log_lines(output: &str, app: &str, level: &str) -> Vec<LogLine> {
    let now = Utc::now();
    let timestamp = now.format("%Y-%m-%d %H:%M:%S").to_string();
    let prefix = if level == "error" { "error" } else { "out" };

    output
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| LogLine {
            id: format!("{}-{}-{}", prefix, now.timestamp_millis(), index),
            timestamp: timestamp.clone(),
            app: app.to_string(),
            level: level.to_string(),
            message: line.to_string(),
        })
        .collect()
}
