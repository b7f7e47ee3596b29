//! Deployment orchestrator
//!
//! Drives one deployment attempt through cloning, installing, building and
//! starting. Every step outcome lands in the status store; failures are also
//! appended to the application's error log. The attempt always reaches the
//! start step so that a failed deployment still shows up in PM2.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use openapi_server::models::{DeploymentSummary, ErrorCategory};
use tracing::{error, info, warn};

use crate::deploy::command::{CommandRunner, ExecResult};
use crate::deploy::ecosystem::{self, EcosystemApp};
use crate::deploy::fsm::{DeploymentStep, StepStatus};
use crate::deploy::npm::{self, PackageManifest};
use crate::deploy::{git, pm2};
use crate::errors::DashboardError;
use crate::filesys::dir::Dir;
use crate::services::target::validate_app_name;
use crate::storage::deployment_status::StatusStore;
use crate::storage::error_log::{ErrorLog, NewErrorEntry};
use crate::storage::layout::StorageLayout;
use crate::storage::registry::{NewApp, Registry};

const SKIPPED_AFTER_CLONE: &str = "Skipped due to clone failure";

/// Names with a deployment in flight
#[derive(Debug, Clone, Default)]
pub struct DeploymentGuard {
    active: Arc<Mutex<HashSet<String>>>,
}

/// Releases the name when dropped
#[derive(Debug)]
pub struct DeploymentTicket {
    name: String,
    active: Arc<Mutex<HashSet<String>>>,
}

impl DeploymentGuard {
    pub fn acquire(&self, name: &str) -> Result<DeploymentTicket, DashboardError> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if !active.insert(name.to_string()) {
            return Err(DashboardError::Conflict(format!(
                "A deployment of '{}' is already in progress",
                name
            )));
        }
        Ok(DeploymentTicket {
            name: name.to_string(),
            active: self.active.clone(),
        })
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(name)
    }
}

impl Drop for DeploymentTicket {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.name);
    }
}

/// A failed step, as recorded in the status store and error log
struct StepFailure {
    step: DeploymentStep,
    category: ErrorCategory,
    title: &'static str,
    message: String,
    details: Option<String>,
}

/// Runs deployments
#[derive(Clone)]
pub struct Orchestrator {
    layout: StorageLayout,
    runner: Arc<dyn CommandRunner>,
    registry: Registry,
    status: StatusStore,
    errors: ErrorLog,
    guard: DeploymentGuard,
}

impl Orchestrator {
    pub fn new(layout: StorageLayout, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            registry: Registry::new(layout.clone()),
            status: StatusStore::new(layout.clone()),
            errors: ErrorLog::new(layout.clone()),
            guard: DeploymentGuard::default(),
            layout,
            runner,
        }
    }

    pub fn guard(&self) -> &DeploymentGuard {
        &self.guard
    }

    /// Deploy `app` from scratch, replacing any application of the same name
    pub async fn deploy(&self, app: NewApp) -> Result<DeploymentSummary, DashboardError> {
        validate_request(&app)?;
        let _ticket = self.guard.acquire(&app.name)?;

        let name = app.name.clone();
        let port = app.port;
        let repository = app.repository.clone();
        let branch = app.branch.clone();
        let app_dir = self.layout.app_dir(&name);

        info!("Deploying {} from {} ({})", name, repository, branch);

        // pre-flight
        let (dropped, record) = self.registry.replace(app).await?;
        for old in &dropped {
            let ident = pm2::Pm2Ident::resolve(old.pm2_id, &old.name);
            self.runner.run(&pm2::delete(&ident)).await;
        }
        if !dropped.is_empty() {
            self.runner.run(&pm2::save()).await;
        }
        if let Err(e) = app_dir.delete().await {
            warn!("Could not remove {}: {}", app_dir.path().display(), e);
        }
        self.status.initialize(&name).await?;

        let mut has_errors = false;

        // cloning
        self.mark(&name, DeploymentStep::Cloning, StepStatus::InProgress, None).await;
        let clone = self
            .runner
            .run(&git::clone(&repository, &branch, app_dir.path()))
            .await;
        let cloned = clone.success;
        if cloned {
            self.mark(&name, DeploymentStep::Cloning, StepStatus::Success, None).await;
        } else {
            has_errors = true;
            self.fail(
                &name,
                StepFailure {
                    step: DeploymentStep::Cloning,
                    category: ErrorCategory::Deployment,
                    title: "Git Clone Failed",
                    message: format!("Failed to clone repository {}", repository),
                    details: clone.diagnostic(),
                },
            )
            .await;
            self.write_placeholder(&app_dir, &name).await;
        }

        if cloned {
            // installing
            self.mark(&name, DeploymentStep::Installing, StepStatus::InProgress, None).await;
            let install = self.runner.run(&npm::install(app_dir.path())).await;
            if install.success {
                self.mark(&name, DeploymentStep::Installing, StepStatus::Success, None).await;
            } else {
                has_errors = true;
                self.fail(
                    &name,
                    StepFailure {
                        step: DeploymentStep::Installing,
                        category: ErrorCategory::Build,
                        title: "npm install Failed",
                        message: "Failed to install dependencies".to_string(),
                        details: install.diagnostic(),
                    },
                )
                .await;
            }

            // building
            let has_build = PackageManifest::read(&app_dir)
                .await
                .map(|m| m.has_script("build"))
                .unwrap_or(false);
            if has_build {
                self.mark(&name, DeploymentStep::Building, StepStatus::InProgress, None).await;
                let build = self.runner.run(&npm::build(app_dir.path())).await;
                if build.success {
                    self.mark(&name, DeploymentStep::Building, StepStatus::Success, None).await;
                } else {
                    has_errors = true;
                    self.fail(
                        &name,
                        StepFailure {
                            step: DeploymentStep::Building,
                            category: ErrorCategory::Build,
                            title: "Build Failed",
                            message: "Failed to build application".to_string(),
                            details: build.verbose_diagnostic(),
                        },
                    )
                    .await;
                }
            } else {
                self.mark(&name, DeploymentStep::Building, StepStatus::Success, None).await;
            }
        } else {
            self.mark(&name, DeploymentStep::Installing, StepStatus::Error, Some(SKIPPED_AFTER_CLONE))
                .await;
            self.mark(&name, DeploymentStep::Building, StepStatus::Error, Some(SKIPPED_AFTER_CLONE))
                .await;
        }

        // starting
        let config = EcosystemApp::new(&name, &app_dir, "npm", "start").with_port(port);
        self.mark(&name, DeploymentStep::Starting, StepStatus::InProgress, None).await;
        let start = match ecosystem::write(&app_dir, &config).await {
            Ok(file) => self.runner.run(&pm2::start_config(file.path())).await,
            Err(e) => ExecResult::failed(format!(
                "Failed to write ecosystem config: {}",
                e
            )),
        };
        if start.success {
            self.mark(&name, DeploymentStep::Starting, StepStatus::Success, None).await;
            self.store_pm2_id(&record.id, &name).await;
        } else {
            has_errors = true;
            self.fail(
                &name,
                StepFailure {
                    step: DeploymentStep::Starting,
                    category: ErrorCategory::Runtime,
                    title: "PM2 Start Failed",
                    message: "Failed to start application with PM2".to_string(),
                    details: start.diagnostic(),
                },
            )
            .await;
        }

        // post
        self.runner.run(&pm2::save()).await;

        if has_errors {
            warn!("Deployment of {} finished with errors", name);
        } else {
            info!("Deployment of {} finished", name);
        }

        Ok(DeploymentSummary {
            id: record.id,
            name,
            path: app_dir.path().to_string_lossy().into_owned(),
            port,
            status: if has_errors { "error" } else { "online" }.to_string(),
            has_errors,
        })
    }

    /// Record a step transition; persistence problems don't stop the attempt
    async fn mark(
        &self,
        name: &str,
        step: DeploymentStep,
        status: StepStatus,
        message: Option<&str>,
    ) {
        if let Err(e) = self.status.update(name, step, status, message).await {
            warn!("Could not record {} for {}: {}", step, name, e);
        }
    }

    async fn fail(&self, name: &str, failure: StepFailure) {
        error!(
            "{} for {}: {}",
            failure.title,
            name,
            failure.details.as_deref().unwrap_or(&failure.message)
        );
        self.mark(name, failure.step, StepStatus::Error, failure.details.as_deref())
            .await;

        let entry = NewErrorEntry::new(failure.category, failure.title, failure.message)
            .with_details(failure.details);
        if let Err(e) = self.errors.append(name, entry).await {
            warn!("Could not append to error log of {}: {}", name, e);
        }
    }

    /// Manifest whose start script fails, so PM2 still gets an entry
    async fn write_placeholder(&self, app_dir: &Dir, name: &str) {
        let result = async {
            app_dir.create().await?;
            PackageManifest::placeholder(name).write(app_dir).await
        }
        .await;
        if let Err(e) = result {
            warn!("Could not write placeholder manifest for {}: {}", name, e);
        }
    }

    /// Look the new process up by name and remember its id
    async fn store_pm2_id(&self, record_id: &str, name: &str) {
        let listing = self.runner.run(&pm2::jlist()).await;
        if !listing.success {
            return;
        }
        let pm_id = pm2::parse_process_list(&listing.stdout)
            .into_iter()
            .find(|p| p.name == name)
            .and_then(|p| p.pm_id);
        if let Some(pm_id) = pm_id {
            if let Err(e) = self.registry.update_pm2_id(record_id, pm_id).await {
                warn!("Could not store PM2 id of {}: {}", name, e);
            }
        }
    }
}

fn validate_request(app: &NewApp) -> Result<(), DashboardError> {
    validate_app_name(&app.name)?;
    if app.repository.trim().is_empty() {
        return Err(DashboardError::Validation(
            "Name and repository are required".to_string(),
        ));
    }
    // both end up as git arguments
    if app.repository.starts_with('-') || app.branch.starts_with('-') || app.branch.is_empty() {
        return Err(DashboardError::Validation(
            "Invalid repository or branch".to_string(),
        ));
    }
    Ok(())
}
