//! Server state

use std::sync::Arc;

use crate::authn::token::TokenService;
use crate::authn::users::UserStore;
use crate::deploy::command::CommandRunner;
use crate::deploy::orchestrator::Orchestrator;
use crate::services::applications::ApplicationService;
use crate::services::database::DatabaseService;
use crate::storage::deployment_status::StatusStore;
use crate::storage::env_file::EnvStore;
use crate::storage::error_log::ErrorLog;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::DeploySettings;

/// Server state shared across handlers
pub struct ServerState {
    pub layout: StorageLayout,
    pub deploy_defaults: DeploySettings,
    pub users: UserStore,
    pub tokens: TokenService,
    pub applications: ApplicationService,
    pub orchestrator: Orchestrator,
    pub status: StatusStore,
    pub errors: ErrorLog,
    pub env: EnvStore,
    pub database: DatabaseService,
}

impl ServerState {
    pub fn new(
        layout: StorageLayout,
        runner: Arc<dyn CommandRunner>,
        deploy_defaults: DeploySettings,
        users: UserStore,
        tokens: TokenService,
    ) -> Self {
        Self {
            applications: ApplicationService::new(layout.clone(), runner.clone()),
            orchestrator: Orchestrator::new(layout.clone(), runner.clone()),
            status: StatusStore::new(layout.clone()),
            errors: ErrorLog::new(layout.clone()),
            env: EnvStore::new(layout.clone()),
            database: DatabaseService::new(layout.clone(), runner),
            layout,
            deploy_defaults,
            users,
            tokens,
        }
    }
}
