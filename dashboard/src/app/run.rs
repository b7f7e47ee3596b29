//! Main application run loop

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::app::options::AppOptions;
use crate::authn::token::TokenService;
use crate::authn::users::UserStore;
use crate::deploy::command::{CommandExecutor, CommandRunner};
use crate::errors::DashboardError;
use crate::server::serve::serve;
use crate::server::state::ServerState;

/// Run the dashboard until `shutdown_signal` resolves
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), DashboardError> {
    info!("Initializing Deckhand...");

    // Create shutdown channel
    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(shutdown_tx.clone(), options.max_shutdown_delay);

    if let Err(e) = init(&options, &mut shutdown_manager, shutdown_tx.subscribe()).await {
        error!("Failed to start dashboard: {}", e);
        shutdown_manager.shutdown().await?;
        return Err(e);
    }

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

// =============================== INITIALIZATION ================================== //

/// Build the shared state from options
pub fn init_server_state(
    options: &AppOptions,
    runner: Arc<dyn CommandRunner>,
) -> Result<ServerState, DashboardError> {
    let users = UserStore::new(&options.auth.users)?;
    if users.has_default_admin() {
        warn!("The default admin account (admin/admin123) is active; configure auth.users");
    }
    let tokens = TokenService::new(options.auth.jwt_secret.clone(), options.auth.token_ttl_hours);

    Ok(ServerState::new(
        options.layout.clone(),
        runner,
        options.deploy.clone(),
        users,
        tokens,
    ))
}

async fn init(
    options: &AppOptions,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DashboardError> {
    if options.auth.jwt_secret.as_deref().is_none_or(str::is_empty) {
        warn!("No JWT secret configured; logins will fail until JWT_SECRET is set");
    }

    options.layout.setup().await?;
    info!("Applications directory: {}", options.layout.apps_dir.display());

    let runner: Arc<dyn CommandRunner> = Arc::new(CommandExecutor::new(options.executor.clone()));
    let server_state = init_server_state(options, runner)?;

    info!("Initializing HTTP server...");
    let server_handle = serve(&options.server, Arc::new(server_state), async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;

    shutdown_manager.with_server_handle(server_handle);
    Ok(())
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    max_shutdown_delay: Duration,
    server_handle: Option<JoinHandle<Result<(), DashboardError>>>,
}

impl ShutdownManager {
    fn new(shutdown_tx: broadcast::Sender<()>, max_shutdown_delay: Duration) -> Self {
        Self {
            shutdown_tx,
            max_shutdown_delay,
            server_handle: None,
        }
    }

    fn with_server_handle(&mut self, handle: JoinHandle<Result<(), DashboardError>>) {
        self.server_handle = Some(handle);
    }

    async fn shutdown(mut self) -> Result<(), DashboardError> {
        // the server task may already be gone, so a failed send is fine
        let _ = self.shutdown_tx.send(());

        let Some(handle) = self.server_handle.take() else {
            info!("Shutdown complete");
            return Ok(());
        };

        match tokio::time::timeout(self.max_shutdown_delay, handle).await {
            Ok(joined) => {
                joined??;
                info!("Shutdown complete");
                Ok(())
            }
            Err(_) => {
                error!(
                    "Server did not stop within {:?}, forcing shutdown",
                    self.max_shutdown_delay
                );
                Err(DashboardError::ServerError("Shutdown timed out".to_string()))
            }
        }
    }
}
