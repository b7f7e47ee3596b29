//! Deckhand - Entry Point
//!
//! Dashboard backend that deploys Node.js applications from git and
//! supervises them through PM2.

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info, warn};

use deckhand::app::options::AppOptions;
use deckhand::app::run::run;
use deckhand::authn::users::hash_password;
use deckhand::errors::DashboardError;
use deckhand::filesys::file::File;
use deckhand::logs::{init_logging, LogOptions};
use deckhand::storage::settings::Settings;
use deckhand::utils::version_info;

#[derive(Debug, Parser)]
#[command(name = "deckhand", about = "Deploy and supervise Node.js applications")]
struct Cli {
    /// Settings file
    #[arg(long, env = "DECKHAND_CONFIG", default_value = "/etc/deckhand/settings.json")]
    config: PathBuf,

    /// Secret for signing session tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    /// Print version information and exit
    #[arg(long)]
    version: bool,

    /// Print a password hash for the settings file and exit
    #[arg(long, value_name = "PASSWORD")]
    hash_password: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Print version and exit
    if cli.version {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to render version: {}", e),
        }
        return;
    }

    if let Some(password) = &cli.hash_password {
        match hash_password(password) {
            Ok(hash) => println!("{}", hash),
            Err(e) => {
                eprintln!("{}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    // Retrieve the settings file
    let settings_file = File::new(&cli.config);
    let (mut settings, settings_error) = match settings_file.read_json::<Settings>().await {
        Ok(settings) => (settings, None),
        Err(e) => (Settings::default(), Some(e)),
    };
    if cli.jwt_secret.is_some() {
        settings.auth.jwt_secret = cli.jwt_secret.clone();
    }

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level,
        json_format: settings.log_json,
        log_dir: settings.log_dir.clone(),
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    match settings_error {
        Some(DashboardError::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Settings file {} not found, using defaults", cli.config.display());
        }
        Some(e) => {
            error!("Unable to read settings file {}: {}", cli.config.display(), e);
            return;
        }
        None => {}
    }

    let options = AppOptions::from(settings);
    info!(
        "Running Deckhand {} on {}:{} with applications in {}",
        version_info().version,
        options.server.host,
        options.server.port,
        options.layout.apps_dir.display()
    );

    if let Err(e) = run(options, await_shutdown_signal()).await {
        error!("Failed to run the dashboard: {e}");
        std::process::exit(1);
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                _ => {
                    error!("Failed to install signal handlers, falling back to Ctrl+C");
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Ctrl+C received, shutting down...");
    }
}
