//! cb-gateway: Calendar Reminder Bot Main Binary
//!
//! Usage:
//!   cb-gateway                    - Start the bot with ./cb-gateway.toml
//!   cb-gateway --config <path>    - Start the bot with another config file
//!   cb-gateway --help             - Show help

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use cb_calendar::CalendarEvent;
use cb_core::config::DEFAULT_CONFIG_PATH;
use cb_core::{Config, Datastore, Notifier, SqliteStore, UserRegistry};
use cb_matrix::{MatrixApiClient, MatrixBot, MatrixNotifier, render_reminder};
use chrono::Utc;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

/// Run mode
enum RunMode {
    Run { config_path: PathBuf },
    Help,
    Version,
}

/// Notifier used while no Matrix token is configured
struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, room_id: &str, event: &CalendarEvent) -> anyhow::Result<()> {
        tracing::info!(room = %room_id, "{}", render_reminder(event));
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = match parse_args()? {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("cb-gateway {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        RunMode::Run { config_path } => config_path,
    };

    // Initialize logging
    tracing_subscriber::fmt().with_env_filter(log_filter(None)?).init();

    let (config, created) =
        Config::load_or_create(&config_path).map_err(|e| anyhow::anyhow!("Config error: {}", e))?;
    if created {
        println!(
            "Wrote a default configuration to {}. Fill in the [matrix] section and start again.",
            config_path.display()
        );
        return Ok(());
    }

    tracing::info!("Starting cb-gateway...");
    run(config).await
}

/// Load `.env` (or `env_file`), then build the log filter from RUST_LOG
fn log_filter(env_file: Option<&Path>) -> anyhow::Result<EnvFilter> {
    // A missing file is fine
    let _ = match env_file {
        Some(path) => dotenvy::from_path(path),
        None => dotenvy::dotenv().map(drop),
    };
    Ok(EnvFilter::from_default_env().add_directive("info".parse()?))
}

/// Parse command line arguments
fn parse_args() -> anyhow::Result<RunMode> {
    let mut args = std::env::args().skip(1);
    let mut config_path = PathBuf::from(DEFAULT_CONFIG_PATH);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(RunMode::Help),
            "--version" | "-v" => return Ok(RunMode::Version),
            "--config" | "-c" => {
                let path = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config needs a path"))?;
                config_path = PathBuf::from(path);
            }
            other => anyhow::bail!("Unknown argument: {} (see --help)", other),
        }
    }

    Ok(RunMode::Run { config_path })
}

/// Print help message
fn print_help() {
    println!("cb-gateway - Calendar reminder bot for Matrix");
    println!();
    println!("Usage:");
    println!("  cb-gateway                  Start the bot");
    println!("  cb-gateway --config <path>  Use another config file (default: {})", DEFAULT_CONFIG_PATH);
    println!("  cb-gateway --help           Show this help message");
    println!("  cb-gateway --version        Show version");
    println!();
    println!("Environment Variables:");
    println!("  MATRIX_HOMESERVER    Homeserver URL");
    println!("  MATRIX_ACCOUNT_ID    Bot account, e.g. @calendarbot:example.org");
    println!("  MATRIX_TOKEN         Access token (bot is disabled without one)");
    println!("  DB_PATH              SQLite database path");
    println!("  RUST_LOG             Log filter (default: info)");
}

/// Load users, schedule reminders and serve chat until Ctrl+C
async fn run(config: Config) -> anyhow::Result<()> {
    let store: Arc<dyn Datastore> = Arc::new(
        SqliteStore::new(&config.database.path)
            .map_err(|e| anyhow::anyhow!("Failed to open database: {}", e))?,
    );

    let matrix_api = if config.matrix_enabled() {
        Some(MatrixApiClient::new(&config.matrix.homeserver, &config.matrix.token)?)
    } else {
        None
    };

    let notifier: Arc<dyn Notifier> = match &matrix_api {
        Some(api) => Arc::new(MatrixNotifier::new(api.clone())),
        None => Arc::new(LogNotifier),
    };

    let registry = Arc::new(UserRegistry::new(store, notifier, config.reminders.clone()));
    registry
        .populate_from_persistence()
        .map_err(|e| anyhow::anyhow!("Failed to load users: {}", e))?;

    let horizon = config.reminders.horizon();
    registry.arm_all(Utc::now() + horizon).await;

    // Track running services for graceful shutdown
    let mut service_handles = Vec::new();
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Periodic re-arm picks up calendar changes and recovers failed fetches
    let refresh_registry = Arc::clone(&registry);
    let refresh_interval = config.reminders.refresh_interval();
    service_handles.push(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(refresh_interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            tracing::debug!("Refreshing reminders");
            refresh_registry.arm_all(Utc::now() + horizon).await;
        }
    }));
    tracing::info!("Refreshing reminders every {:?}", refresh_interval);

    // Start Matrix bot if a token is configured
    if let Some(api) = matrix_api {
        let bot = MatrixBot::new(&config.matrix, api, Arc::clone(&registry))?;
        let shutdown = shutdown_tx.subscribe();
        service_handles.push(tokio::spawn(async move {
            if let Err(e) = bot.run(shutdown).await {
                tracing::error!("Matrix bot error: {}", e);
            }
        }));
        tracing::info!("Matrix bot started");
    } else {
        tracing::info!("Matrix bot disabled (no token configured)");
    }

    tracing::info!("cb-gateway initialized with {} users", registry.len());
    tracing::info!("Press Ctrl+C to exit");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    let _ = shutdown_tx.send(());
    for handle in service_handles {
        handle.abort();
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
