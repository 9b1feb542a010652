//! Main entry point for the Duel Arena coordination service
//!
//! Production entry point that initializes and runs the coordination core
//! with proper error handling, logging, and graceful shutdown.

use anyhow::Result;
use clap::Parser;
use duel_arena::config::AppConfig;
use duel_arena::service::{AppState, HealthCheck, HealthStatus};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

/// Duel Arena - matchmaking, duel rooms, and judge dispatch
#[derive(Parser)]
#[command(
    name = "duel-arena",
    version,
    about = "Coordination core for head-to-head competitive-programming duels",
    long_about = "Duel Arena pairs connected players of comparable skill into rated duels, \
                  manages each duel room from creation to settlement, and dispatches \
                  run/submit jobs to out-of-process language workers."
)]
struct Args {
    /// Perform health check and exit
    #[arg(long, help = "Perform a health check and exit with status code")]
    health_check: bool,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// HTTP port override
    #[arg(long, value_name = "PORT", help = "Override listener port")]
    port: Option<u16>,

    /// Cache URL override
    #[arg(long, value_name = "URL", help = "Override cache connection URL")]
    cache_url: Option<String>,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(long, help = "Validate configuration and exit without starting service")]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Perform health check and return appropriate exit code
async fn perform_health_check(config: AppConfig) -> Result<()> {
    info!("Performing health check...");

    let app_state = AppState::new(config)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    let app_state = Arc::new(app_state);

    match HealthCheck::check(app_state).await {
        Ok(report) => {
            println!("Health Check: {}", report.status);
            println!("  Queue size: {}", report.stats.queue_size);
            println!("  Active rooms: {}", report.stats.active_rooms);
            println!("  Outstanding timers: {}", report.stats.outstanding_timers);
            println!("  Connections: {}", report.stats.connections);

            if report.status == HealthStatus::Healthy {
                std::process::exit(0);
            } else {
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("Health check failed: {}", e);
            std::process::exit(1);
        }
    }
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    info!("Duel Arena Coordination Service");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!("   Port: {}", config.service.port);
    info!("   Cache: {}", config.cache.url);
    info!(
        "   Matchmaking timeout: {}ms, window: ±{}",
        config.matchmaking.timeout_ms, config.matchmaking.rating_window
    );
    info!(
        "   Match duration: {}s",
        config.duel.duration_seconds
    );
}

/// Load and merge configuration from environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = AppConfig::from_env()?;

    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }
    if args.debug {
        config.service.log_level = "debug".to_string();
    }
    if let Some(port) = args.port {
        config.service.port = port;
    }
    if let Some(cache_url) = &args.cache_url {
        config.cache.url = cache_url.clone();
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if args.health_check {
        return perform_health_check(config).await;
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without starting service");
        return Ok(());
    }

    display_startup_banner(&config);

    info!("Initializing service components...");
    let mut app_state = match AppState::new(config.clone()).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting service...");
    if let Err(e) = app_state.start().await {
        error!("Failed to start service: {}", e);
        std::process::exit(1);
    }

    info!("Duel Arena is running, press Ctrl+C to shutdown gracefully...");
    wait_for_shutdown_signal().await;

    info!("Shutdown signal received, beginning graceful shutdown...");
    let shutdown_timeout = config.shutdown_timeout();
    match tokio::time::timeout(shutdown_timeout, app_state.stop()).await {
        Ok(()) => info!("Graceful shutdown completed successfully"),
        Err(_) => warn!("Shutdown timeout exceeded, forcing exit"),
    }

    info!("Duel Arena stopped");
    Ok(())
}
