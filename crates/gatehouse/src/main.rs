//! # Gatehouse - Portcullis Sign-in Gate
//!
//! Guards the admin area's password sign-in against brute force: counts
//! failed attempts, locks the form out for a time window once the threshold
//! is reached, and asks an arithmetic challenge before every attempt.
//!
//! ## Architecture
//! ```text
//! Browser → Gatehouse → Auth service (GoTrue)
//!              ↓
//!        Redis (attempt ledger)
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod auth;
mod challenge;
mod clock;
mod config;
mod ledger;
mod lockout;
mod routes;
mod signin;
mod state;

use config::AppConfig;
use state::AppState;

/// Portcullis Gatehouse - admin sign-in gate
#[derive(Parser, Debug)]
#[command(name = "gatehouse")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/gatehouse.toml")]
    config: String,

    /// Redis URL (overrides config)
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Listen address (overrides config)
    #[arg(short, long, env = "LISTEN_ADDR")]
    listen: Option<String>,

    /// Authentication service base URL (overrides config)
    #[arg(long, env = "AUTH_URL")]
    auth_url: Option<String>,

    /// Authentication service public key (overrides config)
    #[arg(long, env = "AUTH_ANON_KEY", hide_env_values = true)]
    auth_anon_key: Option<String>,

    /// Keep the attempt ledger in memory instead of Redis
    #[arg(long, default_value = "false")]
    memory_ledger: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level, args.json_logs)?;

    info!(
        "🏰 Starting Portcullis Gatehouse v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Load configuration
    let config = AppConfig::load(&args.config, &args)?;
    info!("📋 Configuration loaded from {}", args.config);

    let policy = config.lockout_policy();
    info!(
        threshold = policy.threshold,
        lockout_secs = policy.lockout_duration.as_secs(),
        "🔒 Lockout policy"
    );

    // Initialize application state
    let state = AppState::new(&config, args.memory_ledger).await?;

    // Build router
    let app = routes::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    info!("🚀 Gatehouse listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("👋 Gatehouse shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("🛑 Shutdown signal received");
}

/// Initialize structured logging with tracing
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }

    Ok(())
}
