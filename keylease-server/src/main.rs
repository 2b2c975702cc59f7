//! License key validation and leasing server.
//!
//! Usage:
//!   keylease-server --storage keys.json --bind 0.0.0.0:5000
//!
//! Set `KEYLEASE_ADMIN_PASSWORD` to enable the admin surface.

use anyhow::{Context, Result};
use clap::Parser;
use keylease_core::KeyStore;
use keylease_server::{build_router, config::ADMIN_PASSWORD_ENV, AppState, ServerConfig, SessionStore};
use std::{net::SocketAddr, path::PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "keylease-server")]
#[command(about = "License key validation and leasing server")]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on (overrides the config file)
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Path to the key storage file (overrides the config file)
    #[arg(short, long)]
    storage: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ServerConfig::default(),
    }
    .with_admin_password_from(std::env::var(ADMIN_PASSWORD_ENV).ok());
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(storage) = args.storage {
        config.storage_path = storage;
    }

    let filter = config
        .log_filter
        .clone()
        .unwrap_or_else(|| if args.verbose { "debug" } else { "info" }.to_string());
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_new(&filter).context("Invalid log filter")?)
        .with_target(false)
        .compact()
        .init();

    info!("Key lease server starting...");
    let store = KeyStore::open_with_limit(&config.storage_path, config.max_storage_bytes)
        .with_context(|| format!("Failed to load key store {}", config.storage_path.display()))?;

    if config.admin_password.is_none() {
        warn!("No admin password configured (set {}); admin surface disabled", ADMIN_PASSWORD_ENV);
    }
    let sessions = SessionStore::new(config.admin_password.as_deref(), config.session_ttl_secs);
    let app = build_router(AppState::new(store, sessions));

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!("Listening on http://{}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Key lease server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
