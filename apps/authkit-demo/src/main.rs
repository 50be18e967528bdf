//! authkit demo server.
//!
//! Loads YAML configuration (with `AUTHKIT__` environment overrides), builds
//! the auth filter from the static plugin and serves a handful of routes
//! with graceful shutdown on ctrl-c.

mod app;
mod config;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use crate::config::DemoConfig;

/// Small axum service protected by authkit
#[derive(Parser, Debug)]
#[command(name = "authkit-demo", version, about, long_about = None)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides `bind_addr` from the configuration
    #[arg(long)]
    bind: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for ctrl-c");
    }
    tracing::info!("Shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let mut cfg = DemoConfig::load(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        cfg.bind_addr = bind;
    }
    tracing::info!(
        realm = %cfg.auth.realm,
        users = cfg.static_auth.users.len(),
        "Configuration loaded"
    );

    let router = app::router(&cfg)?;
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.bind_addr))?;
    tracing::info!(addr = %cfg.bind_addr, "Listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")
}
