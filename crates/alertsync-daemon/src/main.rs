//! alertsync-daemon binary.
//!
//! Bootstrap order matters: configuration is loaded and secrets resolved
//! before any component is constructed, so every component receives an
//! explicitly built, immutable configuration value — nothing reads the
//! process environment after startup. The webhook server comes up first;
//! the startup reconciliation sweep runs in the background after its
//! configured delay so missed deliveries are corrected without blocking
//! readiness.

use std::path::PathBuf;
use std::sync::Arc;

use alertsync_core::{
    EventProcessor, IssueLedger, ReconciliationSweep, SignatureGuard,
};
use alertsync_daemon::config::DaemonConfig;
use alertsync_daemon::github::{GitHubClient, GitHubLedger};
use alertsync_daemon::sweep::spawn_startup_sweep;
use alertsync_daemon::webhook::{router, AppState};
use anyhow::{Context, Result};
use clap::Parser;
use secrecy::SecretString;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// alertsync daemon - code scanning alert to issue ledger sync
#[derive(Parser, Debug)]
#[command(name = "alertsync-daemon")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the daemon configuration file
    #[arg(short, long, default_value = "alertsync.toml")]
    config: PathBuf,

    /// Listen address override (e.g. 127.0.0.1:8080)
    #[arg(long)]
    listen: Option<std::net::SocketAddr>,
}

/// Reads a required secret from the environment variable named in config.
fn resolve_env_secret(var_name: &str) -> Result<SecretString> {
    let value = std::env::var(var_name)
        .with_context(|| format!("missing required environment variable: {var_name}"))?;
    Ok(SecretString::from(value))
}

/// Reads an optional secret; absent or empty resolves to `None`.
fn resolve_optional_env_secret(var_name: &str) -> Option<SecretString> {
    std::env::var(var_name)
        .ok()
        .filter(|value| !value.is_empty())
        .map(SecretString::from)
}

async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sig) => sig,
        Err(error) => {
            tracing::error!(%error, "failed to install SIGTERM handler");
            std::future::pending::<()>().await;
            unreachable!();
        },
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("received SIGINT, shutting down"),
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = DaemonConfig::from_file(&args.config)
        .with_context(|| format!("failed to load configuration from {}", args.config.display()))?;

    // Secrets are resolved exactly once, here.
    let webhook_secret = resolve_env_secret(&config.github.webhook_secret_env)?;
    let api_token = resolve_optional_env_secret(&config.github.api_token_env);
    if api_token.is_none() {
        tracing::warn!(
            var = %config.github.api_token_env,
            "no API token configured, ledger calls will be unauthenticated"
        );
    }

    let listen_addr = args.listen.unwrap_or(config.server.listen_addr);
    let policy = config.sync.policy();

    info!(
        repository = %format!("{}/{}", config.github.owner, config.github.repo),
        strategy = %policy.strategy(),
        main_branch = %policy.main_branch(),
        "starting alertsync daemon"
    );

    let client = GitHubClient::new(
        config.github.api_base_url.clone(),
        api_token,
        config.github.request_timeout(),
    );
    let ledger: Arc<dyn IssueLedger> = Arc::new(GitHubLedger::new(
        client,
        config.github.owner.clone(),
        config.github.repo.clone(),
    ));

    let state = AppState {
        guard: Arc::new(SignatureGuard::new(webhook_secret)),
        processor: Arc::new(EventProcessor::new(Arc::clone(&ledger), policy.clone())),
    };

    // The sweep shares the ledger and policy but runs as its own task.
    let sweep = ReconciliationSweep::new(EventProcessor::new(ledger, policy));
    spawn_startup_sweep(sweep, config.sync.sweep.clone());

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind {listen_addr}"))?;
    info!(addr = %listen_addr, "webhook server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("daemon stopped");
    Ok(())
}
