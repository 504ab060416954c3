//! Vigil - Entry Point
//!
//! Runs one full probe cycle and exits. A non-zero exit code means the
//! configuration could not be loaded; probe and recovery failures are
//! reported through logs and notifications instead.

use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod config;
mod error;
mod models;
mod notify;
mod orchestrator;
mod probe;
mod routing;
mod store;

use cli::Cli;
use config::Config;
use notify::TelegramNotifier;
use orchestrator::FailoverOrchestrator;
use probe::HttpProbeDriver;
use routing::XrayRoutingController;
use store::StateStore;

#[tokio::main]
async fn main() -> error::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "vigil=debug" } else { "vigil=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Vigil");

    let mut config = Config::load(&cli.config)?;
    if let Some(path) = cli.state_file {
        config.state_file = path;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.probe_timeout_ms = timeout_ms;
    }
    config.validate()?;
    info!(
        "Configuration loaded: {} probes, state at {}",
        config.probes.len(),
        config.state_file.display()
    );
    if cli.dry_run {
        info!("Dry-run: routing commands are logged, not executed");
    }

    let config = Arc::new(config);
    let store = Arc::new(StateStore::open(&config.state_file));
    let driver = Arc::new(HttpProbeDriver::new(
        config.probe_timeout(),
        config.user_agent.clone(),
    ));
    let routing = Arc::new(XrayRoutingController::new(
        config.router.api.clone(),
        config.router.exe.clone(),
        cli.dry_run,
    ));
    let notifier = Arc::new(TelegramNotifier::new(config.telegram.clone()));

    let orchestrator = FailoverOrchestrator::new(
        config.clone(),
        driver,
        routing,
        notifier,
        store,
    );

    let deadline = config.cycle_deadline();
    let cycle = async {
        match deadline {
            Some(limit) => match tokio::time::timeout(limit, orchestrator.run_cycle()).await {
                Ok(summary) => Some(summary),
                Err(_) => {
                    warn!("Cycle deadline of {:?} exceeded, aborting", limit);
                    None
                }
            },
            None => Some(orchestrator.run_cycle().await),
        }
    };

    tokio::select! {
        outcome = cycle => {
            if outcome.is_some() {
                info!("Vigil finished");
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received, aborting cycle");
        }
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
