//! `serve` command implementation.

use anyhow::{Context, Result};
use contracts::BroadcasterConfig;
use config_loader::ConfigLoader;
use streaming::{AppState, HttpServer};
use tracing::{error, info, warn};

use crate::cli::ServeArgs;

/// Execute the `serve` command
pub async fn run_serve(args: &ServeArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let mut config = ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    apply_overrides(&mut config, args);
    ConfigLoader::validate(&config).context("Invalid configuration after CLI overrides")?;

    info!(
        addr = %config.server.socket_addr(),
        channels = config.channels.len(),
        backpressure = ?config.delivery.backpressure,
        "Configuration loaded"
    );

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    let (state, dispatcher) = AppState::from_config(&config);
    let dispatcher_task = dispatcher.spawn();

    let server = HttpServer::new(config.server.clone(), state);
    let served = server.serve(shutdown_signal()).await;

    if let Err(e) = dispatcher_task.await {
        error!(error = ?e, "Dispatcher task panicked");
    }
    served.context("HTTP server failed")?;

    info!("Broadcaster finished");
    Ok(())
}

fn apply_overrides(config: &mut BroadcasterConfig, args: &ServeArgs) {
    if let Some(ref host) = args.host {
        info!(host = %host, "Overriding listen host from CLI");
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        info!(port = %port, "Overriding listen port from CLI");
        config.server.port = port;
    }
}

/// Resolves on Ctrl+C or SIGTERM
///
/// A handler that cannot be installed is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    warn!("Received shutdown signal, stopping broadcaster...");
}
