//! TechCare Daemon - diagnostics, cleanup and guided maintenance over HTTP

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use techcared::cleaner::Cleaner;
use techcared::snapshot::HostCollector;
use techcared::{maintenance, server, AppState, Config};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "techcared")]
#[command(about = "TechCare diagnostic daemon", version)]
struct Args {
    /// Config file (default: $TECHCARE_CONFIG, then /etc/techcare/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen address
    #[arg(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config messages go through a bootstrap subscriber until [log] level is known
    let bootstrap = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    let mut config = tracing::subscriber::with_default(bootstrap, || {
        Config::load(args.config.as_deref())
    })?;
    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }

    // RUST_LOG wins over the config file
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&config.log.level))
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("[BOOT] TechCare Daemon v{} starting...", env!("CARGO_PKG_VERSION"));

    let collector = HostCollector::new(
        config.diagnostics.connectivity_target.clone(),
        config.diagnostics.effective_connectivity_timeout(),
    );
    let cleaner = Cleaner::from_config(&config.cleaner).context("cleaner setup failed")?;
    let state = Arc::new(
        AppState::new(config, Arc::new(collector), cleaner).context("state setup failed")?,
    );
    info!("  Analyzers: {:?}", state.diagnostics.categories());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = if state.config.scheduler.enabled {
        Some(tokio::spawn(maintenance::run_scheduler(
            state.clone(),
            state.config.scheduler.effective_tick(),
            shutdown_rx,
        )))
    } else {
        info!("  Maintenance scheduler disabled");
        None
    };

    server::run(state, shutdown_signal()).await?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = scheduler {
        if let Err(e) = handle.await {
            warn!("  Scheduler task ended abnormally: {}", e);
        }
    }
    info!("[BOOT] TechCare Daemon stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("  Failed to install Ctrl-C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!("  Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("  Shutdown signal received");
}
