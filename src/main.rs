//! route-reloader service.
//!
//! # Architecture Overview
//!
//! ```text
//!   routes.toml ──▶ source (notify + diff) ──┐
//!                                            ├──▶ ReloadHandle ──▶ coordinator
//!   POST /admin/changes ─────────────────────┘                      │
//!                                                                   ▼
//!                        reduce ──▶ store ──▶ compile ──▶ RouteTable (ArcSwap)
//!                                                                   │
//!   GET /admin/{status,routes,match} ◀──────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use route_reloader::config::{load_config, ReloaderConfig};
use route_reloader::events::{KeyPattern, Reducer};
use route_reloader::http::{AdminServer, AppState};
use route_reloader::lifecycle::{signals, Shutdown};
use route_reloader::observability::{logging, metrics};
use route_reloader::reload::{ReloadCoordinator, ReloadSettings, RouteTable};
use route_reloader::routing::RouteStore;
use route_reloader::source::FileSource;

#[derive(Parser)]
#[command(name = "route-reloader", version)]
#[command(about = "Live-reloadable gateway route table", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "ROUTE_RELOADER_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ReloaderConfig::default(),
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), config = ?args.config, "route-reloader starting");

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?)?;
    }

    let shutdown = Shutdown::new();
    let store = Arc::new(RouteStore::new());
    let table = Arc::new(RouteTable::new());
    let keys = KeyPattern::new(config.source.key_prefix.clone());

    let (reloads, coordinator) = ReloadCoordinator::new(
        store,
        table.clone(),
        Reducer::new(keys.clone()),
        ReloadSettings {
            compile_budget: config.reload.compile_budget(),
        },
    )
    .spawn(shutdown.subscribe());

    let mut refreshed = table.subscribe();
    let mut stop_listener = shutdown.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                event = refreshed.recv() => match event {
                    Ok(event) => tracing::info!(
                        generation = event.generation,
                        routes = event.route_count,
                        batch_id = %event.batch_id,
                        "Routes refreshed"
                    ),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "Refresh listener lagged");
                    }
                    Err(_) => break,
                },
                _ = stop_listener.recv() => break,
            }
        }
    });

    // Dropping the watcher stops it, so it lives until main returns.
    let _watcher = match &config.source.route_file {
        Some(path) => {
            let source = Arc::new(FileSource::new(path, keys, Arc::new(reloads.clone())));
            if let Err(e) = source.sync() {
                tracing::error!(path = ?path, error = %e, "Initial route file load failed");
            }
            Some(source.watch(config.source.poll_interval())?)
        }
        None => {
            tracing::info!("No route file configured, routes arrive through the admin API only");
            None
        }
    };

    let admin = if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        let state = AppState::new(table.clone(), reloads.clone(), config.admin.api_key.clone());
        let server = AdminServer::new(state);
        Some(tokio::spawn(server.run(listener, shutdown.subscribe())))
    } else {
        None
    };

    signals::wait_for_termination().await;
    tracing::info!("Shutting down");
    shutdown.trigger();

    if let Some(admin) = admin {
        match admin.await {
            Ok(Err(e)) => tracing::error!(error = %e, "Admin server failed"),
            Err(e) => tracing::error!(error = %e, "Admin server task panicked"),
            Ok(Ok(())) => {}
        }
    }
    drop(reloads);
    if let Err(e) = coordinator.await {
        tracing::error!(error = %e, "Reload coordinator task panicked");
    }

    tracing::info!(generation = table.current().number(), "Shutdown complete");
    Ok(())
}
