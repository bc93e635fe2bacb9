//! Region router server.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────┐
//!                 │                    REGION ROUTER                     │
//!                 │                                                      │
//!  API client ───▶│  http ──▶ RouterCore ──┬─▶ routing (assign/failover) │
//!                 │                        ├─▶ telemetry (metrics/health)│
//!                 │                        └─▶ alerts ──▶ dispatchers    │
//!                 │                                 │                    │
//!                 │  scheduler ──▶ health sweep ─────┤                    │
//!                 │     (10s)      service sweep     ▼                    │
//!                 │     (60s)      cleanup        storage (memory/file)  │
//!                 │                                                      │
//!                 │  config watcher ──▶ RouterCore::apply_config         │
//!                 └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use futures_util::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use region_router::config::{load_config, ConfigWatcher, RouterConfig};
use region_router::health::HttpProbe;
use region_router::lifecycle::{spawn_periodic, Shutdown};
use region_router::observability::{logging, metrics};
use region_router::storage::{FileStore, MemoryStore, Store};
use region_router::{HttpServer, RouterCore};

#[derive(Parser)]
#[command(name = "region-router")]
#[command(about = "Geo-aware region router", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // 1. Configuration, then logging from it
    let loaded = match &args.config {
        Some(path) => load_config(path),
        None => Ok(RouterConfig::default()),
    };
    let config = match loaded {
        Ok(config) => {
            logging::init_logging(&config.observability);
            config
        }
        Err(e) => {
            logging::init_logging(&RouterConfig::default().observability);
            tracing::error!(error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        regions = config.regions.len(),
        default_region = %config.routing.default_region,
        "region-router starting"
    );

    // 2. Storage
    let store: Arc<dyn Store> = match &config.storage.path {
        Some(path) => Arc::new(FileStore::open(path)?),
        None => Arc::new(MemoryStore::new()),
    };

    // 3. Metrics exporter
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // 4. Core and scheduled jobs
    let core = Arc::new(RouterCore::new(
        config.clone(),
        store,
        Arc::new(HttpProbe::new()),
    )?);

    let shutdown = Shutdown::new();
    let mut jobs = Vec::new();

    if config.health_check.enabled {
        let job_core = core.clone();
        jobs.push(spawn_periodic(
            "health_sweep",
            Duration::from_secs(config.health_check.interval_secs),
            shutdown.subscribe(),
            move || {
                let core = job_core.clone();
                async move { core.run_health_sweep().await.map(|_| ()) }
            },
        ));
    } else {
        tracing::info!("Health sweep disabled");
    }

    let job_core = core.clone();
    jobs.push(spawn_periodic(
        "service_sweep",
        Duration::from_secs(config.aggregation.interval_secs),
        shutdown.subscribe(),
        move || {
            let core = job_core.clone();
            async move { core.run_service_sweep().map(|_| ()) }
        },
    ));

    let job_core = core.clone();
    jobs.push(spawn_periodic(
        "cleanup",
        Duration::from_secs(config.retention.cleanup_interval_secs),
        shutdown.subscribe(),
        move || {
            let core = job_core.clone();
            async move { core.cleanup().map(|_| ()) }
        },
    ));

    if config.storage.path.is_some() {
        let job_core = core.clone();
        jobs.push(spawn_periodic(
            "store_flush",
            Duration::from_secs(config.storage.flush_interval_secs),
            shutdown.subscribe(),
            move || job_core.clone().flush_blocking(),
        ));
    }

    // 5. Hot reload
    let _watcher = match &args.config {
        Some(path) => {
            let (watcher, mut updates) = ConfigWatcher::new(path);
            let watcher = watcher.run()?;
            let reload_core = core.clone();
            let mut reload_shutdown = shutdown.subscribe();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        Some(new_config) = updates.recv() => reload_core.apply_config(new_config),
                        _ = reload_shutdown.recv() => break,
                        else => break,
                    }
                }
            });
            Some(watcher)
        }
        None => None,
    };

    tokio::spawn(shutdown.clone().listen_for_signals());

    // 6. Serve until shutdown
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    HttpServer::new(core.clone())
        .run(listener, shutdown.subscribe())
        .await?;

    // 7. Drain jobs, final flush
    shutdown.trigger();
    join_all(jobs).await;
    if let Err(e) = core.clone().flush_blocking().await {
        tracing::error!(error = %e, "Final store flush failed");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
