//! # minidod: minido bus daemon
//!
//! Composition root that wires all adapters together and starts the bridge.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars) and install logging
//! - Initialize the `SQLite` connection pool and run migrations
//! - Purge expired history and replay the rest into the module registry
//! - Start the history recorder and the bus connection
//! - Build the axum router over the control-plane service and serve it
//! - Handle graceful shutdown (SIGTERM/SIGINT), flushing buffered history
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer: no domain logic belongs here.

mod config;

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use minido_adapter_http_axum::router;
use minido_adapter_http_axum::state::AppState;
use minido_adapter_storage_sqlite_sqlx::{Config as StorageConfig, SqliteHistoryRepository};
use minido_adapter_transport_tcp::{BusConnection, TcpTransport};
use minido_app::event_bus::InProcessEventBus;
use minido_app::history_recorder::HistoryRecorder;
use minido_app::ports::HistoryRepository;
use minido_app::registry::ModuleRegistry;
use minido_app::router::FrameRouter;
use minido_app::services::BusService;
use minido_domain::time::{now, retention_cutoff};

use crate::config::Config;

/// How long open HTTP connections may run after a shutdown request.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("loading minido.toml")?;

    let filter = EnvFilter::try_new(&config.logging.filter)
        .with_context(|| format!("invalid log filter `{}`", config.logging.filter))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Database
    let db = StorageConfig {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await
    .context("opening history database")?;
    let repository = Arc::new(SqliteHistoryRepository::new(db.pool().clone()));

    let cutoff = retention_cutoff(now(), config.database.retention_days);
    let purged = repository.purge_before(cutoff).await?;
    let persisted = repository.load_all().await?;

    // Bus
    let event_bus = Arc::new(InProcessEventBus::new(config.bus.event_capacity));
    let (recorder, recorder_task) =
        HistoryRecorder::spawn(Arc::clone(&repository), config.commit_delay());
    let (transport, outbound) = TcpTransport::channel();
    let registry = Arc::new(ModuleRegistry::new(
        config.registry(),
        recorder,
        transport,
        Arc::clone(&event_bus),
    ));
    let restored = registry.restore(persisted);
    tracing::info!(purged, restored, "history loaded");

    let connection = tokio::spawn(
        BusConnection::new(
            config.transport(),
            outbound,
            FrameRouter::new(Arc::clone(&registry)),
        )
        .run(),
    );

    // Devices
    let mut service = BusService::new(registry).with_learn_inputs(config.learn_inputs()?);
    let timing = config.shade_timing();
    for device in config.devices()? {
        tracing::debug!(device = %device.id, kind = device.kind.as_str(), name = %device.name, "device configured");
        service.add_device(device, timing)?;
    }

    // HTTP
    let state = AppState::new(Arc::new(service), event_bus);
    let app = router::build(state);

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    tracing::info!(%bind_addr, bus = %config.bus.address, "minidod listening");

    let (stopping_tx, stopping_rx) = watch::channel(false);
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        let _ = stopping_tx.send(true);
    });
    // SSE responses never complete on their own.
    tokio::select! {
        result = server.into_future() => result?,
        () = grace_period(stopping_rx) => tracing::warn!("open connections did not close in time"),
    }

    connection.abort();
    let _ = connection.await;
    recorder_task
        .shutdown()
        .await
        .context("flushing history")?;
    tracing::info!("minidod stopped");

    Ok(())
}

async fn grace_period(mut stopping: watch::Receiver<bool>) {
    if stopping.wait_for(|stopping| *stopping).await.is_ok() {
        tokio::time::sleep(SHUTDOWN_GRACE).await;
    } else {
        std::future::pending::<()>().await;
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!(%error, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown requested");
}
