//! arisan-gateway server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints, the
//! randomness fulfillment worker and, when enabled, the persistence
//! tasks.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use arisan_gateway::config::GatewayConfig;
use arisan_gateway::persistence::{self, EventRecorder, PostgresPersistence, SnapshotTask};
use arisan_gateway::server::{build_app, build_state};
use arisan_gateway::service::FulfillmentWorker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = GatewayConfig::from_env().context("invalid configuration")?;
    tracing::info!(addr = %config.listen_addr, "starting arisan-gateway");

    // Build domain, randomness and service layers
    let (app_state, announcements) =
        build_state(&config).context("failed to build application state")?;

    // Recover persisted state and start the writers
    if config.persistence_enabled {
        let store = PostgresPersistence::connect(&config)
            .await
            .context("failed to connect to postgres")?;
        store.migrate().await.context("failed to run migrations")?;

        let service = &app_state.arisan_service;
        let report = persistence::recover(
            &store,
            service.registry(),
            service.payout_ledger(),
            &app_state.coordinator,
        )
        .await
        .context("failed to recover persisted state")?;
        tracing::info!(arisans = report.arisans, "persistence enabled");

        // Draws settled from the event log still have a stale row stored.
        let restored: Vec<_> = service
            .registry()
            .snapshot_all()
            .await
            .into_iter()
            .filter(|s| !report.settled_draws.contains(&s.arisan.id()))
            .collect();
        let _recorder = EventRecorder::new(
            store.clone(),
            app_state.event_bus.subscribe(),
            config.event_log_enabled,
        )
        .spawn();
        let _snapshots = SnapshotTask::new(
            store,
            Arc::clone(service.registry()),
            std::time::Duration::from_secs(config.snapshot_interval_secs),
            config.cleanup_after_days,
            &restored,
        )
        .spawn();
    } else {
        tracing::info!("persistence disabled; state lives in memory only");
    }

    // Answer randomness requests in the background
    if config.vrf_auto_fulfill {
        let _worker = FulfillmentWorker::new(
            Arc::clone(&app_state.coordinator),
            app_state.arisan_service.as_ref().clone(),
            announcements,
            config.vrf_fulfillment_delay,
        )
        .spawn();
    } else {
        drop(announcements);
        tracing::info!("auto-fulfillment disabled; use POST /api/v1/randomness/requests/{{request_id}}/fulfill");
    }

    // Build router
    let app = build_app(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
