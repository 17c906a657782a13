//! Taskboard Backend - Main Entry Point
//!
//! Task records over HTTP with OpenTelemetry traces and metrics, periodic
//! background samplers and graceful shutdown.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info};

use taskboard_backend::api::{self, AppState};
use taskboard_backend::config::Config;
use taskboard_backend::middleware::build_service_stack;
use taskboard_backend::observability::sampler::{
    DomainSampler, PoolSampler, ProcFsProbe, ProcessSampler, RefreshTrigger, ScheduledSampler,
};
use taskboard_backend::observability::{Instruments, OperationTracker, Telemetry};
use taskboard_backend::shutdown::{wait_for_signal, ShutdownCoordinator};
use taskboard_backend::storage::SqliteTaskStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize OpenTelemetry; an unreachable collector aborts startup
    let telemetry = Telemetry::new(config.telemetry_config()).init().await?;

    info!("Starting Taskboard Backend");

    let instruments = Instruments::register(&telemetry.meter())?;

    let store = Arc::new(
        SqliteTaskStore::open(&config.database_path, config.pool_options())
            .await
            .context("failed to open task store")?,
    );

    let tracker = OperationTracker::new(&instruments.db);
    let refresh = RefreshTrigger::new();
    let intervals = config.sampler_intervals();

    let domain = Arc::new(DomainSampler::new(store.clone(), instruments.tasks.clone()));
    domain.refresh_now().await;

    let mut coordinator = ShutdownCoordinator::new();
    telemetry.start_samplers(
        &mut coordinator,
        [
            ScheduledSampler::every(
                Arc::new(ProcessSampler::new(
                    ProcFsProbe::new(),
                    instruments.process.clone(),
                )),
                intervals.process,
            ),
            ScheduledSampler::every(
                Arc::new(PoolSampler::new(
                    store.clone(),
                    instruments.db.connections_open.clone(),
                )),
                intervals.pool,
            ),
            ScheduledSampler::every(domain, intervals.tasks).with_refresh(refresh.clone()),
        ],
    );

    let state = AppState {
        store,
        tracker,
        refresh,
        http: instruments.http.clone(),
        process: Arc::new(ProcFsProbe::new()),
    };
    let app = build_service_stack(
        api::routes(state),
        instruments.http.clone(),
        &config.frontend_origin,
    );

    let (host, port) = config.bind_address();
    let listener = TcpListener::bind((host, port))
        .await
        .with_context(|| format!("failed to bind {host}:{port}"))?;
    let addr = listener.local_addr()?;

    info!(%addr, "Taskboard Backend listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_signal())
        .await;
    if let Err(e) = &served {
        error!(error = %e, "Server error");
    }

    // Samplers stop first so nothing records into a closed meter provider
    coordinator.shutdown(config.shutdown_timeout()).await;

    let telemetry = telemetry.shutdown().await;
    info!(
        clean = telemetry.report().is_clean(),
        "Taskboard Backend stopped"
    );

    served.context("server terminated with an error")
}
