//! Shared setup for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use opentelemetry::KeyValue;
use serde_json::Value;
use tempfile::TempDir;
use test_utils::{MetricsHarness, MetricsSnapshot};
use tower::ServiceExt;

use taskboard_backend::api::{self, AppState};
use taskboard_backend::middleware::build_service_stack;
use taskboard_backend::observability::sampler::{
    run_sampler, DomainSampler, ProcessProbe, ProcessStats, RefreshTrigger, ScheduledSampler,
};
use taskboard_backend::observability::{Instruments, OperationTracker, SamplerError};
use taskboard_backend::shutdown::ShutdownCoordinator;
use taskboard_backend::storage::{PoolOptions, SqliteTaskStore};

/// Fixed process statistics.
pub struct StaticProbe(pub ProcessStats);

impl ProcessProbe for StaticProbe {
    fn read(&self) -> Result<ProcessStats, SamplerError> {
        Ok(self.0)
    }
}

/// A fully wired router over a throw-away database.
pub struct TestApp {
    pub harness: MetricsHarness,
    pub instruments: Instruments,
    pub store: Arc<SqliteTaskStore>,
    pub router: Router,
    pub coordinator: ShutdownCoordinator,
    _dir: TempDir,
}

impl TestApp {
    /// Builds the app with the domain sampler driven only by the refresh
    /// trigger.
    pub async fn spawn() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            SqliteTaskStore::open(dir.path().join("tasks.db"), PoolOptions::default())
                .await
                .unwrap(),
        );

        let harness = MetricsHarness::new();
        let instruments = Instruments::register(&harness.meter()).unwrap();
        let refresh = RefreshTrigger::new();

        let domain = Arc::new(DomainSampler::new(store.clone(), instruments.tasks.clone()));
        assert!(domain.refresh_now().await);

        let mut coordinator = ShutdownCoordinator::new();
        let signal = coordinator.subscribe();
        coordinator.spawn(
            "task_sampler",
            run_sampler(
                ScheduledSampler::every(domain, Duration::from_secs(3600))
                    .with_refresh(refresh.clone()),
                signal,
            ),
        );

        let state = AppState {
            store: store.clone(),
            tracker: OperationTracker::new(&instruments.db),
            refresh,
            http: instruments.http.clone(),
            process: Arc::new(StaticProbe(ProcessStats {
                resident_bytes: 1024,
                heap_bytes: 2048,
                threads: 4,
                tasks: 3,
            })),
        };
        let router = build_service_stack(
            api::routes(state),
            instruments.http.clone(),
            "http://localhost",
        );

        Self {
            harness,
            instruments,
            store,
            router,
            coordinator,
            _dir: dir,
        }
    }

    /// Sends one request and returns the status and JSON body (`Null` when
    /// the body is empty).
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&json).unwrap())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    /// Polls the exported metrics until `check` holds.
    pub async fn eventually(&self, check: impl Fn(&MetricsSnapshot) -> bool) -> MetricsSnapshot {
        eventually(&self.harness, check).await
    }
}

/// Polls `harness` until `check` holds, panicking after two seconds.
pub async fn eventually(
    harness: &MetricsHarness,
    check: impl Fn(&MetricsSnapshot) -> bool,
) -> MetricsSnapshot {
    for _ in 0..100 {
        let snapshot = harness.snapshot();
        if check(&snapshot) {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("metrics never reached the expected state: {:?}", harness.snapshot());
}

/// `tasks_total` and `tasks_completed_total` equal `(total, completed)`.
pub fn task_gauges_are(total: u64, completed: u64) -> impl Fn(&MetricsSnapshot) -> bool {
    move |snapshot| {
        snapshot.gauge_u64("tasks_total", &[]) == Some(total)
            && snapshot.gauge_u64("tasks_completed_total", &[]) == Some(completed)
    }
}

/// Attribute shorthand.
pub fn kv(key: &'static str, value: &'static str) -> KeyValue {
    KeyValue::new(key, value)
}
