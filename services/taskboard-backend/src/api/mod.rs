//! HTTP API
//!
//! Task CRUD routes and the debug routes used to exercise the telemetry
//! pipeline. Every storage call goes through the [`OperationTracker`], and
//! every handler that reads or changes tasks requests a domain-state refresh.

mod debug;
mod tasks;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::observability::instruments::HttpInstruments;
use crate::observability::sampler::{ProcessProbe, RefreshTrigger};
use crate::observability::OperationTracker;
use crate::storage::TaskStore;

/// Maximum title length in characters.
pub const MAX_TITLE_CHARS: usize = 200;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// Task persistence
    pub store: Arc<dyn TaskStore>,
    /// Storage operation tracking
    pub tracker: OperationTracker,
    /// Wakes the domain-state sampler
    pub refresh: RefreshTrigger,
    /// HTTP instruments, for the synthetic debug metric
    pub http: HttpInstruments,
    /// Process statistics for `/debug/stats`
    pub process: Arc<dyn ProcessProbe>,
}

/// Builds the routes without middleware.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/tasks", get(tasks::list_tasks).post(tasks::create_task))
        .route(
            "/api/tasks/:id",
            put(tasks::update_task).delete(tasks::delete_task),
        )
        .route("/debug/metrics", get(debug::record_metric))
        .route("/debug/slow", get(debug::slow))
        .route("/debug/stats", get(debug::stats))
        .route("/debug/generate-tasks", post(debug::generate_tasks))
        .route("/debug/clear-tasks", delete(debug::clear_tasks))
        .fallback(|| async { StatusCode::NOT_FOUND })
        .with_state(state)
}

fn valid_title(title: &str) -> bool {
    (1..=MAX_TITLE_CHARS).contains(&title.chars().count())
}
