//! Debug routes for exercising the telemetry pipeline.

use std::time::Duration;

use axum::extract::{Query, State};
use axum::Json;
use rand::Rng;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::AppState;
use crate::error::ApiError;
use crate::observability::attributes;
use crate::storage::{NewTask, TaskFilter};

const DEFAULT_GENERATE_COUNT: u32 = 10;
const MAX_GENERATE_COUNT: u32 = 100;

/// Query string of `/debug/generate-tasks`.
#[derive(Debug, Deserialize)]
pub struct GenerateParams {
    count: Option<String>,
}

/// `GET /debug/metrics`: records one synthetic request count.
pub async fn record_metric(State(state): State<AppState>) -> Json<Value> {
    state
        .http
        .requests
        .add(1, &attributes::route_status("DEBUG", "/debug/metrics", 200));

    Json(json!({
        "message": "Debug metric recorded",
        "info": "Check the collector debug output",
    }))
}

/// `GET /debug/slow`: sleeps 1 to 4 seconds.
pub async fn slow() -> Json<Value> {
    let sleep_seconds: u64 = rand::thread_rng().gen_range(1..=4);
    tokio::time::sleep(Duration::from_secs(sleep_seconds)).await;

    Json(json!({
        "message": "Slow response simulated",
        "sleep_seconds": sleep_seconds,
    }))
}

/// `GET /debug/stats`: process statistics and task counts.
pub async fn stats(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let process = match state.process.read() {
        Ok(stats) => Some(stats),
        Err(e) => {
            warn!(error = %e, "Process statistics unavailable");
            None
        }
    };

    let total = state
        .store
        .count(TaskFilter::All)
        .await
        .map_err(ApiError::storage("failed to fetch tasks"))?;
    let completed = state
        .store
        .count(TaskFilter::Completed)
        .await
        .map_err(ApiError::storage("failed to fetch tasks"))?;

    Ok(Json(json!({
        "goroutines": process.map(|p| p.tasks),
        "threads": process.map(|p| p.threads),
        "memory": process.map(|p| json!({
            "resident_bytes": p.resident_bytes,
            "heap_bytes": p.heap_bytes,
        })),
        "pool": state.store.pool_stats(),
        "tasks": {
            "count": total,
            "completed": completed,
        },
    })))
}

/// Parses `count`, falling back to the default when absent or out of range.
fn generate_count(params: &GenerateParams) -> u32 {
    params
        .count
        .as_deref()
        .and_then(|raw| raw.parse::<u32>().ok())
        .filter(|count| (1..=MAX_GENERATE_COUNT).contains(count))
        .unwrap_or(DEFAULT_GENERATE_COUNT)
}

/// `POST /debug/generate-tasks?count=N`
pub async fn generate_tasks(
    State(state): State<AppState>,
    Query(params): Query<GenerateParams>,
) -> Result<Json<Value>, ApiError> {
    let count = generate_count(&params);

    for i in 1..=count {
        let completed = rand::thread_rng().gen_bool(0.5);
        let task = NewTask {
            title: format!("Generated Task #{i}"),
            completed,
        };
        state
            .tracker
            .track_async("create_task", state.store.create(task))
            .await
            .map_err(ApiError::storage("failed to create tasks"))?;
    }

    state.refresh.fire();
    info!(count, "Generated tasks");
    Ok(Json(json!({
        "message": "Tasks generated successfully",
        "count": count,
    })))
}

/// `DELETE /debug/clear-tasks`
pub async fn clear_tasks(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let removed = state
        .tracker
        .track_async("delete_all_tasks", state.store.delete_all())
        .await
        .map_err(ApiError::storage("failed to clear tasks"))?;

    state.refresh.fire();
    info!(removed, "Cleared tasks");
    Ok(Json(json!({ "message": "All tasks cleared" })))
}
