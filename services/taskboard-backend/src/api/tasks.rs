//! Task CRUD handlers.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::{valid_title, AppState};
use crate::error::ApiError;
use crate::storage::{NewTask, StoreError, Task};

#[derive(Debug, Deserialize)]
struct CreateTaskInput {
    title: String,
}

#[derive(Debug, Deserialize)]
struct UpdateTaskInput {
    title: Option<String>,
    completed: Option<bool>,
}

fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse().map_err(|_| ApiError::InvalidId)
}

/// `GET /api/tasks`
pub async fn list_tasks(State(state): State<AppState>) -> Result<Json<Vec<Task>>, ApiError> {
    let tasks = state
        .tracker
        .track_async("query_all_tasks", state.store.list())
        .await
        .map_err(ApiError::storage("failed to fetch tasks"))?;

    state.refresh.fire();
    Ok(Json(tasks))
}

/// `POST /api/tasks`
pub async fn create_task(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let input: CreateTaskInput =
        serde_json::from_slice(&body).map_err(|_| ApiError::InvalidInput)?;
    if !valid_title(&input.title) {
        return Err(ApiError::InvalidInput);
    }

    let task = state
        .tracker
        .track_async("create_task", state.store.create(NewTask::open(input.title)))
        .await
        .map_err(ApiError::storage("failed to create task"))?;

    state.refresh.fire();
    Ok((StatusCode::CREATED, Json(task)))
}

/// `PUT /api/tasks/:id`
pub async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Task>, ApiError> {
    let id = parse_id(&id)?;

    let mut task = state
        .tracker
        .track_async("find_task", state.store.find(id))
        .await
        .map_err(|e| match e {
            StoreError::NotFound(_) => ApiError::NotFound,
            other => ApiError::storage("failed to update task")(other),
        })?;

    let input: UpdateTaskInput =
        serde_json::from_slice(&body).map_err(|_| ApiError::InvalidInput)?;
    if let Some(title) = input.title {
        if !valid_title(&title) {
            return Err(ApiError::InvalidInput);
        }
        task.title = title;
    }
    if let Some(completed) = input.completed {
        task.completed = completed;
    }

    let task = state
        .tracker
        .track_async("update_task", state.store.save(task))
        .await
        .map_err(|e| match e {
            StoreError::NotFound(_) => ApiError::NotFound,
            other => ApiError::storage("failed to update task")(other),
        })?;

    state.refresh.fire();
    Ok(Json(task))
}

/// `DELETE /api/tasks/:id`
pub async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;

    state
        .tracker
        .track_async("delete_task", state.store.delete(id))
        .await
        .map_err(ApiError::storage("failed to delete task"))?;

    state.refresh.fire();
    Ok(StatusCode::NO_CONTENT)
}
