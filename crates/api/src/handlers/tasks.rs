//! Handlers for the `/tasks` resource.
//!
//! Workers never start on their own: a pending task only runs when one of
//! the `run_*` endpoints (or the `studio-worker` binary) is invoked.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use studio_core::types::DbId;
use studio_db::models::artifact::Artifact;
use studio_db::models::pending_task::{PendingTask, PendingTaskListQuery};
use studio_pipeline::dispatcher::WorkerRequest;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/tasks
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<PendingTaskListQuery>,
) -> AppResult<Json<DataResponse<Vec<PendingTask>>>> {
    let tasks = state
        .dispatcher
        .list_tasks(params.project_id, params.limit, params.offset)
        .await?;
    Ok(Json(DataResponse { data: tasks }))
}

/// GET /api/v1/tasks/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<PendingTask>>> {
    let task = state.dispatcher.get_task(id).await?;
    Ok(Json(DataResponse { data: task }))
}

/// DELETE /api/v1/tasks/{id}
pub async fn cancel(State(state): State<AppState>, Path(id): Path<DbId>) -> AppResult<StatusCode> {
    state.dispatcher.cancel_task(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/tasks/generate-keyframe
pub async fn run_by_key(
    State(state): State<AppState>,
    Json(request): Json<WorkerRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<Artifact>>)> {
    let artifact = state.dispatcher.run_worker(request).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: artifact })))
}

/// POST /api/v1/tasks/{id}/run
pub async fn run_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<(StatusCode, Json<DataResponse<Artifact>>)> {
    let artifact = state.dispatcher.run_task(id).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: artifact })))
}
