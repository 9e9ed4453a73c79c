//! Handlers for project artifacts: listing, content, generation and progress.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use studio_core::types::{DbId, EpisodeNumber};
use studio_db::models::artifact::Artifact;
use studio_pipeline::dispatcher::{ArtifactContent, ProjectProgress};
use studio_pipeline::{GenerateOutcome, GenerateRequest};
use validator::Validate;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /projects/{id}/artifacts/{template_code}/generate`.
#[derive(Debug, Deserialize, Validate)]
pub struct GenerateBody {
    pub episode: Option<EpisodeNumber>,
    #[serde(default)]
    #[validate(length(max = 4000))]
    pub instructions: String,
    /// Free-form author tag; must not be blank.
    #[serde(default)]
    pub created_by: String,
}

/// GET /api/v1/projects/{id}/artifacts
pub async fn list_by_project(
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<Artifact>>>> {
    let artifacts = state.dispatcher.list_artifacts(project_id).await?;
    Ok(Json(DataResponse { data: artifacts }))
}

/// GET /api/v1/projects/{id}/artifacts/{artifact_id}
pub async fn get_content(
    State(state): State<AppState>,
    Path((project_id, artifact_id)): Path<(DbId, DbId)>,
) -> AppResult<Json<DataResponse<ArtifactContent>>> {
    let content = state
        .dispatcher
        .artifact_content(project_id, artifact_id)
        .await?;
    Ok(Json(DataResponse { data: content }))
}

/// POST /api/v1/projects/{id}/artifacts/{template_code}/generate
///
/// 201 with the new artifact for text templates, 202 with the admitted task
/// for image templates.
pub async fn generate(
    State(state): State<AppState>,
    Path((project_id, template_code)): Path<(DbId, String)>,
    Json(body): Json<GenerateBody>,
) -> AppResult<Response> {
    body.validate()?;
    let request = GenerateRequest {
        project_id,
        template_code,
        episode: body.episode,
        instructions: body.instructions,
        created_by: body.created_by,
    };

    let response = match state.dispatcher.generate(request).await? {
        GenerateOutcome::Completed(artifact) => {
            (StatusCode::CREATED, Json(DataResponse { data: artifact })).into_response()
        }
        GenerateOutcome::Accepted(task) => {
            (StatusCode::ACCEPTED, Json(DataResponse { data: task })).into_response()
        }
    };
    Ok(response)
}

/// GET /api/v1/projects/{id}/progress
pub async fn progress(
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
) -> AppResult<Json<DataResponse<ProjectProgress>>> {
    let progress = state.dispatcher.progress(project_id).await?;
    Ok(Json(DataResponse { data: progress }))
}
