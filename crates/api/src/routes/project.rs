//! Route definitions for the `/projects` resource and its artifacts.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{artifact, project};
use crate::state::AppState;

/// Routes mounted at `/projects`.
///
/// `{artifact}` is an artifact id on reads and a template code on
/// `generate`; the router requires one name per path position.
///
/// ```text
/// GET    /                                     -> list
/// POST   /                                     -> create
/// GET    /{id}                                 -> get_by_id
/// GET    /{id}/progress                        -> progress
/// GET    /{id}/artifacts                       -> list_by_project
/// GET    /{id}/artifacts/{artifact}            -> get_content
/// POST   /{id}/artifacts/{artifact}/generate   -> generate
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(project::list).post(project::create))
        .route("/{id}", get(project::get_by_id))
        .route("/{id}/progress", get(artifact::progress))
        .route("/{id}/artifacts", get(artifact::list_by_project))
        .route("/{id}/artifacts/{artifact}", get(artifact::get_content))
        .route("/{id}/artifacts/{artifact}/generate", post(artifact::generate))
}
