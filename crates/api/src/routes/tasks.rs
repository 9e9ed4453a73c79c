//! Route definitions for the `/tasks` resource (the pending task queue).

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::tasks;
use crate::state::AppState;

/// Routes mounted at `/tasks`.
///
/// ```text
/// GET    /                    -> list
/// POST   /generate-keyframe   -> run_by_key
/// GET    /{id}                -> get_by_id
/// DELETE /{id}                -> cancel
/// POST   /{id}/run            -> run_by_id
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(tasks::list))
        .route("/generate-keyframe", post(tasks::run_by_key))
        .route("/{id}", get(tasks::get_by_id).delete(tasks::cancel))
        .route("/{id}/run", post(tasks::run_by_id))
}
