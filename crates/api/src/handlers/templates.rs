//! Handlers for the `/templates` resource.

use axum::extract::State;
use axum::Json;
use studio_core::templates::TemplateSpec;

use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/templates
pub async fn list(State(state): State<AppState>) -> Json<DataResponse<Vec<TemplateSpec>>> {
    Json(DataResponse {
        data: state.dispatcher.catalog().all().to_vec(),
    })
}
