pub mod chat;
pub mod health;
pub mod project;
pub mod tasks;
pub mod templates;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /templates                                          catalog
///
/// /projects                                           list, create
/// /projects/{id}                                      get
/// /projects/{id}/progress                             progress view
/// /projects/{id}/artifacts                            list artifacts
/// /projects/{id}/artifacts/{artifact}                 artifact with content
/// /projects/{id}/artifacts/{artifact}/generate        generate a template (POST)
///
/// /tasks                                              list pending (?project_id)
/// /tasks/generate-keyframe                            run worker by key (POST)
/// /tasks/{id}                                         get, remove
/// /tasks/{id}/run                                     run worker by id (POST)
///
/// /chat/sessions                                      list, create
/// /chat/sessions/{id}                                 get
/// /chat/sessions/{id}/status                          close, archive (PUT)
/// /chat/sessions/{id}/messages                        list, send
/// /chat/sessions/{id}/events                          poll (?after, limit)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/templates", templates::router())
        .nest("/projects", project::router())
        .nest("/tasks", tasks::router())
        .nest("/chat", chat::router())
}
