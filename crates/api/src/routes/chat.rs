//! Route definitions for chat sessions.

use axum::routing::{get, put};
use axum::Router;

use crate::handlers::chat;
use crate::state::AppState;

/// Routes mounted at `/chat`.
///
/// ```text
/// GET    /sessions                  -> list_sessions
/// POST   /sessions                  -> create_session
/// GET    /sessions/{id}             -> get_session
/// PUT    /sessions/{id}/status      -> update_status
/// GET    /sessions/{id}/messages    -> list_messages
/// POST   /sessions/{id}/messages    -> send_message
/// GET    /sessions/{id}/events      -> list_events
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/sessions",
            get(chat::list_sessions).post(chat::create_session),
        )
        .route("/sessions/{id}", get(chat::get_session))
        .route("/sessions/{id}/status", put(chat::update_status))
        .route(
            "/sessions/{id}/messages",
            get(chat::list_messages).post(chat::send_message),
        )
        .route("/sessions/{id}/events", get(chat::list_events))
}
