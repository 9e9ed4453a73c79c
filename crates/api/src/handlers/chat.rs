//! Handlers for chat sessions, messages and events.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use studio_core::types::DbId;
use studio_db::models::chat::{
    ChatEvent, ChatEventListQuery, ChatExchange, ChatMessage, ChatSession, ChatSessionListQuery,
    CreateChatSession, SendChatMessage, UpdateChatSessionStatus,
};
use validator::Validate;

use crate::error::AppResult;
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/chat/sessions
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(params): Query<ChatSessionListQuery>,
) -> AppResult<Json<DataResponse<Vec<ChatSession>>>> {
    let sessions = state.conversation.list_sessions(&params).await?;
    Ok(Json(DataResponse { data: sessions }))
}

/// POST /api/v1/chat/sessions
pub async fn create_session(
    State(state): State<AppState>,
    Json(input): Json<CreateChatSession>,
) -> AppResult<(StatusCode, Json<DataResponse<ChatSession>>)> {
    input.validate()?;
    let session = state.conversation.create_session(&input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: session })))
}

/// GET /api/v1/chat/sessions/{id}
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<ChatSession>>> {
    let session = state.conversation.get_session(id).await?;
    Ok(Json(DataResponse { data: session }))
}

/// PUT /api/v1/chat/sessions/{id}/status
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateChatSessionStatus>,
) -> AppResult<Json<DataResponse<ChatSession>>> {
    let session = state.conversation.update_status(id, input.status).await?;
    Ok(Json(DataResponse { data: session }))
}

/// GET /api/v1/chat/sessions/{id}/messages
pub async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<DataResponse<Vec<ChatMessage>>>> {
    let messages = state
        .conversation
        .list_messages(id, params.limit, params.offset)
        .await?;
    Ok(Json(DataResponse { data: messages }))
}

/// POST /api/v1/chat/sessions/{id}/messages
///
/// Returns both messages of the exchange and every event it appended.
pub async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<SendChatMessage>,
) -> AppResult<(StatusCode, Json<DataResponse<ChatExchange>>)> {
    let exchange = state.conversation.send_message(id, &input.content).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: exchange })))
}

/// GET /api/v1/chat/sessions/{id}/events
pub async fn list_events(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Query(params): Query<ChatEventListQuery>,
) -> AppResult<Json<DataResponse<Vec<ChatEvent>>>> {
    let events = state.conversation.list_events(id, &params).await?;
    Ok(Json(DataResponse { data: events }))
}
