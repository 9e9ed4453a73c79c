//! Chat session, message and event models.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;
use studio_core::chat::{ChatEventPayload, ChatEventType, ChatMessageRole, ChatSessionStatus};
use studio_core::types::{DbId, Timestamp};
use validator::Validate;

/// A row from the `chat_sessions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ChatSession {
    pub id: DbId,
    pub project_id: Option<DbId>,
    pub title: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: ChatSessionStatus,
    pub created_at: Timestamp,
    /// Bumped whenever an exchange is appended.
    pub updated_at: Timestamp,
}

/// A row from the `chat_messages` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ChatMessage {
    pub id: DbId,
    pub session_id: DbId,
    #[sqlx(try_from = "String")]
    pub role: ChatMessageRole,
    pub content: String,
    pub extra: Option<Json<Value>>,
    pub created_at: Timestamp,
}

/// A row from the `chat_events` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ChatEvent {
    pub id: DbId,
    pub session_id: DbId,
    #[serde(rename = "type")]
    #[sqlx(try_from = "String")]
    pub event_type: ChatEventType,
    pub payload: Json<Value>,
    pub created_at: Timestamp,
}

/// DTO for creating a session.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CreateChatSession {
    pub project_id: Option<DbId>,
    #[validate(length(max = 200))]
    pub title: Option<String>,
}

/// DTO for changing a session's status.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateChatSessionStatus {
    pub status: ChatSessionStatus,
}

/// DTO for sending a user message.
#[derive(Debug, Clone, Deserialize)]
pub struct SendChatMessage {
    pub content: String,
}

/// Query parameters for listing sessions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatSessionListQuery {
    pub project_id: Option<DbId>,
    pub status: Option<ChatSessionStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Query parameters for polling events.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatEventListQuery {
    /// Only events with an id strictly greater than this are returned.
    pub after: Option<DbId>,
    pub limit: Option<i64>,
}

/// One message of an exchange, before insertion.
#[derive(Debug, Clone)]
pub struct NewChatMessage {
    pub role: ChatMessageRole,
    pub content: String,
    pub extra: Option<Value>,
}

/// Everything appended for one user turn, written atomically.
///
/// The closing `message` event pointing at the assistant reply is added by
/// the repository once the reply's id is known.
#[derive(Debug, Clone)]
pub struct NewChatExchange {
    pub user: NewChatMessage,
    pub assistant: NewChatMessage,
    pub events: Vec<ChatEventPayload>,
}

/// Rows written by [`NewChatExchange`].
#[derive(Debug, Clone, Serialize)]
pub struct ChatExchange {
    pub user_message: ChatMessage,
    pub assistant_message: ChatMessage,
    pub events: Vec<ChatEvent>,
}
