//! Repository for the `chat_messages` table, including the atomic append of
//! a whole exchange (both messages plus every event it produced).

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::SqliteConnection;
use studio_core::chat::{ChatEventPayload, MessagePayload};
use studio_core::types::DbId;

use crate::models::chat::{ChatExchange, ChatMessage, NewChatExchange, NewChatMessage};
use crate::repositories::chat_event_repo;
use crate::DbPool;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, session_id, role, content, extra, created_at";

/// Provides append and read operations for chat messages.
pub struct ChatMessageRepo;

impl ChatMessageRepo {
    /// Messages of a session in insertion order.
    pub async fn list_by_session(
        pool: &DbPool,
        session_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ChatMessage>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM chat_messages
             WHERE session_id = $1
             ORDER BY id ASC
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, ChatMessage>(&query)
            .bind(session_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// The last `count` messages of a session, oldest first.
    pub async fn recent(
        pool: &DbPool,
        session_id: DbId,
        count: i64,
    ) -> Result<Vec<ChatMessage>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM (
                SELECT {COLUMNS} FROM chat_messages
                WHERE session_id = $1
                ORDER BY id DESC
                LIMIT $2
             ) ORDER BY id ASC"
        );
        sqlx::query_as::<_, ChatMessage>(&query)
            .bind(session_id)
            .bind(count)
            .fetch_all(pool)
            .await
    }

    /// Append a user message, the assistant reply and the exchange's events
    /// in one transaction, then bump the session's `updated_at`.
    ///
    /// A closing `message` event referencing the assistant reply is always
    /// appended after the supplied events.
    pub async fn append_exchange(
        pool: &DbPool,
        session_id: DbId,
        exchange: &NewChatExchange,
    ) -> Result<ChatExchange, sqlx::Error> {
        let now = Utc::now();
        let mut tx = pool.begin().await?;

        let user_message = insert_message(&mut tx, session_id, &exchange.user, now).await?;
        let assistant_message =
            insert_message(&mut tx, session_id, &exchange.assistant, now).await?;

        let closing = ChatEventPayload::Message(MessagePayload {
            message_id: assistant_message.id,
            role: assistant_message.role,
        });
        let mut events = Vec::with_capacity(exchange.events.len() + 1);
        for payload in exchange.events.iter().chain(std::iter::once(&closing)) {
            events.push(chat_event_repo::insert(&mut tx, session_id, payload, now).await?);
        }

        sqlx::query("UPDATE chat_sessions SET updated_at = $2 WHERE id = $1")
            .bind(session_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(ChatExchange {
            user_message,
            assistant_message,
            events,
        })
    }
}

async fn insert_message(
    conn: &mut SqliteConnection,
    session_id: DbId,
    message: &NewChatMessage,
    now: DateTime<Utc>,
) -> Result<ChatMessage, sqlx::Error> {
    let query = format!(
        "INSERT INTO chat_messages (session_id, role, content, extra, created_at)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {COLUMNS}"
    );
    sqlx::query_as::<_, ChatMessage>(&query)
        .bind(session_id)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(message.extra.as_ref().map(Json::<&Value>))
        .bind(now)
        .fetch_one(conn)
        .await
}

