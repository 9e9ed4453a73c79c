//! Repository for the `chat_events` table.
//!
//! Events are only ever written by `ChatMessageRepo::append_exchange`; this
//! module exposes the polling read.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::SqliteConnection;
use studio_core::chat::ChatEventPayload;
use studio_core::types::DbId;

use crate::models::chat::ChatEvent;
use crate::DbPool;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, session_id, event_type, payload, created_at";

pub struct ChatEventRepo;

impl ChatEventRepo {
    /// Events with `id > after` (all when `after` is `None`), ascending.
    pub async fn list_after(
        pool: &DbPool,
        session_id: DbId,
        after: Option<DbId>,
        limit: i64,
    ) -> Result<Vec<ChatEvent>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM chat_events
             WHERE session_id = $1 AND id > $2
             ORDER BY id ASC
             LIMIT $3"
        );
        sqlx::query_as::<_, ChatEvent>(&query)
            .bind(session_id)
            .bind(after.unwrap_or(0))
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}

pub(crate) async fn insert(
    conn: &mut SqliteConnection,
    session_id: DbId,
    payload: &ChatEventPayload,
    now: DateTime<Utc>,
) -> Result<ChatEvent, sqlx::Error> {
    let query = format!(
        "INSERT INTO chat_events (session_id, event_type, payload, created_at)
         VALUES ($1, $2, $3, $4)
         RETURNING {COLUMNS}"
    );
    sqlx::query_as::<_, ChatEvent>(&query)
        .bind(session_id)
        .bind(payload.event_type().as_str())
        .bind(Json(payload.to_value()))
        .bind(now)
        .fetch_one(conn)
        .await
}
