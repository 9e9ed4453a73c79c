//! Repository for the `chat_sessions` table.

use chrono::Utc;
use studio_core::chat::ChatSessionStatus;
use studio_core::types::DbId;

use crate::models::chat::{ChatSession, CreateChatSession};
use crate::DbPool;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, project_id, title, status, created_at, updated_at";

/// Provides lifecycle operations for chat sessions.
pub struct ChatSessionRepo;

impl ChatSessionRepo {
    /// Create an `active` session.
    pub async fn create(
        pool: &DbPool,
        input: &CreateChatSession,
    ) -> Result<ChatSession, sqlx::Error> {
        let query = format!(
            "INSERT INTO chat_sessions (project_id, title, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ChatSession>(&query)
            .bind(input.project_id)
            .bind(&input.title)
            .bind(ChatSessionStatus::Active.as_str())
            .bind(Utc::now())
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &DbPool, id: DbId) -> Result<Option<ChatSession>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM chat_sessions WHERE id = $1");
        sqlx::query_as::<_, ChatSession>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List sessions, most recently updated first.
    pub async fn list(
        pool: &DbPool,
        project_id: Option<DbId>,
        status: Option<ChatSessionStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ChatSession>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM chat_sessions
             WHERE ($1 IS NULL OR project_id = $1)
               AND ($2 IS NULL OR status = $2)
             ORDER BY updated_at DESC, id DESC
             LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, ChatSession>(&query)
            .bind(project_id)
            .bind(status.map(ChatSessionStatus::as_str))
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Move a session from `from` to `to`.
    ///
    /// Returns `None` if the session no longer has status `from`.
    pub async fn update_status(
        pool: &DbPool,
        id: DbId,
        from: ChatSessionStatus,
        to: ChatSessionStatus,
    ) -> Result<Option<ChatSession>, sqlx::Error> {
        let query = format!(
            "UPDATE chat_sessions SET status = $3, updated_at = $4
             WHERE id = $1 AND status = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ChatSession>(&query)
            .bind(id)
            .bind(from.as_str())
            .bind(to.as_str())
            .bind(Utc::now())
            .fetch_optional(pool)
            .await
    }
}
