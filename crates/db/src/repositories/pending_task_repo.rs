//! Repository for the `pending_tasks` table.
//!
//! A descriptor exists from admission until a worker run succeeds (see
//! [`PendingTaskRepo::complete`]) or it is removed explicitly. Failed runs
//! only bump `attempts`; nothing is retried automatically.
//!
//! A run first claims the descriptor. The claim is a row update, so it holds
//! across processes sharing the database file. `claim_seq` identifies one
//! claim; completion and failure bookkeeping only apply while it still matches.
//! Claims older than the caller's `stale_before` cutoff may be taken over.

use chrono::Utc;
use sqlx::SqliteConnection;
use studio_core::types::{DbId, EpisodeNumber, Timestamp};

use crate::models::pending_task::{NewPendingTask, PendingTask};
use crate::DbPool;

/// Column list for `pending_tasks` queries.
const COLUMNS: &str = "id, task_type, project_id, template_code, episode, instructions, \
    created_by, attempts, last_error, claimed_at, claim_seq, created_at, updated_at";

/// Unclaimed, or claimed before the cutoff bound at `$2`.
const CLAIMABLE: &str = "(claimed_at IS NULL OR claimed_at < $2)";

/// Provides admission and bookkeeping for pending tasks.
pub struct PendingTaskRepo;

impl PendingTaskRepo {
    /// Admit a descriptor. A second descriptor for the same key violates
    /// `uq_pending_tasks_key`.
    pub async fn create(pool: &DbPool, input: &NewPendingTask) -> Result<PendingTask, sqlx::Error> {
        let now = Utc::now();
        let query = format!(
            "INSERT INTO pending_tasks
                (task_type, project_id, template_code, episode, instructions, created_by,
                 created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PendingTask>(&query)
            .bind(&input.task_type)
            .bind(input.project_id)
            .bind(&input.template_code)
            .bind(input.episode)
            .bind(&input.instructions)
            .bind(&input.created_by)
            .bind(now)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &DbPool, id: DbId) -> Result<Option<PendingTask>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM pending_tasks WHERE id = $1");
        sqlx::query_as::<_, PendingTask>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find the descriptor occupying a key.
    pub async fn find_by_key(
        pool: &DbPool,
        project_id: DbId,
        template_code: &str,
        episode: Option<EpisodeNumber>,
    ) -> Result<Option<PendingTask>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM pending_tasks
             WHERE project_id = $1 AND template_code = $2
               AND COALESCE(episode, 0) = COALESCE($3, 0)"
        );
        sqlx::query_as::<_, PendingTask>(&query)
            .bind(project_id)
            .bind(template_code)
            .bind(episode)
            .fetch_optional(pool)
            .await
    }

    /// List descriptors in admission order, optionally for one project.
    pub async fn list(
        pool: &DbPool,
        project_id: Option<DbId>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PendingTask>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM pending_tasks
             WHERE ($1 IS NULL OR project_id = $1)
             ORDER BY id ASC
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, PendingTask>(&query)
            .bind(project_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Ids of every descriptor, in admission order.
    pub async fn list_ids(pool: &DbPool) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar::<_, DbId>("SELECT id FROM pending_tasks ORDER BY id ASC")
            .fetch_all(pool)
            .await
    }

    /// Claim a descriptor for a run. Returns `None` when it does not exist or
    /// another run holds a claim newer than `stale_before`.
    pub async fn claim(
        pool: &DbPool,
        id: DbId,
        stale_before: Timestamp,
    ) -> Result<Option<PendingTask>, sqlx::Error> {
        let query = format!(
            "UPDATE pending_tasks
             SET claimed_at = $3, claim_seq = claim_seq + 1, updated_at = $3
             WHERE id = $1 AND {CLAIMABLE}
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PendingTask>(&query)
            .bind(id)
            .bind(stale_before)
            .bind(Utc::now())
            .fetch_optional(pool)
            .await
    }

    /// Record a failed worker run and release its claim. The descriptor stays
    /// pending. Returns `None` if the claim is no longer held.
    pub async fn record_failure(
        pool: &DbPool,
        id: DbId,
        claim_seq: i64,
        error: &str,
    ) -> Result<Option<PendingTask>, sqlx::Error> {
        let query = format!(
            "UPDATE pending_tasks
             SET attempts = attempts + 1, last_error = $3, claimed_at = NULL, updated_at = $4
             WHERE id = $1 AND claim_seq = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PendingTask>(&query)
            .bind(id)
            .bind(claim_seq)
            .bind(error)
            .bind(Utc::now())
            .fetch_optional(pool)
            .await
    }

    /// Remove a completed descriptor inside the caller's transaction. Returns
    /// `false` if the claim is no longer held, in which case the caller must
    /// roll back.
    pub async fn complete(
        conn: &mut SqliteConnection,
        id: DbId,
        claim_seq: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM pending_tasks WHERE id = $1 AND claim_seq = $2")
            .bind(id)
            .bind(claim_seq)
            .execute(conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove a descriptor no run currently holds. Returns `true` if a row
    /// was deleted.
    pub async fn delete_unclaimed(
        pool: &DbPool,
        id: DbId,
        stale_before: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let query = format!("DELETE FROM pending_tasks WHERE id = $1 AND {CLAIMABLE}");
        let result = sqlx::query(&query)
            .bind(id)
            .bind(stale_before)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
