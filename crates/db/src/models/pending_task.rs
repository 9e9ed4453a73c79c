//! Pending task descriptor model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use studio_core::types::{DbId, EpisodeNumber, Timestamp};

/// A row from the `pending_tasks` table: admitted work awaiting a worker run.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PendingTask {
    pub id: DbId,
    pub task_type: String,
    pub project_id: DbId,
    pub template_code: String,
    pub episode: Option<EpisodeNumber>,
    pub instructions: String,
    pub created_by: String,
    /// Failed worker runs so far. Failures never remove the descriptor.
    pub attempts: i32,
    pub last_error: Option<String>,
    /// Set while a worker run holds the descriptor.
    pub claimed_at: Option<Timestamp>,
    #[serde(skip)]
    pub claim_seq: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Insert payload for task admission.
#[derive(Debug, Clone)]
pub struct NewPendingTask {
    pub task_type: String,
    pub project_id: DbId,
    pub template_code: String,
    pub episode: Option<EpisodeNumber>,
    pub instructions: String,
    pub created_by: String,
}

/// Query parameters for listing pending tasks.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PendingTaskListQuery {
    pub project_id: Option<DbId>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
