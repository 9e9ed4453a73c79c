//! One-shot worker for the pending task queue.
//!
//! Nothing runs tasks in the background. An operator (or a scheduler) invokes
//! the `studio-worker` binary, which makes a single pass over every pending
//! descriptor and exits.

use std::path::PathBuf;

use studio_core::error::CoreError;
use studio_pipeline::{GenerationDispatcher, PipelineError};

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub database_url: String,
    pub storage_root: PathBuf,
    /// `LOG_FORMAT=json` switches to JSON log lines.
    pub json_logs: bool,
}

impl WorkerConfig {
    /// | Env Var        | Default              |
    /// |----------------|----------------------|
    /// | `DATABASE_URL` | `sqlite://studio.db` |
    /// | `STORAGE_ROOT` | `./storage`          |
    /// | `LOG_FORMAT`   | `pretty`             |
    pub fn from_env() -> Self {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            database_url: lookup("DATABASE_URL").unwrap_or_else(|| "sqlite://studio.db".into()),
            storage_root: PathBuf::from(
                lookup("STORAGE_ROOT").unwrap_or_else(|| "./storage".into()),
            ),
            json_logs: lookup("LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json")),
        }
    }
}

/// Outcome of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub completed: usize,
    /// Runs that failed; their descriptors stay pending.
    pub failed: usize,
    /// Descriptors removed or held by another run before their turn.
    pub skipped: usize,
}

/// Run every descriptor pending at the start of the pass, each at most once.
///
/// Individual failures are logged and counted. Only a failure to read the
/// queue itself is returned as an error.
pub async fn drain(dispatcher: &GenerationDispatcher) -> Result<DrainReport, PipelineError> {
    let ids = dispatcher.pending_task_ids().await?;
    tracing::info!(pending = ids.len(), "Starting drain pass");

    let mut report = DrainReport::default();
    for task_id in ids {
        match dispatcher.run_task(task_id).await {
            Ok(artifact) => {
                tracing::info!(task_id, artifact_id = artifact.id, "Task completed");
                report.completed += 1;
            }
            Err(PipelineError::Core(CoreError::NotFound { .. })) => {
                tracing::debug!(task_id, "Task no longer pending, skipping");
                report.skipped += 1;
            }
            Err(PipelineError::Core(CoreError::Conflict(message))) => {
                tracing::info!(task_id, %message, "Task held by another run, skipping");
                report.skipped += 1;
            }
            Err(e) => {
                tracing::warn!(task_id, error = %e, reason = e.reason(), "Task failed");
                report.failed += 1;
            }
        }
    }

    tracing::info!(
        completed = report.completed,
        failed = report.failed,
        skipped = report.skipped,
        "Drain pass finished",
    );
    Ok(report)
}
