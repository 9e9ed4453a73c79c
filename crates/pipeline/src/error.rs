use studio_core::error::CoreError;

use crate::generator::GenerationError;
use crate::storage::StorageError;

/// Errors raised while dispatching or executing generation work.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl PipelineError {
    /// Short machine-readable reason used in chat `status` events.
    pub fn reason(&self) -> &'static str {
        match self {
            PipelineError::Core(CoreError::NotFound { entity: "project", .. }) => {
                "project_not_found"
            }
            PipelineError::Core(CoreError::NotFound { .. } | CoreError::Missing(_)) => {
                "not_found"
            }
            PipelineError::Core(CoreError::Validation(_)) => "invalid_request",
            PipelineError::Core(CoreError::Conflict(_)) => "task_already_pending",
            PipelineError::Core(CoreError::Execution(_))
            | PipelineError::Generation(_)
            | PipelineError::Storage(_) => "generation_failed",
            PipelineError::Core(CoreError::Internal(_)) | PipelineError::Database(_) => {
                "internal_error"
            }
        }
    }
}
