//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&DbPool` as the first argument.

pub mod artifact_repo;
pub mod chat_event_repo;
pub mod chat_message_repo;
pub mod chat_session_repo;
pub mod pending_task_repo;
pub mod project_repo;

pub use artifact_repo::ArtifactRepo;
pub use chat_event_repo::ChatEventRepo;
pub use chat_message_repo::ChatMessageRepo;
pub use chat_session_repo::ChatSessionRepo;
pub use pending_task_repo::PendingTaskRepo;
pub use project_repo::ProjectRepo;
