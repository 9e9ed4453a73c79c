//! Row models and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A `Deserialize` create DTO (or plain insert struct) for writes

pub mod artifact;
pub mod chat;
pub mod pending_task;
pub mod project;
