//! Artifact entity model.
//!
//! Artifacts are immutable once written; there is no update DTO.

use serde::Serialize;
use sqlx::FromRow;
use studio_core::types::{DbId, EpisodeNumber, Timestamp};

/// The only status an artifact row is ever written with.
pub const ARTIFACT_STATUS_COMPLETED: &str = "completed";

/// An artifact row from the `artifacts` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Artifact {
    pub id: DbId,
    pub project_id: DbId,
    pub template_code: String,
    /// `None` iff the template is global.
    pub episode: Option<EpisodeNumber>,
    pub version: i32,
    /// Blob location relative to the storage root.
    pub storage_path: String,
    pub content_type: String,
    pub status: String,
    pub created_by: String,
    pub created_at: Timestamp,
}

impl studio_core::progress::ScopedArtifact for Artifact {
    fn template_code(&self) -> &str {
        &self.template_code
    }

    fn episode(&self) -> Option<EpisodeNumber> {
        self.episode
    }
}

/// Insert payload. The version is assigned by the caller under the key lock.
#[derive(Debug, Clone)]
pub struct NewArtifact {
    pub project_id: DbId,
    pub template_code: String,
    pub episode: Option<EpisodeNumber>,
    pub version: i32,
    pub storage_path: String,
    pub content_type: String,
    pub created_by: String,
}
