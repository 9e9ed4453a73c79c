//! Repository for the `artifacts` table.
//!
//! Rows are append-only. Writers call [`ArtifactRepo::next_version`] and
//! [`ArtifactRepo::insert`] inside one write transaction, so the version read
//! and the insert see the same state even across processes. The
//! `uq_artifacts_key_version` index rejects any duplicate that slips past it.

use chrono::Utc;
use sqlx::SqliteConnection;
use studio_core::types::{DbId, EpisodeNumber};

use crate::models::artifact::{Artifact, NewArtifact, ARTIFACT_STATUS_COMPLETED};
use crate::DbPool;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, project_id, template_code, episode, version, storage_path, \
    content_type, status, created_by, created_at";

/// Key predicate. `episode` is compared through `COALESCE` to match the unique index.
const KEY_FILTER: &str =
    "project_id = $1 AND template_code = $2 AND COALESCE(episode, 0) = COALESCE($3, 0)";

/// Provides version-series operations for artifacts.
pub struct ArtifactRepo;

impl ArtifactRepo {
    /// The version the next artifact for this key would receive (1 when none
    /// exist). Only stable while the caller's transaction holds the write lock.
    pub async fn next_version(
        conn: &mut SqliteConnection,
        project_id: DbId,
        template_code: &str,
        episode: Option<EpisodeNumber>,
    ) -> Result<i32, sqlx::Error> {
        let query =
            format!("SELECT COALESCE(MAX(version), 0) + 1 FROM artifacts WHERE {KEY_FILTER}");
        sqlx::query_scalar::<_, i32>(&query)
            .bind(project_id)
            .bind(template_code)
            .bind(episode)
            .fetch_one(conn)
            .await
    }

    /// Insert a completed artifact row.
    pub async fn insert(
        conn: &mut SqliteConnection,
        input: &NewArtifact,
    ) -> Result<Artifact, sqlx::Error> {
        let query = format!(
            "INSERT INTO artifacts
                (project_id, template_code, episode, version, storage_path, content_type,
                 status, created_by, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Artifact>(&query)
            .bind(input.project_id)
            .bind(&input.template_code)
            .bind(input.episode)
            .bind(input.version)
            .bind(&input.storage_path)
            .bind(&input.content_type)
            .bind(ARTIFACT_STATUS_COMPLETED)
            .bind(&input.created_by)
            .bind(Utc::now())
            .fetch_one(conn)
            .await
    }

    /// Find an artifact by its ID.
    pub async fn find_by_id(pool: &DbPool, id: DbId) -> Result<Option<Artifact>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM artifacts WHERE id = $1");
        sqlx::query_as::<_, Artifact>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All artifacts of a project, newest first.
    pub async fn list_by_project(
        pool: &DbPool,
        project_id: DbId,
    ) -> Result<Vec<Artifact>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM artifacts WHERE project_id = $1 ORDER BY id DESC"
        );
        sqlx::query_as::<_, Artifact>(&query)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }

    /// The highest version for a key, if any.
    pub async fn latest_for_key(
        pool: &DbPool,
        project_id: DbId,
        template_code: &str,
        episode: Option<EpisodeNumber>,
    ) -> Result<Option<Artifact>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM artifacts WHERE {KEY_FILTER} ORDER BY version DESC LIMIT 1"
        );
        sqlx::query_as::<_, Artifact>(&query)
            .bind(project_id)
            .bind(template_code)
            .bind(episode)
            .fetch_optional(pool)
            .await
    }
}
