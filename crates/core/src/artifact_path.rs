//! Storage path conventions for artifact blobs.
//!
//! Paths are relative to the storage root and are unique per
//! `(project, template, episode, version)`, so a blob is never overwritten.

use crate::types::{DbId, EpisodeNumber};

pub const CONTENT_TYPE_MARKDOWN: &str = "text/markdown";
pub const CONTENT_TYPE_PNG: &str = "image/png";

/// File extension used for a content type. Unknown types fall back to `bin`.
pub fn extension_for(content_type: &str) -> &'static str {
    // Ignore parameters such as `; charset=utf-8`.
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "text/markdown" => "md",
        "text/plain" => "txt",
        "application/json" => "json",
        "image/png" => "png",
        _ => "bin",
    }
}

/// Whether a content type should be served as base64 rather than text.
pub fn is_binary(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    !(essence.starts_with("text/") || essence == "application/json")
}

/// Relative storage path for an artifact version.
///
/// - Global: `projects/{project_id}/{template_code}/v{version:03}.{ext}`
/// - Episodic: `projects/{project_id}/episodes/{episode:02}/{template_code}/v{version:03}.{ext}`
pub fn storage_path(
    project_id: DbId,
    template_code: &str,
    episode: Option<EpisodeNumber>,
    version: i32,
    content_type: &str,
) -> String {
    let ext = extension_for(content_type);
    match episode {
        Some(ep) => format!(
            "projects/{project_id}/episodes/{ep:02}/{template_code}/v{version:03}.{ext}"
        ),
        None => format!("projects/{project_id}/{template_code}/v{version:03}.{ext}"),
    }
}
