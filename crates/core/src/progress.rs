//! Progress engine: which templates are satisfied for each scope of a project.
//!
//! Progress is always derived from the artifact set, never stored. A
//! template is completed for a scope iff at least one artifact exists for
//! that `(template_code, episode)` pair; versions are irrelevant.

use std::collections::HashSet;

use serde::Serialize;

use crate::templates::TemplateCatalog;
use crate::types::EpisodeNumber;

/// Completed/pending partition for one scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScopeProgress {
    pub completed: Vec<String>,
    pub pending: Vec<String>,
}

/// Per-episode partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EpisodeProgress {
    pub episode: EpisodeNumber,
    pub completed: Vec<String>,
    pub pending: Vec<String>,
}

/// The full derived view for a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub global: ScopeProgress,
    pub episodes: Vec<EpisodeProgress>,
}

impl Progress {
    /// Whether every scope has no pending templates.
    pub fn is_complete(&self) -> bool {
        self.global.pending.is_empty() && self.episodes.iter().all(|e| e.pending.is_empty())
    }
}

/// Anything that identifies the scope an artifact satisfies.
pub trait ScopedArtifact {
    fn template_code(&self) -> &str;
    fn episode(&self) -> Option<EpisodeNumber>;
}

impl<T: ScopedArtifact + ?Sized> ScopedArtifact for &T {
    fn template_code(&self) -> &str {
        (**self).template_code()
    }

    fn episode(&self) -> Option<EpisodeNumber> {
        (**self).episode()
    }
}

impl ScopedArtifact for (&str, Option<EpisodeNumber>) {
    fn template_code(&self) -> &str {
        self.0
    }

    fn episode(&self) -> Option<EpisodeNumber> {
        self.1
    }
}

/// Compute the progress view.
///
/// Artifacts outside the current plan (episode beyond `episodes_planned`,
/// unknown template codes, an episode on a global template) are ignored.
/// They are not an error: planning changes never destroy artifacts.
pub fn compute_progress<I>(
    catalog: &TemplateCatalog,
    episodes_planned: i32,
    artifacts: I,
) -> Progress
where
    I: IntoIterator,
    I::Item: ScopedArtifact,
{
    let satisfied: HashSet<(String, Option<EpisodeNumber>)> = artifacts
        .into_iter()
        .map(|a| (a.template_code().to_string(), a.episode()))
        .collect();

    let is_done = |code: &str, episode: Option<EpisodeNumber>| {
        satisfied.contains(&(code.to_string(), episode))
    };

    let mut global = ScopeProgress::default();
    for template in catalog.global_templates() {
        if is_done(template.code, None) {
            global.completed.push(template.code.to_string());
        } else {
            global.pending.push(template.code.to_string());
        }
    }

    let episodes = (1..=episodes_planned.max(0))
        .map(|episode| {
            let mut completed = Vec::new();
            let mut pending = Vec::new();
            for template in catalog.episode_templates() {
                if is_done(template.code, Some(episode)) {
                    completed.push(template.code.to_string());
                } else {
                    pending.push(template.code.to_string());
                }
            }
            EpisodeProgress {
                episode,
                completed,
                pending,
            }
        })
        .collect();

    Progress { global, episodes }
}
