//! Template catalog: the fixed set of artifact kinds a project is expected
//! to produce, their output kind and their scope.
//!
//! The catalog is static configuration. It is not persisted per project;
//! every project is measured against the same list.

use serde::Serialize;

use crate::error::CoreError;
use crate::types::EpisodeNumber;

// ---------------------------------------------------------------------------
// Template codes
// ---------------------------------------------------------------------------

pub const OVERALL_SPEC: &str = "overall_spec";
pub const CHARACTER_DESIGN: &str = "character_design";
pub const BACKGROUND_SAMPLE: &str = "background_sample";
pub const EPISODE_SUMMARY: &str = "episode_summary";
pub const EPISODE_SCRIPT: &str = "episode_script";
pub const STORYBOARD_TABLE: &str = "storyboard_table";
pub const KEYFRAME_IMAGE: &str = "keyframe_image";

/// Worker task type that executes deferred keyframe generation.
pub const TASK_GENERATE_KEYFRAME: &str = "generate_keyframe";

// ---------------------------------------------------------------------------
// Template definitions
// ---------------------------------------------------------------------------

/// Output kind of a template. Determines the dispatch path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    /// Cheap text output, generated inline.
    Text,
    /// Expensive image output, admitted to the task queue.
    Image,
}

impl TemplateKind {
    /// Whether requests for this kind are deferred to a worker.
    pub fn is_async(self) -> bool {
        matches!(self, TemplateKind::Image)
    }
}

/// A single catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TemplateSpec {
    pub code: &'static str,
    pub label: &'static str,
    pub kind: TemplateKind,
    pub requires_episode: bool,
    /// Worker task type for asynchronous templates, `None` for text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_type: Option<&'static str>,
}

const BUILTIN_TEMPLATES: &[TemplateSpec] = &[
    TemplateSpec {
        code: OVERALL_SPEC,
        label: "Overall specification",
        kind: TemplateKind::Text,
        requires_episode: false,
        task_type: None,
    },
    TemplateSpec {
        code: CHARACTER_DESIGN,
        label: "Character design",
        kind: TemplateKind::Text,
        requires_episode: false,
        task_type: None,
    },
    TemplateSpec {
        code: BACKGROUND_SAMPLE,
        label: "Background sample",
        kind: TemplateKind::Text,
        requires_episode: false,
        task_type: None,
    },
    TemplateSpec {
        code: EPISODE_SUMMARY,
        label: "Episode summary",
        kind: TemplateKind::Text,
        requires_episode: true,
        task_type: None,
    },
    TemplateSpec {
        code: EPISODE_SCRIPT,
        label: "Episode script",
        kind: TemplateKind::Text,
        requires_episode: true,
        task_type: None,
    },
    TemplateSpec {
        code: STORYBOARD_TABLE,
        label: "Storyboard table",
        kind: TemplateKind::Text,
        requires_episode: true,
        task_type: None,
    },
    TemplateSpec {
        code: KEYFRAME_IMAGE,
        label: "Keyframe image",
        kind: TemplateKind::Image,
        requires_episode: true,
        task_type: Some(TASK_GENERATE_KEYFRAME),
    },
];

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// An ordered, immutable list of templates.
///
/// Order matters: progress views list template codes in catalog order.
#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    templates: Vec<TemplateSpec>,
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TemplateCatalog {
    /// The production catalog.
    pub fn builtin() -> Self {
        Self {
            templates: BUILTIN_TEMPLATES.to_vec(),
        }
    }

    /// Build a catalog from an explicit list. Later duplicates of a code are dropped.
    pub fn new(templates: Vec<TemplateSpec>) -> Self {
        let mut unique: Vec<TemplateSpec> = Vec::with_capacity(templates.len());
        for template in templates {
            if !unique.iter().any(|t| t.code == template.code) {
                unique.push(template);
            }
        }
        Self { templates: unique }
    }

    pub fn all(&self) -> &[TemplateSpec] {
        &self.templates
    }

    pub fn get(&self, code: &str) -> Option<&TemplateSpec> {
        self.templates.iter().find(|t| t.code == code)
    }

    /// Look up a template, failing with a validation error for unknown codes.
    pub fn require(&self, code: &str) -> Result<&TemplateSpec, CoreError> {
        self.get(code).ok_or_else(|| {
            CoreError::Validation(format!("Unknown template code '{code}'"))
        })
    }

    /// Templates scoped to the whole project.
    pub fn global_templates(&self) -> impl Iterator<Item = &TemplateSpec> {
        self.templates.iter().filter(|t| !t.requires_episode)
    }

    /// Templates expected once per episode.
    pub fn episode_templates(&self) -> impl Iterator<Item = &TemplateSpec> {
        self.templates.iter().filter(|t| t.requires_episode)
    }

    /// Validate a generation target and return its template.
    ///
    /// - Unknown template codes are rejected.
    /// - Episodic templates need an episode within `1..=episodes_planned`.
    /// - Global templates must not carry an episode.
    pub fn validate_target(
        &self,
        template_code: &str,
        episode: Option<EpisodeNumber>,
        episodes_planned: i32,
    ) -> Result<&TemplateSpec, CoreError> {
        let template = self.require(template_code)?;
        match (template.requires_episode, episode) {
            (true, None) => Err(CoreError::Validation(format!(
                "Template '{template_code}' requires an episode"
            ))),
            (true, Some(ep)) if ep < 1 || ep > episodes_planned => {
                Err(CoreError::Validation(format!(
                    "Episode {ep} is outside the planned range 1..={episodes_planned}"
                )))
            }
            (false, Some(_)) => Err(CoreError::Validation(format!(
                "Template '{template_code}' is global and must not specify an episode"
            ))),
            _ => Ok(template),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn builtin_catalog_partitions_scopes() {
        let catalog = TemplateCatalog::builtin();
        let global: Vec<_> = catalog.global_templates().map(|t| t.code).collect();
        let episodic: Vec<_> = catalog.episode_templates().map(|t| t.code).collect();
        assert_eq!(global, vec![OVERALL_SPEC, CHARACTER_DESIGN, BACKGROUND_SAMPLE]);
        assert_eq!(
            episodic,
            vec![EPISODE_SUMMARY, EPISODE_SCRIPT, STORYBOARD_TABLE, KEYFRAME_IMAGE]
        );
    }

    #[test]
    fn only_image_templates_are_async_and_carry_a_task_type() {
        for template in TemplateCatalog::builtin().all() {
            assert_eq!(template.kind.is_async(), template.task_type.is_some());
        }
    }

    #[test]
    fn unknown_code_is_a_validation_error() {
        let catalog = TemplateCatalog::builtin();
        assert_matches!(
            catalog.validate_target("nope", None, 3),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn episodic_template_requires_episode_in_range() {
        let catalog = TemplateCatalog::builtin();
        assert_matches!(
            catalog.validate_target(EPISODE_SCRIPT, None, 2),
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            catalog.validate_target(EPISODE_SCRIPT, Some(0), 2),
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            catalog.validate_target(EPISODE_SCRIPT, Some(3), 2),
            Err(CoreError::Validation(_))
        );
        assert!(catalog.validate_target(EPISODE_SCRIPT, Some(2), 2).is_ok());
    }

    #[test]
    fn global_template_rejects_episode() {
        let catalog = TemplateCatalog::builtin();
        assert_matches!(
            catalog.validate_target(OVERALL_SPEC, Some(1), 2),
            Err(CoreError::Validation(_))
        );
        assert!(catalog.validate_target(OVERALL_SPEC, None, 2).is_ok());
    }

    #[test]
    fn duplicate_codes_are_dropped() {
        let catalog = TemplateCatalog::new(vec![BUILTIN_TEMPLATES[0], BUILTIN_TEMPLATES[0]]);
        assert_eq!(catalog.all().len(), 1);
    }
}
