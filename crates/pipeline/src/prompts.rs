//! Prompt templates for the generators.

use studio_core::templates::{
    BACKGROUND_SAMPLE, CHARACTER_DESIGN, EPISODE_SCRIPT, EPISODE_SUMMARY, OVERALL_SPEC,
    STORYBOARD_TABLE,
};
use studio_core::types::EpisodeNumber;

/// Characters of a previous artifact carried into a prompt.
pub const CONTEXT_EXCERPT_CHARS: usize = 1200;

/// Messages of chat history carried into a smalltalk prompt.
pub const SMALLTALK_HISTORY_MESSAGES: i64 = 8;

/// Everything a template prompt can refer to.
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    pub project_name: String,
    pub project_description: String,
    pub episode: Option<EpisodeNumber>,
    pub instructions: String,
    /// Excerpt of related earlier output, empty when there is none.
    pub existing_summary: String,
}

impl PromptContext {
    fn episode_label(&self) -> String {
        match self.episode {
            Some(ep) => ep.to_string(),
            None => "(all episodes)".to_string(),
        }
    }

    fn instructions_or_default(&self) -> &str {
        if self.instructions.trim().is_empty() {
            "none"
        } else {
            self.instructions.trim()
        }
    }

    fn summary_or_default(&self) -> &str {
        if self.existing_summary.trim().is_empty() {
            "none yet"
        } else {
            &self.existing_summary
        }
    }
}

/// Lossy UTF-8 decode of a stored blob, cut to [`CONTEXT_EXCERPT_CHARS`].
pub fn excerpt(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .chars()
        .take(CONTEXT_EXCERPT_CHARS)
        .collect()
}

/// Render the prompt for a text template. Unknown codes get a generic prompt.
pub fn render_text_prompt(template_code: &str, ctx: &PromptContext) -> String {
    let project = &ctx.project_name;
    let episode = ctx.episode_label();
    let instructions = ctx.instructions_or_default();
    let summary = ctx.summary_or_default();

    match template_code {
        OVERALL_SPEC => format!(
            "You are outlining the overarching creative brief for the project \"{project}\".\n\
             Summarise the long-term scenario, key characters, and world-building in a structured Markdown document.\n\
             Include sections for Setting, Characters, and Story Arcs.\n\
             Project description: {}\n\
             Additional instructions: {instructions}",
            ctx.project_description
        ),
        CHARACTER_DESIGN => format!(
            "Generate a character design sheet for the project \"{project}\".\n\
             Provide Markdown bullets describing appearance, personality, costume, and signature poses.\n\
             Reference existing lore: {summary}\n\
             Apply instructions: {instructions}"
        ),
        BACKGROUND_SAMPLE => format!(
            "Produce descriptive references for background environments in \"{project}\".\n\
             List at least three settings with mood, lighting, and colour palette guidance.\n\
             Instructions: {instructions}"
        ),
        EPISODE_SUMMARY => format!(
            "Write an episode synopsis for episode {episode} of \"{project}\".\n\
             Provide logline, act breakdown, and cliffhanger in Markdown.\n\
             Consider existing canon: {summary}\n\
             Extra guidance: {instructions}"
        ),
        EPISODE_SCRIPT => format!(
            "Draft a short script excerpt for episode {episode} of \"{project}\".\n\
             Use Markdown with dialogue lines and beats.\n\
             Leverage synopsis: {summary}\n\
             Instructions: {instructions}"
        ),
        STORYBOARD_TABLE => format!(
            "Create a storyboard table for episode {episode} of \"{project}\".\n\
             Return a Markdown table with columns: Timecode, Visual, Direction, Notes.\n\
             Base direction on synopsis: {summary}\n\
             Extra requirements: {instructions}"
        ),
        other => format!(
            "Produce the '{other}' document for episode {episode} of \"{project}\".\n\
             Instructions: {instructions}"
        ),
    }
}

/// Render the prompt for a keyframe image.
pub fn render_image_prompt(ctx: &PromptContext) -> String {
    format!(
        "Generate a keyframe concept art for episode {} of \"{}\".\n\
         Scene description: {}\n\
         Maintain consistency with existing lore: {}",
        ctx.episode_label(),
        ctx.project_name,
        ctx.instructions_or_default(),
        ctx.summary_or_default()
    )
}

/// Render a conversational prompt from project context and recent history.
///
/// `history` holds `(role, content)` pairs, oldest first.
pub fn render_smalltalk_prompt(
    project: Option<&PromptContext>,
    history: &[(String, String)],
    user_message: &str,
) -> String {
    let project_section = match project {
        Some(ctx) => format!(
            "- Project: {}\n- Description: {}",
            ctx.project_name,
            if ctx.project_description.is_empty() {
                "no description"
            } else {
                &ctx.project_description
            }
        ),
        None => "(no project attached)".to_string(),
    };

    let history_section = if history.is_empty() {
        "No conversation yet.".to_string()
    } else {
        history
            .iter()
            .map(|(role, content)| format!("{}: {content}", role.to_uppercase()))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "You are an assistant supporting a creative production team.\n\
         Answer politely, suggest next steps when useful, and point to generated artifacts.\n\n\
         ## Project\n{project_section}\n\n\
         ## Conversation so far\n{history_section}\n\n\
         ## Latest message\nUSER: {user_message}"
    )
}
