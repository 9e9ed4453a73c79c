//! Keyword-based intent detection for chat messages.
//!
//! Detection is deliberately shallow: a progress keyword wins, then the first
//! template (in priority order) whose keyword appears alongside an action
//! keyword. Everything else is smalltalk.
//!
//! English keywords match whole words only (an optional plural `s` is
//! allowed), so "description" does not mention a script. Japanese keywords
//! match as substrings.

use std::sync::LazyLock;

use regex::Regex;

use crate::chat::{INTENT_AWAITING_EPISODE, INTENT_GENERATE, INTENT_SMALLTALK, INTENT_SUMMARY};
use crate::templates::{
    TemplateCatalog, BACKGROUND_SAMPLE, CHARACTER_DESIGN, EPISODE_SCRIPT, EPISODE_SUMMARY,
    KEYFRAME_IMAGE, OVERALL_SPEC, STORYBOARD_TABLE,
};
use crate::types::EpisodeNumber;

/// Keywords per template, in match priority order.
///
/// More specific templates come first so "episode summary" is not taken for
/// the overall spec.
const TEMPLATE_KEYWORDS: &[(&str, &[&str])] = &[
    (
        EPISODE_SUMMARY,
        &["episode summary", "synopsis", "エピソード概要", "エピソードサマリー", "あらすじ", "ストーリー概要"],
    ),
    (EPISODE_SCRIPT, &["script", "scenario", "脚本", "台本", "シナリオ"]),
    (STORYBOARD_TABLE, &["storyboard", "絵コンテ", "ストーリーボード"]),
    (
        CHARACTER_DESIGN,
        &["character", "キャラ", "キャラクター", "人物設定", "デザイン"],
    ),
    (BACKGROUND_SAMPLE, &["background", "location", "背景", "美術設定", "ロケーション"]),
    (
        KEYFRAME_IMAGE,
        &["keyframe", "key frame", "visual", "image", "キーフレーム", "ビジュアル", "イメージボード", "画像"],
    ),
    (
        OVERALL_SPEC,
        &["overall spec", "world setting", "concept", "全体仕様", "世界観", "コンセプト", "概要"],
    ),
];

const ACTION_KEYWORDS: &[&str] = &[
    "generate", "create", "make", "draft", "write", "draw", "produce",
    "生成", "作成", "作って", "出力", "描いて", "用意", "ください", "お願いします",
];

const SUMMARY_KEYWORDS: &[&str] = &[
    "progress", "status", "remaining", "what's left", "missing",
    "進捗", "状況", "まとめ", "足りない", "未完了", "完了した", "残り",
];

static EPISODE_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:第|(?-u:\b)episode[\s_]*|(?-u:\b)ep\.?\s*)(\d+)").expect("valid regex")
});

static EPISODE_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s*(?:話|(?:episode|ep)(?-u:\b))").expect("valid regex")
});

/// What a chat message asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Produce a template; `instructions` is the trimmed message.
    Generate {
        template_code: String,
        episode: Option<EpisodeNumber>,
        instructions: String,
    },
    /// Report project progress.
    Summary,
    /// An episodic template was requested without an episode number.
    AwaitingEpisode { template_code: String },
    Smalltalk,
}

impl Intent {
    /// Dotted intent name recorded in message extras and status events.
    pub fn name(&self) -> &'static str {
        match self {
            Intent::Generate { .. } => INTENT_GENERATE,
            Intent::Summary => INTENT_SUMMARY,
            Intent::AwaitingEpisode { .. } => INTENT_AWAITING_EPISODE,
            Intent::Smalltalk => INTENT_SMALLTALK,
        }
    }
}

/// Classify a user message.
pub fn detect_intent(catalog: &TemplateCatalog, message: &str) -> Intent {
    let normalized = message.trim();
    let lowered = normalized.to_lowercase();
    let contains_any = |keywords: &[&str]| keywords.iter().any(|k| mentions(&lowered, k));

    if contains_any(SUMMARY_KEYWORDS) {
        return Intent::Summary;
    }

    if !contains_any(ACTION_KEYWORDS) {
        return Intent::Smalltalk;
    }

    for (code, keywords) in TEMPLATE_KEYWORDS {
        if !contains_any(keywords) {
            continue;
        }
        let Some(template) = catalog.get(code) else {
            continue;
        };
        let episode = extract_episode(&lowered);
        if template.requires_episode && episode.is_none() {
            return Intent::AwaitingEpisode {
                template_code: template.code.to_string(),
            };
        }
        return Intent::Generate {
            template_code: template.code.to_string(),
            episode: if template.requires_episode { episode } else { None },
            instructions: normalized.to_string(),
        };
    }

    Intent::Smalltalk
}

/// Whether `text` mentions `keyword`. ASCII keywords must stand as a whole
/// word, optionally pluralised with a trailing `s`.
fn mentions(text: &str, keyword: &str) -> bool {
    if !keyword.is_ascii() {
        return text.contains(keyword);
    }
    let is_word = |c: char| c.is_ascii_alphanumeric() || c == '_';
    text.match_indices(keyword).any(|(start, _)| {
        let before = text[..start].chars().next_back();
        let rest = &text[start + keyword.len()..];
        let rest = rest.strip_prefix('s').unwrap_or(rest);
        !before.is_some_and(is_word) && !rest.chars().next().is_some_and(is_word)
    })
}

/// Pull an episode number out of free text ("第3話", "episode 2", "4話").
pub fn extract_episode(message: &str) -> Option<EpisodeNumber> {
    EPISODE_PREFIX_RE
        .captures(message)
        .or_else(|| EPISODE_SUFFIX_RE.captures(message))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(message: &str) -> Intent {
        detect_intent(&TemplateCatalog::builtin(), message)
    }

    // -- episode extraction --

    #[test]
    fn extracts_episode_numbers() {
        assert_eq!(extract_episode("第3話の脚本"), Some(3));
        assert_eq!(extract_episode("episode 12 please"), Some(12));
        assert_eq!(extract_episode("episode_4"), Some(4));
        assert_eq!(extract_episode("ep 7"), Some(7));
        assert_eq!(extract_episode("2話の絵コンテ"), Some(2));
        assert_eq!(extract_episode("no number here"), None);
    }

    #[test]
    fn episode_markers_must_start_a_word() {
        assert_eq!(extract_episode("step 2 of the plan"), None);
        assert_eq!(extract_episode("keep 3 scenes"), None);
        assert_eq!(extract_episode("3 epic battles"), None);
        assert_eq!(extract_episode("Ep.5"), Some(5));
        assert_eq!(extract_episode("(ep 6)"), Some(6));
        assert_eq!(extract_episode("脚本をep2で"), Some(2));
    }

    #[test]
    fn keywords_match_whole_words() {
        assert!(mentions("write the scripts", "script"));
        assert!(mentions("script: ep 1", "script"));
        assert!(!mentions("a character description", "script"));
        assert!(!mentions("remake it", "make"));
        assert!(mentions("キャラ設定", "キャラ"));
    }

    #[test]
    fn oversized_numbers_are_ignored() {
        assert_eq!(extract_episode("episode 99999999999999"), None);
    }

    // -- intents --

    #[test]
    fn progress_keywords_win() {
        assert_eq!(detect("What is the progress? generate a script"), Intent::Summary);
        assert_eq!(detect("進捗を教えて"), Intent::Summary);
    }

    #[test]
    fn template_plus_action_generates() {
        assert_eq!(
            detect("Please write the script for episode 2"),
            Intent::Generate {
                template_code: EPISODE_SCRIPT.to_string(),
                episode: Some(2),
                instructions: "Please write the script for episode 2".to_string(),
            }
        );
        assert_eq!(
            detect("第1話の脚本を作成してください"),
            Intent::Generate {
                template_code: EPISODE_SCRIPT.to_string(),
                episode: Some(1),
                instructions: "第1話の脚本を作成してください".to_string(),
            }
        );
    }

    #[test]
    fn global_templates_drop_episode_numbers() {
        assert_eq!(
            detect("create the overall spec for episode 3"),
            Intent::Generate {
                template_code: OVERALL_SPEC.to_string(),
                episode: None,
                instructions: "create the overall spec for episode 3".to_string(),
            }
        );
    }

    #[test]
    fn episodic_template_without_episode_waits() {
        assert_eq!(
            detect("generate a storyboard"),
            Intent::AwaitingEpisode {
                template_code: STORYBOARD_TABLE.to_string()
            }
        );
    }

    #[test]
    fn template_without_action_is_smalltalk() {
        assert_eq!(detect("I love this character"), Intent::Smalltalk);
        assert_eq!(detect("hello"), Intent::Smalltalk);
    }

    #[test]
    fn keyframe_requests_are_detected() {
        assert_eq!(
            detect("draw a keyframe for ep 1"),
            Intent::Generate {
                template_code: KEYFRAME_IMAGE.to_string(),
                episode: Some(1),
                instructions: "draw a keyframe for ep 1".to_string(),
            }
        );
    }

    #[test]
    fn intent_names() {
        assert_eq!(Intent::Summary.name(), "project.summary");
        assert_eq!(Intent::Smalltalk.name(), "chat.smalltalk");
    }

    #[test]
    fn stray_substrings_do_not_pick_templates_or_episodes() {
        assert_eq!(
            detect("write the storyboard, keep 3 panels per page"),
            Intent::AwaitingEpisode {
                template_code: STORYBOARD_TABLE.to_string()
            }
        );
        assert_eq!(
            detect("write a character description for the hero"),
            Intent::Generate {
                template_code: CHARACTER_DESIGN.to_string(),
                episode: None,
                instructions: "write a character description for the hero".to_string(),
            }
        );
    }
}
