//! Chat session vocabulary: lifecycle states, message roles, event types and
//! the JSON payloads attached to events.
//!
//! Enums are stored as lowercase text columns; `TryFrom<String>` lets the
//! database layer decode them with `#[sqlx(try_from = "String")]`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::types::{DbId, EpisodeNumber};

/// Default upper bound for a single chat message, in characters.
pub const DEFAULT_MAX_MESSAGE_CHARS: usize = 4000;

/// Maximum length of a session title, in characters.
pub const MAX_TITLE_CHARS: usize = 200;

// ---------------------------------------------------------------------------
// Intents
// ---------------------------------------------------------------------------

pub const INTENT_GENERATE: &str = "artifact.generate";
pub const INTENT_SUMMARY: &str = "project.summary";
pub const INTENT_AWAITING_EPISODE: &str = "chat.awaiting_episode";
pub const INTENT_SMALLTALK: &str = "chat.smalltalk";

// ---------------------------------------------------------------------------
// Text-backed enums
// ---------------------------------------------------------------------------

macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $variant ),+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $( $name::$variant => $text ),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $text => Ok($name::$variant), )+
                    other => Err(CoreError::Validation(format!(
                        concat!("Invalid ", stringify!($name), " '{}'"),
                        other
                    ))),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = CoreError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

text_enum! {
    /// Session lifecycle. Only `active` sessions accept messages.
    ChatSessionStatus {
        Active => "active",
        Closed => "closed",
        Archived => "archived",
    }
}

text_enum! {
    /// Author of a chat message.
    ChatMessageRole {
        User => "user",
        Assistant => "assistant",
        System => "system",
    }
}

text_enum! {
    /// Kind of side-effect recorded in a session's event log.
    ChatEventType {
        Message => "message",
        Status => "status",
        ArtifactUpdate => "artifact_update",
        TaskProgress => "task_progress",
    }
}

text_enum! {
    /// Phase carried by `status` and `task_progress` events.
    StatusPhase {
        Queued => "queued",
        Requested => "requested",
        Completed => "completed",
        Failed => "failed",
    }
}

impl ChatSessionStatus {
    /// Check a status change. Closed and archived sessions are terminal.
    pub fn transition_to(self, next: ChatSessionStatus) -> Result<ChatSessionStatus, CoreError> {
        match (self, next) {
            (ChatSessionStatus::Active, ChatSessionStatus::Closed)
            | (ChatSessionStatus::Active, ChatSessionStatus::Archived) => Ok(next),
            (from, to) => Err(CoreError::Conflict(format!(
                "Cannot change session status from '{from}' to '{to}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Event payloads
// ---------------------------------------------------------------------------

/// Closing event of every exchange, pointing at the assistant reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessagePayload {
    pub message_id: DbId,
    pub role: ChatMessageRole,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusPayload {
    pub phase: StatusPhase,
    pub intent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode: Option<EpisodeNumber>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<DbId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Progress view attached to a completed summary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Value>,
}

impl StatusPayload {
    pub fn new(phase: StatusPhase, intent: &str) -> Self {
        Self {
            phase,
            intent: intent.to_string(),
            template_code: None,
            episode: None,
            artifact_id: None,
            reason: None,
            progress: None,
        }
    }

    pub fn for_template(mut self, template_code: &str, episode: Option<EpisodeNumber>) -> Self {
        self.template_code = Some(template_code.to_string());
        self.episode = episode;
        self
    }

    pub fn with_artifact(mut self, artifact_id: DbId) -> Self {
        self.artifact_id = Some(artifact_id);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_progress(mut self, progress: Value) -> Self {
        self.progress = Some(progress);
        self
    }
}

/// A new artifact version was written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactUpdatePayload {
    pub project_id: DbId,
    pub template_code: String,
    pub episode: Option<EpisodeNumber>,
    pub artifact_id: DbId,
    pub version: i32,
    pub storage_path: String,
}

/// A generation request was admitted to the task queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskProgressPayload {
    pub phase: StatusPhase,
    pub task_id: DbId,
    pub project_id: DbId,
    pub template_code: String,
    pub episode: Option<EpisodeNumber>,
}

/// Any event payload, paired with its event type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChatEventPayload {
    Message(MessagePayload),
    Status(StatusPayload),
    ArtifactUpdate(ArtifactUpdatePayload),
    TaskProgress(TaskProgressPayload),
}

impl ChatEventPayload {
    pub fn event_type(&self) -> ChatEventType {
        match self {
            ChatEventPayload::Message(_) => ChatEventType::Message,
            ChatEventPayload::Status(_) => ChatEventType::Status,
            ChatEventPayload::ArtifactUpdate(_) => ChatEventType::ArtifactUpdate,
            ChatEventPayload::TaskProgress(_) => ChatEventType::TaskProgress,
        }
    }

    /// JSON body stored in the event row.
    pub fn to_value(&self) -> Value {
        // Payloads are plain structs of strings and integers.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate and trim a user message.
pub fn validate_message_content(content: &str, max_chars: usize) -> Result<&str, CoreError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(
            "Message content must not be empty".to_string(),
        ));
    }
    let len = trimmed.chars().count();
    if len > max_chars {
        return Err(CoreError::Validation(format!(
            "Message content is {len} characters, the limit is {max_chars}"
        )));
    }
    Ok(trimmed)
}

/// Validate an optional session title.
pub fn validate_title(title: Option<&str>) -> Result<(), CoreError> {
    match title {
        Some(t) if t.chars().count() > MAX_TITLE_CHARS => Err(CoreError::Validation(format!(
            "Session title must be at most {MAX_TITLE_CHARS} characters"
        ))),
        _ => Ok(()),
    }
}
