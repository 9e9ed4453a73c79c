//! Chat sessions driving the generation pipeline.
//!
//! Each user message is classified with `studio_core::intent`, acted on, and
//! then persisted together with the assistant reply and every event the turn
//! produced in a single transaction. Turns within one session are serialized
//! by a per-session lock, so event ids follow turn order.

use std::sync::Arc;

use serde_json::{json, Value};
use studio_core::chat::{
    validate_message_content, validate_title, ArtifactUpdatePayload, ChatEventPayload,
    ChatMessageRole, ChatSessionStatus, StatusPayload, StatusPhase, TaskProgressPayload,
    INTENT_SUMMARY,
};
use studio_core::error::CoreError;
use studio_core::intent::{detect_intent, Intent};
use studio_core::locks::KeyedLocks;
use studio_core::pagination::{clamp_limit, clamp_offset};
use studio_core::types::{DbId, EpisodeNumber};
use studio_db::models::chat::{
    ChatEvent, ChatEventListQuery, ChatExchange, ChatMessage, ChatSession, ChatSessionListQuery,
    CreateChatSession, NewChatExchange, NewChatMessage,
};
use studio_db::models::project::Project;
use studio_db::repositories::{ChatEventRepo, ChatMessageRepo, ChatSessionRepo};
use studio_db::DbPool;

use crate::dispatcher::{GenerateOutcome, GenerateRequest, GenerationDispatcher, ProjectProgress};
use crate::error::PipelineError;
use crate::prompts::{render_smalltalk_prompt, PromptContext, SMALLTALK_HISTORY_MESSAGES};

/// `created_by` recorded on artifacts and tasks requested from chat.
pub const CONVERSATION_AGENT: &str = "conversation-agent";

/// Failure reason when a session without a project asks for project work.
const REASON_PROJECT_MISSING: &str = "project_missing";

const DEFAULT_SESSION_LIMIT: i64 = 20;
const MAX_SESSION_LIMIT: i64 = 100;
const DEFAULT_LOG_LIMIT: i64 = 100;
const MAX_LOG_LIMIT: i64 = 200;

/// The assistant side of one turn, before persistence.
struct Reply {
    content: String,
    extra: Value,
    events: Vec<ChatEventPayload>,
}

pub struct ConversationService {
    pool: DbPool,
    dispatcher: Arc<GenerationDispatcher>,
    sessions: KeyedLocks<DbId>,
    max_message_chars: usize,
}

impl ConversationService {
    pub fn new(
        pool: DbPool,
        dispatcher: Arc<GenerationDispatcher>,
        max_message_chars: usize,
    ) -> Self {
        Self {
            pool,
            dispatcher,
            sessions: KeyedLocks::new(),
            max_message_chars,
        }
    }

    // -- sessions --

    pub async fn create_session(
        &self,
        input: &CreateChatSession,
    ) -> Result<ChatSession, PipelineError> {
        validate_title(input.title.as_deref())?;
        if let Some(project_id) = input.project_id {
            self.dispatcher.load_project(project_id).await?;
        }
        let session = ChatSessionRepo::create(&self.pool, input).await?;
        tracing::info!(
            session_id = session.id,
            project_id = ?session.project_id,
            "Chat session created",
        );
        Ok(session)
    }

    pub async fn get_session(&self, session_id: DbId) -> Result<ChatSession, PipelineError> {
        ChatSessionRepo::find_by_id(&self.pool, session_id)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound {
                    entity: "chat_session",
                    id: session_id,
                }
                .into()
            })
    }

    pub async fn list_sessions(
        &self,
        params: &ChatSessionListQuery,
    ) -> Result<Vec<ChatSession>, PipelineError> {
        let limit = clamp_limit(params.limit, DEFAULT_SESSION_LIMIT, MAX_SESSION_LIMIT);
        let offset = clamp_offset(params.offset);
        Ok(ChatSessionRepo::list(&self.pool, params.project_id, params.status, limit, offset).await?)
    }

    /// Close or archive an active session.
    pub async fn update_status(
        &self,
        session_id: DbId,
        next: ChatSessionStatus,
    ) -> Result<ChatSession, PipelineError> {
        let _guard = self.sessions.lock(&session_id).await;
        let session = self.get_session(session_id).await?;
        session.status.transition_to(next)?;

        let updated = ChatSessionRepo::update_status(&self.pool, session_id, session.status, next)
            .await?
            .ok_or_else(|| {
                CoreError::Conflict(format!("Session {session_id} changed status concurrently"))
            })?;
        tracing::info!(session_id, from = %session.status, to = %next, "Chat session status changed");
        Ok(updated)
    }

    // -- logs --

    pub async fn list_messages(
        &self,
        session_id: DbId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<ChatMessage>, PipelineError> {
        self.get_session(session_id).await?;
        let limit = clamp_limit(limit, DEFAULT_LOG_LIMIT, MAX_LOG_LIMIT);
        let offset = clamp_offset(offset);
        Ok(ChatMessageRepo::list_by_session(&self.pool, session_id, limit, offset).await?)
    }

    /// Events after the `after` cursor, ascending.
    pub async fn list_events(
        &self,
        session_id: DbId,
        params: &ChatEventListQuery,
    ) -> Result<Vec<ChatEvent>, PipelineError> {
        self.get_session(session_id).await?;
        let limit = clamp_limit(params.limit, DEFAULT_LOG_LIMIT, MAX_LOG_LIMIT);
        Ok(ChatEventRepo::list_after(&self.pool, session_id, params.after, limit).await?)
    }

    // -- turns --

    /// Handle one user message and persist the whole exchange.
    pub async fn send_message(
        &self,
        session_id: DbId,
        content: &str,
    ) -> Result<ChatExchange, PipelineError> {
        let _guard = self.sessions.lock(&session_id).await;
        let session = self.get_session(session_id).await?;
        if session.status != ChatSessionStatus::Active {
            return Err(CoreError::Validation(format!(
                "Session {session_id} is {} and does not accept messages",
                session.status
            ))
            .into());
        }
        let content = validate_message_content(content, self.max_message_chars)?;

        let intent = detect_intent(self.dispatcher.catalog(), content);
        tracing::debug!(session_id, intent = intent.name(), "Chat intent detected");

        let reply = match &intent {
            Intent::Summary => self.reply_summary(&session).await?,
            Intent::Generate {
                template_code,
                episode,
                instructions,
            } => {
                self.reply_generate(&session, &intent, template_code, *episode, instructions)
                    .await?
            }
            Intent::AwaitingEpisode { template_code } => {
                self.reply_awaiting_episode(&session, &intent, template_code)
                    .await?
            }
            Intent::Smalltalk => self.reply_smalltalk(&session, &intent, content).await?,
        };

        let exchange = NewChatExchange {
            user: NewChatMessage {
                role: ChatMessageRole::User,
                content: content.to_string(),
                extra: None,
            },
            assistant: NewChatMessage {
                role: ChatMessageRole::Assistant,
                content: reply.content,
                extra: Some(reply.extra),
            },
            events: reply.events,
        };
        let written = ChatMessageRepo::append_exchange(&self.pool, session_id, &exchange).await?;

        tracing::info!(
            session_id,
            intent = intent.name(),
            events = written.events.len(),
            "Chat exchange appended",
        );
        Ok(written)
    }

    async fn session_project(&self, session: &ChatSession) -> Result<Option<Project>, PipelineError> {
        match session.project_id {
            Some(project_id) => Ok(Some(self.dispatcher.load_project(project_id).await?)),
            None => Ok(None),
        }
    }

    fn template_label<'a>(&self, template_code: &'a str) -> &'a str {
        self.dispatcher
            .catalog()
            .get(template_code)
            .map(|t| t.label)
            .unwrap_or(template_code)
    }

    async fn reply_summary(&self, session: &ChatSession) -> Result<Reply, PipelineError> {
        let extra = json!({ "intent": INTENT_SUMMARY });
        let Some(project) = self.session_project(session).await? else {
            return Ok(Reply {
                content: "This session is not linked to a project, so there is no progress to report."
                    .to_string(),
                extra,
                events: vec![ChatEventPayload::Status(
                    StatusPayload::new(StatusPhase::Failed, INTENT_SUMMARY)
                        .with_reason(REASON_PROJECT_MISSING),
                )],
            });
        };

        let progress = self.dispatcher.progress(project.id).await?;
        let progress_value = serde_json::to_value(&progress).unwrap_or(Value::Null);
        Ok(Reply {
            content: describe_progress(&project, &progress),
            extra: json!({ "intent": INTENT_SUMMARY, "progress": progress_value.clone() }),
            events: vec![
                ChatEventPayload::Status(StatusPayload::new(StatusPhase::Requested, INTENT_SUMMARY)),
                ChatEventPayload::Status(
                    StatusPayload::new(StatusPhase::Completed, INTENT_SUMMARY)
                        .with_progress(progress_value),
                ),
            ],
        })
    }

    async fn reply_generate(
        &self,
        session: &ChatSession,
        intent: &Intent,
        template_code: &str,
        episode: Option<EpisodeNumber>,
        instructions: &str,
    ) -> Result<Reply, PipelineError> {
        let label = self.template_label(template_code);
        let status = |phase: StatusPhase| {
            StatusPayload::new(phase, intent.name()).for_template(template_code, episode)
        };
        let mut extra = json!({
            "intent": intent.name(),
            "template_code": template_code,
            "episode": episode,
        });

        let Some(project_id) = session.project_id else {
            return Ok(Reply {
                content: format!(
                    "I can't generate the {label} because this session is not linked to a project."
                ),
                extra,
                events: vec![ChatEventPayload::Status(
                    status(StatusPhase::Failed).with_reason(REASON_PROJECT_MISSING),
                )],
            });
        };

        let mut events = vec![ChatEventPayload::Status(status(StatusPhase::Queued))];
        let request = GenerateRequest {
            project_id,
            template_code: template_code.to_string(),
            episode,
            instructions: instructions.to_string(),
            created_by: CONVERSATION_AGENT.to_string(),
        };

        let content = match self.dispatcher.generate(request).await {
            Ok(GenerateOutcome::Completed(artifact)) => {
                extra["artifact_id"] = json!(artifact.id);
                events.push(ChatEventPayload::Status(
                    status(StatusPhase::Completed).with_artifact(artifact.id),
                ));
                events.push(ChatEventPayload::ArtifactUpdate(ArtifactUpdatePayload {
                    project_id: artifact.project_id,
                    template_code: artifact.template_code.clone(),
                    episode: artifact.episode,
                    artifact_id: artifact.id,
                    version: artifact.version,
                    storage_path: artifact.storage_path.clone(),
                }));
                format!(
                    "Generated the {label}{} as version {} (artifact #{}).",
                    episode_suffix(episode),
                    artifact.version,
                    artifact.id
                )
            }
            Ok(GenerateOutcome::Accepted(task)) => {
                extra["task_id"] = json!(task.id);
                events.push(ChatEventPayload::TaskProgress(TaskProgressPayload {
                    phase: StatusPhase::Queued,
                    task_id: task.id,
                    project_id: task.project_id,
                    template_code: task.template_code.clone(),
                    episode: task.episode,
                }));
                format!(
                    "Queued the {label}{} as task #{}. It will appear once a worker has run it.",
                    episode_suffix(episode),
                    task.id
                )
            }
            Err(err) => {
                tracing::warn!(
                    session_id = session.id,
                    template_code,
                    error = %err,
                    "Chat generation request failed",
                );
                extra["error"] = json!(err.reason());
                events.push(ChatEventPayload::Status(
                    status(StatusPhase::Failed).with_reason(err.reason()),
                ));
                format!("I couldn't generate the {label}: {err}")
            }
        };

        Ok(Reply {
            content,
            extra,
            events,
        })
    }

    async fn reply_awaiting_episode(
        &self,
        session: &ChatSession,
        intent: &Intent,
        template_code: &str,
    ) -> Result<Reply, PipelineError> {
        let label = self.template_label(template_code);
        let range = match self.session_project(session).await? {
            Some(project) => format!(" (1 to {})", project.episodes_planned),
            None => String::new(),
        };
        Ok(Reply {
            content: format!("Which episode should the {label} be for{range}?"),
            extra: json!({ "intent": intent.name(), "template_code": template_code }),
            events: Vec::new(),
        })
    }

    async fn reply_smalltalk(
        &self,
        session: &ChatSession,
        intent: &Intent,
        content: &str,
    ) -> Result<Reply, PipelineError> {
        let history: Vec<(String, String)> =
            ChatMessageRepo::recent(&self.pool, session.id, SMALLTALK_HISTORY_MESSAGES)
                .await?
                .into_iter()
                .map(|m| (m.role.as_str().to_string(), m.content))
                .collect();
        let project_ctx = self.session_project(session).await?.map(|p| PromptContext {
            project_name: p.name,
            project_description: p.description.unwrap_or_default(),
            ..PromptContext::default()
        });

        let prompt = render_smalltalk_prompt(project_ctx.as_ref(), &history, content);
        let text = self.dispatcher.text_generator().generate_text(&prompt).await?;
        Ok(Reply {
            content: text,
            extra: json!({ "intent": intent.name() }),
            events: Vec::new(),
        })
    }
}

fn episode_suffix(episode: Option<EpisodeNumber>) -> String {
    episode
        .map(|ep| format!(" for episode {ep}"))
        .unwrap_or_default()
}

/// Plain-text progress report used as the summary reply.
fn describe_progress(project: &Project, progress: &ProjectProgress) -> String {
    let list = |codes: &[String]| {
        if codes.is_empty() {
            "none".to_string()
        } else {
            codes.join(", ")
        }
    };

    let global = &progress.progress.global;
    let mut lines = vec![
        format!("Progress for \"{}\":", project.name),
        format!(
            "- Global: {} completed, pending: {}",
            global.completed.len(),
            list(&global.pending)
        ),
    ];
    for ep in &progress.progress.episodes {
        lines.push(format!(
            "- Episode {}: {} completed, pending: {}",
            ep.episode,
            ep.completed.len(),
            list(&ep.pending)
        ));
    }
    if progress.progress.is_complete() {
        lines.push("Every planned template is complete.".to_string());
    }
    lines.join("\n")
}
