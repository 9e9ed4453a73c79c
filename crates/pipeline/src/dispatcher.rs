//! Generation dispatcher.
//!
//! Routes generation requests by template kind:
//!
//! - **Text** templates are generated inline and written as a new artifact
//!   version before the call returns.
//! - **Image** templates are admitted to the task queue as a pending
//!   descriptor. Nothing is generated until a worker run is requested for
//!   that descriptor, either by key (`run_worker`) or by id (`run_task`).
//!
//! Every write for a `(project, template, episode)` key happens under that
//! key's in-process lock. Generation for inline requests runs before the lock
//! is taken; worker runs hold it for the whole run.
//!
//! Other processes may share the database, so the lock is not enough on its
//! own. A worker run also claims its descriptor in the database and gives up
//! if the claim is lost. An artifact's version, blob and row are written
//! inside one database write transaction, and the blob is written before the
//! commit. A blob path therefore never belongs to a committed row that a
//! different writer produced.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use studio_core::artifact_path;
use studio_core::error::CoreError;
use studio_core::locks::KeyedLocks;
use studio_core::pagination::{clamp_limit, clamp_offset};
use studio_core::progress::{compute_progress, Progress};
use studio_core::templates::{TemplateCatalog, TemplateKind, TemplateSpec, EPISODE_SUMMARY};
use studio_core::types::{DbId, EpisodeNumber, Timestamp};
use studio_db::models::artifact::{Artifact, NewArtifact};
use studio_db::models::pending_task::{NewPendingTask, PendingTask};
use studio_db::models::project::Project;
use studio_db::repositories::{ArtifactRepo, PendingTaskRepo, ProjectRepo};
use studio_db::DbPool;
use tokio::sync::OwnedMutexGuard;

use crate::error::PipelineError;
use crate::generator::{GeneratedContent, ImageGenerator, TextGenerator};
use crate::prompts::{excerpt, render_image_prompt, render_text_prompt, PromptContext};
use crate::storage::{StorageBackend, StorageError};

/// Default page size for task listing.
const DEFAULT_TASK_LIMIT: i64 = 50;

/// Maximum page size for task listing.
const MAX_TASK_LIMIT: i64 = 200;

/// A claim older than this is treated as abandoned by a crashed run.
const CLAIM_LEASE_MINUTES: i64 = 15;

/// How often a run re-checks a descriptor claimed by another process.
const CLAIM_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long a run waits on another process's claim before giving up.
const CLAIM_WAIT: Duration = Duration::from_secs(30);

/// Version assignments tried before a write gives up.
const MAX_WRITE_ATTEMPTS: u32 = 3;

/// `(project_id, template_code, episode)`.
type ArtifactKey = (DbId, String, Option<EpisodeNumber>);

/// The descriptor a write completes, and the claim it holds on it.
#[derive(Debug, Clone, Copy)]
struct TaskClaim {
    task_id: DbId,
    seq: i64,
}

fn claim_cutoff() -> Timestamp {
    Utc::now() - chrono::Duration::minutes(CLAIM_LEASE_MINUTES)
}

// ---------------------------------------------------------------------------
// Requests and results
// ---------------------------------------------------------------------------

/// A request to produce a template for a scope.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub project_id: DbId,
    pub template_code: String,
    pub episode: Option<EpisodeNumber>,
    pub instructions: String,
    pub created_by: String,
}

/// Result of [`GenerationDispatcher::generate`].
#[derive(Debug, Clone)]
pub enum GenerateOutcome {
    /// Generated inline; the new artifact version.
    Completed(Artifact),
    /// Admitted to the task queue; no artifact exists yet.
    Accepted(PendingTask),
}

fn default_task_type() -> String {
    studio_core::templates::TASK_GENERATE_KEYFRAME.to_string()
}

fn default_template_code() -> String {
    studio_core::templates::KEYFRAME_IMAGE.to_string()
}

/// Explicit worker trigger addressed by key.
///
/// `instructions` and `created_by`, when present and non-blank, replace the
/// values stored on the pending descriptor.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerRequest {
    #[serde(default = "default_task_type")]
    pub task_type: String,
    pub project_id: DbId,
    #[serde(default = "default_template_code")]
    pub template_code: String,
    pub episode: Option<EpisodeNumber>,
    pub instructions: Option<String>,
    pub created_by: Option<String>,
}

/// An artifact with its stored content. Binary content is base64 encoded.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactContent {
    pub artifact: Artifact,
    pub content: String,
    pub content_type: String,
    pub is_binary: bool,
}

/// Progress view of one project.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectProgress {
    pub project_id: DbId,
    pub episodes_planned: i32,
    #[serde(flatten)]
    pub progress: Progress,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn require_created_by(created_by: &str) -> Result<&str, CoreError> {
    non_blank(Some(created_by))
        .ok_or_else(|| CoreError::Validation("created_by must not be empty".to_string()))
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

pub struct GenerationDispatcher {
    pool: DbPool,
    catalog: TemplateCatalog,
    storage: Arc<dyn StorageBackend>,
    text: Arc<dyn TextGenerator>,
    image: Arc<dyn ImageGenerator>,
    locks: KeyedLocks<ArtifactKey>,
}

impl GenerationDispatcher {
    pub fn new(
        pool: DbPool,
        catalog: TemplateCatalog,
        storage: Arc<dyn StorageBackend>,
        text: Arc<dyn TextGenerator>,
        image: Arc<dyn ImageGenerator>,
    ) -> Self {
        Self {
            pool,
            catalog,
            storage,
            text,
            image,
            locks: KeyedLocks::new(),
        }
    }

    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    pub fn text_generator(&self) -> &Arc<dyn TextGenerator> {
        &self.text
    }

    pub async fn load_project(&self, project_id: DbId) -> Result<Project, PipelineError> {
        ProjectRepo::find_by_id(&self.pool, project_id)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound {
                    entity: "project",
                    id: project_id,
                }
                .into()
            })
    }

    // -- reads --

    /// Derive the progress view from the project's current artifacts.
    pub async fn progress(&self, project_id: DbId) -> Result<ProjectProgress, PipelineError> {
        let project = self.load_project(project_id).await?;
        let artifacts = ArtifactRepo::list_by_project(&self.pool, project.id).await?;
        Ok(ProjectProgress {
            project_id: project.id,
            episodes_planned: project.episodes_planned,
            progress: compute_progress(&self.catalog, project.episodes_planned, &artifacts),
        })
    }

    /// All artifacts of a project, newest first.
    pub async fn list_artifacts(&self, project_id: DbId) -> Result<Vec<Artifact>, PipelineError> {
        let project = self.load_project(project_id).await?;
        Ok(ArtifactRepo::list_by_project(&self.pool, project.id).await?)
    }

    /// Load an artifact and its content. The artifact must belong to `project_id`.
    pub async fn artifact_content(
        &self,
        project_id: DbId,
        artifact_id: DbId,
    ) -> Result<ArtifactContent, PipelineError> {
        self.load_project(project_id).await?;
        let artifact = ArtifactRepo::find_by_id(&self.pool, artifact_id)
            .await?
            .filter(|a| a.project_id == project_id)
            .ok_or(CoreError::NotFound {
                entity: "artifact",
                id: artifact_id,
            })?;

        let bytes = self.storage.load_bytes(&artifact.storage_path).await?;
        let is_binary = artifact_path::is_binary(&artifact.content_type);
        let content = if is_binary {
            STANDARD.encode(&bytes)
        } else {
            String::from_utf8_lossy(&bytes).into_owned()
        };

        Ok(ArtifactContent {
            content_type: artifact.content_type.clone(),
            artifact,
            content,
            is_binary,
        })
    }

    // -- generation --

    /// Validate a request and either generate inline or admit a task.
    pub async fn generate(&self, req: GenerateRequest) -> Result<GenerateOutcome, PipelineError> {
        let created_by = require_created_by(&req.created_by)?;
        let project = self.load_project(req.project_id).await?;
        let template =
            *self
                .catalog
                .validate_target(&req.template_code, req.episode, project.episodes_planned)?;

        if template.kind.is_async() {
            let task = self
                .admit(&project, &template, req.episode, &req.instructions, created_by)
                .await?;
            return Ok(GenerateOutcome::Accepted(task));
        }

        let ctx = self
            .prompt_context(&project, &template, req.episode, &req.instructions)
            .await?;
        let content = self.render(&template, &ctx).await?;

        let key = (project.id, template.code.to_string(), req.episode);
        let guard = self.locks.lock(&key).await;
        let artifact = self
            .write_artifact(&guard, &key, content, created_by, None)
            .await?;
        Ok(GenerateOutcome::Completed(artifact))
    }

    /// Admit a pending descriptor. A key holds at most one descriptor.
    async fn admit(
        &self,
        project: &Project,
        template: &TemplateSpec,
        episode: Option<EpisodeNumber>,
        instructions: &str,
        created_by: &str,
    ) -> Result<PendingTask, PipelineError> {
        let task_type = template.task_type.ok_or_else(|| {
            CoreError::Internal(format!("Template '{}' has no task type", template.code))
        })?;
        let key = (project.id, template.code.to_string(), episode);
        let _guard = self.locks.lock(&key).await;

        if let Some(existing) =
            PendingTaskRepo::find_by_key(&self.pool, project.id, template.code, episode).await?
        {
            return Err(CoreError::Conflict(format!(
                "Task {} is already pending for template '{}'",
                existing.id, template.code
            ))
            .into());
        }

        let input = NewPendingTask {
            task_type: task_type.to_string(),
            project_id: project.id,
            template_code: template.code.to_string(),
            episode,
            instructions: instructions.trim().to_string(),
            created_by: created_by.to_string(),
        };
        let task = PendingTaskRepo::create(&self.pool, &input)
            .await
            .map_err(|e| {
                if studio_db::is_unique_violation(&e) {
                    PipelineError::Core(CoreError::Conflict(format!(
                        "A task is already pending for template '{}'",
                        template.code
                    )))
                } else {
                    e.into()
                }
            })?;

        tracing::info!(
            task_id = task.id,
            project_id = project.id,
            template_code = template.code,
            episode = ?episode,
            "Generation task admitted",
        );
        Ok(task)
    }

    // -- task queue --

    pub async fn list_tasks(
        &self,
        project_id: Option<DbId>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<PendingTask>, PipelineError> {
        let limit = clamp_limit(limit, DEFAULT_TASK_LIMIT, MAX_TASK_LIMIT);
        let offset = clamp_offset(offset);
        Ok(PendingTaskRepo::list(&self.pool, project_id, limit, offset).await?)
    }

    pub async fn get_task(&self, task_id: DbId) -> Result<PendingTask, PipelineError> {
        PendingTaskRepo::find_by_id(&self.pool, task_id)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound {
                    entity: "pending_task",
                    id: task_id,
                }
                .into()
            })
    }

    /// Ids of every pending descriptor, oldest first.
    pub async fn pending_task_ids(&self) -> Result<Vec<DbId>, PipelineError> {
        Ok(PendingTaskRepo::list_ids(&self.pool).await?)
    }

    /// Remove a pending descriptor without running it. A descriptor that a
    /// run currently holds cannot be cancelled.
    pub async fn cancel_task(&self, task_id: DbId) -> Result<(), PipelineError> {
        let task = self.get_task(task_id).await?;
        let key = (task.project_id, task.template_code.clone(), task.episode);
        let _guard = self.locks.lock(&key).await;

        if !PendingTaskRepo::delete_unclaimed(&self.pool, task_id, claim_cutoff()).await? {
            self.get_task(task_id).await?;
            return Err(CoreError::Conflict(format!(
                "Task {task_id} is being run and cannot be cancelled"
            ))
            .into());
        }
        tracing::info!(task_id, "Pending task cancelled");
        Ok(())
    }

    /// Execute the pending descriptor for a key.
    pub async fn run_worker(&self, req: WorkerRequest) -> Result<Artifact, PipelineError> {
        let template = *self.catalog.require(&req.template_code)?;
        if template.task_type != Some(req.task_type.as_str()) {
            return Err(CoreError::Validation(format!(
                "Task type '{}' does not handle template '{}'",
                req.task_type, template.code
            ))
            .into());
        }
        let project = self.load_project(req.project_id).await?;
        self.catalog
            .validate_target(template.code, req.episode, project.episodes_planned)?;

        let key = (project.id, template.code.to_string(), req.episode);
        let guard = self.locks.lock(&key).await;
        let task = PendingTaskRepo::find_by_key(&self.pool, project.id, template.code, req.episode)
            .await?
            .ok_or_else(|| {
                CoreError::Missing(format!(
                    "No pending '{}' task for project {} episode {:?}",
                    template.code, project.id, req.episode
                ))
            })?;
        let task = self.claim_task(task.id).await?;

        self.execute_task(
            &guard,
            &key,
            &project,
            &template,
            &task,
            non_blank(req.instructions.as_deref()),
            non_blank(req.created_by.as_deref()),
        )
        .await
    }

    /// Execute a pending descriptor by id.
    pub async fn run_task(&self, task_id: DbId) -> Result<Artifact, PipelineError> {
        let task = self.get_task(task_id).await?;
        let template = *self.catalog.require(&task.template_code)?;
        if template.task_type != Some(task.task_type.as_str()) {
            return Err(CoreError::Validation(format!(
                "Task type '{}' does not handle template '{}'",
                task.task_type, template.code
            ))
            .into());
        }
        let project = self.load_project(task.project_id).await?;

        let key = (task.project_id, task.template_code.clone(), task.episode);
        let guard = self.locks.lock(&key).await;
        // Another run may have completed it while we waited.
        let task = self.claim_task(task_id).await?;

        self.execute_task(&guard, &key, &project, &template, &task, None, None)
            .await
    }

    /// Claim a descriptor for this run. While another process holds a live
    /// claim, wait for it to finish: the descriptor then either disappears
    /// (`NotFound`) or is released after a failure and claimed here.
    async fn claim_task(&self, task_id: DbId) -> Result<PendingTask, PipelineError> {
        let deadline = tokio::time::Instant::now() + CLAIM_WAIT;
        loop {
            if let Some(task) = PendingTaskRepo::claim(&self.pool, task_id, claim_cutoff()).await? {
                return Ok(task);
            }
            self.get_task(task_id).await?;
            if tokio::time::Instant::now() >= deadline {
                return Err(CoreError::Conflict(format!(
                    "Task {task_id} is being run by another worker"
                ))
                .into());
            }
            tracing::debug!(task_id, "Pending task claimed elsewhere; waiting");
            tokio::time::sleep(CLAIM_POLL_INTERVAL).await;
        }
    }

    /// Generate and write the artifact for a claimed descriptor. On failure
    /// the descriptor stays pending with its attempt recorded and its claim
    /// released.
    #[allow(clippy::too_many_arguments)]
    async fn execute_task(
        &self,
        guard: &OwnedMutexGuard<()>,
        key: &ArtifactKey,
        project: &Project,
        template: &TemplateSpec,
        task: &PendingTask,
        instructions: Option<&str>,
        created_by: Option<&str>,
    ) -> Result<Artifact, PipelineError> {
        let instructions = instructions.unwrap_or(&task.instructions);
        let created_by = created_by.unwrap_or(&task.created_by);

        let result = async {
            let ctx = self
                .prompt_context(project, template, task.episode, instructions)
                .await?;
            let content = self.render(template, &ctx).await?;
            let claim = TaskClaim {
                task_id: task.id,
                seq: task.claim_seq,
            };
            self.write_artifact(guard, key, content, created_by, Some(claim))
                .await
        }
        .await;

        match result {
            Ok(artifact) => {
                tracing::info!(
                    task_id = task.id,
                    artifact_id = artifact.id,
                    version = artifact.version,
                    "Pending task completed",
                );
                Ok(artifact)
            }
            Err(err) => {
                let message = err.to_string();
                tracing::warn!(task_id = task.id, error = %message, "Pending task run failed");
                match PendingTaskRepo::record_failure(&self.pool, task.id, task.claim_seq, &message)
                    .await
                {
                    Ok(Some(_)) => {}
                    Ok(None) => tracing::warn!(
                        task_id = task.id,
                        "Task claim was superseded; failure not recorded",
                    ),
                    Err(record_err) => tracing::error!(
                        task_id = task.id,
                        error = %record_err,
                        "Failed to record task failure",
                    ),
                }
                Err(err)
            }
        }
    }

    // -- internals --

    /// Build the prompt context. Image templates draw on the latest episode
    /// summary; text templates on the previous version of the same key.
    async fn prompt_context(
        &self,
        project: &Project,
        template: &TemplateSpec,
        episode: Option<EpisodeNumber>,
        instructions: &str,
    ) -> Result<PromptContext, PipelineError> {
        let source_code = match template.kind {
            TemplateKind::Image => EPISODE_SUMMARY,
            TemplateKind::Text => template.code,
        };
        let existing_summary = self
            .latest_excerpt(project.id, source_code, episode)
            .await?;

        Ok(PromptContext {
            project_name: project.name.clone(),
            project_description: project.description.clone().unwrap_or_default(),
            episode,
            instructions: instructions.to_string(),
            existing_summary,
        })
    }

    async fn latest_excerpt(
        &self,
        project_id: DbId,
        template_code: &str,
        episode: Option<EpisodeNumber>,
    ) -> Result<String, PipelineError> {
        let Some(previous) =
            ArtifactRepo::latest_for_key(&self.pool, project_id, template_code, episode).await?
        else {
            return Ok(String::new());
        };
        match self.storage.load_bytes(&previous.storage_path).await {
            Ok(bytes) => Ok(excerpt(&bytes)),
            Err(StorageError::NotFound(path)) => {
                tracing::warn!(path = %path, "Previous artifact blob is missing");
                Ok(String::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn render(
        &self,
        template: &TemplateSpec,
        ctx: &PromptContext,
    ) -> Result<GeneratedContent, PipelineError> {
        let content = match template.kind {
            TemplateKind::Text => {
                let prompt = render_text_prompt(template.code, ctx);
                let text = self.text.generate_text(&prompt).await?;
                GeneratedContent {
                    data: text.into_bytes(),
                    content_type: self.text.content_type().to_string(),
                }
            }
            TemplateKind::Image => {
                let prompt = render_image_prompt(ctx);
                self.image.generate_image(&prompt).await?
            }
        };
        Ok(content)
    }

    /// Write a new artifact version for the key.
    ///
    /// The caller must hold the key's lock. When `claim` is set, the
    /// descriptor is removed in the same transaction, and the write fails
    /// with `Conflict` if the claim has been lost. A version taken by a
    /// concurrent writer is retried with the next one.
    async fn write_artifact(
        &self,
        _guard: &OwnedMutexGuard<()>,
        key: &ArtifactKey,
        content: GeneratedContent,
        created_by: &str,
        claim: Option<TaskClaim>,
    ) -> Result<Artifact, PipelineError> {
        let mut attempt = 1;
        loop {
            match self.try_write_artifact(key, &content, created_by, claim).await {
                Err(PipelineError::Database(err)) if studio_db::is_unique_violation(&err) => {
                    if attempt >= MAX_WRITE_ATTEMPTS {
                        return Err(CoreError::Conflict(format!(
                            "Could not assign a version of '{}' after {attempt} attempts",
                            key.1
                        ))
                        .into());
                    }
                    tracing::warn!(attempt, error = %err, "Artifact version taken; retrying");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn try_write_artifact(
        &self,
        key: &ArtifactKey,
        content: &GeneratedContent,
        created_by: &str,
        claim: Option<TaskClaim>,
    ) -> Result<Artifact, PipelineError> {
        let (project_id, template_code, episode) = key;
        let mut tx = self.pool.begin().await?;

        // The first statement writes, so the version read below runs under
        // the database write lock.
        if !ProjectRepo::touch(&mut tx, *project_id).await? {
            return Err(CoreError::NotFound {
                entity: "project",
                id: *project_id,
            }
            .into());
        }
        if let Some(claim) = claim {
            if !PendingTaskRepo::complete(&mut tx, claim.task_id, claim.seq).await? {
                return Err(CoreError::Conflict(format!(
                    "Task {} was removed or claimed by another run",
                    claim.task_id
                ))
                .into());
            }
        }

        let version =
            ArtifactRepo::next_version(&mut tx, *project_id, template_code, *episode).await?;
        let storage_path = artifact_path::storage_path(
            *project_id,
            template_code,
            *episode,
            version,
            &content.content_type,
        );
        let input = NewArtifact {
            project_id: *project_id,
            template_code: template_code.clone(),
            episode: *episode,
            version,
            storage_path: storage_path.clone(),
            content_type: content.content_type.clone(),
            created_by: created_by.to_string(),
        };
        let artifact = ArtifactRepo::insert(&mut tx, &input).await?;

        // Until the commit no committed row owns this path.
        if let Err(err) = self.storage.save_bytes(&storage_path, &content.data).await {
            if let Err(cleanup) = self.storage.delete(&storage_path).await {
                tracing::error!(
                    path = %storage_path,
                    error = %cleanup,
                    "Failed to remove partial blob",
                );
            }
            return Err(err.into());
        }

        if let Err(err) = tx.commit().await {
            // Another writer may reuse this path now; leave the blob alone.
            tracing::error!(
                path = %storage_path,
                error = %err,
                "Artifact commit failed after the blob was written",
            );
            return Err(err.into());
        }

        tracing::info!(
            artifact_id = artifact.id,
            project_id = artifact.project_id,
            template_code = %artifact.template_code,
            episode = ?artifact.episode,
            version = artifact.version,
            "Artifact written",
        );
        Ok(artifact)
    }
}
