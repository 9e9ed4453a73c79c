//! Integration tests for the repositories against an in-memory database:
//! - Migrations apply and the health check passes
//! - Artifact version numbering per key and the unique key/version index
//! - Pending task admission, key uniqueness, claims, failure bookkeeping
//! - Chat exchange append, ordering and event cursor

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use studio_core::chat::{
    ChatEventPayload, ChatEventType, ChatMessageRole, ChatSessionStatus, StatusPayload,
    StatusPhase, INTENT_SUMMARY,
};
use studio_db::models::artifact::{Artifact, NewArtifact};
use studio_db::models::chat::{CreateChatSession, NewChatExchange, NewChatMessage};
use studio_db::models::pending_task::NewPendingTask;
use studio_db::models::project::CreateProject;
use studio_db::repositories::{
    ArtifactRepo, ChatEventRepo, ChatMessageRepo, ChatSessionRepo, PendingTaskRepo, ProjectRepo,
};
use studio_db::DbPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn setup() -> DbPool {
    let pool = studio_db::create_memory_pool().await.unwrap();
    studio_db::run_migrations(&pool).await.unwrap();
    pool
}

async fn new_project(pool: &DbPool, episodes: i32) -> i64 {
    ProjectRepo::create(
        pool,
        &CreateProject {
            name: "Skyline".to_string(),
            description: Some("A test project".to_string()),
            episodes_planned: episodes,
        },
    )
    .await
    .unwrap()
    .id
}

fn new_artifact(project_id: i64, code: &str, episode: Option<i32>, version: i32) -> NewArtifact {
    NewArtifact {
        project_id,
        template_code: code.to_string(),
        episode,
        version,
        storage_path: format!("projects/{project_id}/{code}/{episode:?}/v{version:03}.md"),
        content_type: "text/markdown".to_string(),
        created_by: "tester".to_string(),
    }
}

fn new_task(project_id: i64, episode: Option<i32>) -> NewPendingTask {
    NewPendingTask {
        task_type: "generate_keyframe".to_string(),
        project_id,
        template_code: "keyframe_image".to_string(),
        episode,
        instructions: "dusk".to_string(),
        created_by: "tester".to_string(),
    }
}

/// Insert on a short-lived connection; the memory pool has only one.
async fn insert(pool: &DbPool, input: &NewArtifact) -> Result<Artifact, sqlx::Error> {
    let mut conn = pool.acquire().await.unwrap();
    ArtifactRepo::insert(&mut conn, input).await
}

async fn next_version(pool: &DbPool, pid: i64, code: &str, episode: Option<i32>) -> i32 {
    let mut conn = pool.acquire().await.unwrap();
    ArtifactRepo::next_version(&mut conn, pid, code, episode).await.unwrap()
}

fn message(role: ChatMessageRole, content: &str) -> NewChatMessage {
    NewChatMessage {
        role,
        content: content.to_string(),
        extra: None,
    }
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

#[tokio::test]
async fn migrations_apply_and_health_check_passes() {
    let pool = setup().await;
    studio_db::health_check(&pool).await.unwrap();
}

#[tokio::test]
async fn project_round_trip() {
    let pool = setup().await;
    let id = new_project(&pool, 3).await;
    let project = ProjectRepo::find_by_id(&pool, id).await.unwrap().unwrap();
    assert_eq!(project.name, "Skyline");
    assert_eq!(project.episodes_planned, 3);
    assert!(ProjectRepo::find_by_id(&pool, id + 100).await.unwrap().is_none());
    assert_eq!(ProjectRepo::list(&pool, 10, 0).await.unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn next_version_is_per_key() {
    let pool = setup().await;
    let pid = new_project(&pool, 2).await;

    assert_eq!(next_version(&pool, pid, "overall_spec", None).await, 1);
    insert(&pool, &new_artifact(pid, "overall_spec", None, 1)).await.unwrap();
    insert(&pool, &new_artifact(pid, "overall_spec", None, 2)).await.unwrap();
    assert_eq!(next_version(&pool, pid, "overall_spec", None).await, 3);

    // Other keys are unaffected.
    assert_eq!(next_version(&pool, pid, "episode_script", Some(1)).await, 1);
    insert(&pool, &new_artifact(pid, "episode_script", Some(1), 1)).await.unwrap();
    assert_eq!(next_version(&pool, pid, "episode_script", Some(2)).await, 1);

    let latest = ArtifactRepo::latest_for_key(&pool, pid, "overall_spec", None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.version, 2);
    assert_eq!(latest.status, "completed");
}

#[tokio::test]
async fn duplicate_version_for_key_is_rejected() {
    let pool = setup().await;
    let pid = new_project(&pool, 1).await;
    insert(&pool, &new_artifact(pid, "overall_spec", None, 1)).await.unwrap();

    let mut dup = new_artifact(pid, "overall_spec", None, 1);
    dup.storage_path = "elsewhere.md".to_string();
    let err = insert(&pool, &dup).await.unwrap_err();
    assert!(studio_db::is_unique_violation(&err));
}

#[tokio::test]
async fn list_by_project_is_newest_first() {
    let pool = setup().await;
    let pid = new_project(&pool, 1).await;
    let first = insert(&pool, &new_artifact(pid, "overall_spec", None, 1)).await.unwrap();
    let second = insert(&pool, &new_artifact(pid, "character_design", None, 1)).await.unwrap();

    let ids: Vec<i64> = ArtifactRepo::list_by_project(&pool, pid)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.id)
        .collect();
    assert_eq!(ids, vec![second.id, first.id]);
}

// ---------------------------------------------------------------------------
// Pending tasks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn one_pending_task_per_key() {
    let pool = setup().await;
    let pid = new_project(&pool, 2).await;

    let task = PendingTaskRepo::create(&pool, &new_task(pid, Some(1))).await.unwrap();
    assert_eq!(task.attempts, 0);

    let err = PendingTaskRepo::create(&pool, &new_task(pid, Some(1))).await.unwrap_err();
    assert!(studio_db::is_unique_violation(&err));

    // A different episode is a different key.
    PendingTaskRepo::create(&pool, &new_task(pid, Some(2))).await.unwrap();
    assert_eq!(PendingTaskRepo::list(&pool, Some(pid), 50, 0).await.unwrap().len(), 2);
    assert_eq!(PendingTaskRepo::list_ids(&pool).await.unwrap().len(), 2);

    let found = PendingTaskRepo::find_by_key(&pool, pid, "keyframe_image", Some(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, task.id);
}

#[tokio::test]
async fn failure_keeps_descriptor_and_releases_claim() {
    let pool = setup().await;
    let pid = new_project(&pool, 1).await;
    let task = PendingTaskRepo::create(&pool, &new_task(pid, Some(1))).await.unwrap();
    assert!(task.claimed_at.is_none());

    let claimed = PendingTaskRepo::claim(&pool, task.id, Utc::now() - Duration::minutes(10))
        .await
        .unwrap()
        .unwrap();
    assert!(claimed.claimed_at.is_some());

    let failed = PendingTaskRepo::record_failure(&pool, task.id, claimed.claim_seq, "backend offline")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(failed.attempts, 1);
    assert_eq!(failed.last_error.as_deref(), Some("backend offline"));
    assert!(failed.claimed_at.is_none());

    // Released, so the next run can claim it straight away.
    let again = PendingTaskRepo::claim(&pool, task.id, Utc::now() - Duration::minutes(10))
        .await
        .unwrap()
        .unwrap();
    assert!(again.claim_seq > claimed.claim_seq);

    // Bookkeeping from the superseded claim is ignored.
    assert!(PendingTaskRepo::record_failure(&pool, task.id, claimed.claim_seq, "late")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn held_claim_excludes_other_runs_until_stale() {
    let pool = setup().await;
    let pid = new_project(&pool, 1).await;
    let task = PendingTaskRepo::create(&pool, &new_task(pid, Some(1))).await.unwrap();
    let cutoff = Utc::now() - Duration::minutes(10);

    let first = PendingTaskRepo::claim(&pool, task.id, cutoff).await.unwrap().unwrap();
    assert!(PendingTaskRepo::claim(&pool, task.id, cutoff).await.unwrap().is_none());
    assert!(!PendingTaskRepo::delete_unclaimed(&pool, task.id, cutoff).await.unwrap());

    // A cutoff after the claim time treats the claim as abandoned.
    let later = Utc::now() + Duration::minutes(1);
    let taken = PendingTaskRepo::claim(&pool, task.id, later).await.unwrap().unwrap();
    assert_ne!(taken.claim_seq, first.claim_seq);

    // The abandoned run can no longer complete the descriptor.
    let mut conn = pool.acquire().await.unwrap();
    assert!(!PendingTaskRepo::complete(&mut conn, task.id, first.claim_seq).await.unwrap());
    drop(conn);

    assert!(PendingTaskRepo::delete_unclaimed(&pool, task.id, later).await.unwrap());
    assert!(PendingTaskRepo::claim(&pool, task.id, later).await.unwrap().is_none());
}

#[tokio::test]
async fn completing_task_in_artifact_transaction_removes_descriptor() {
    let pool = setup().await;
    let pid = new_project(&pool, 1).await;
    let task = PendingTaskRepo::create(&pool, &new_task(pid, Some(1))).await.unwrap();
    let claimed = PendingTaskRepo::claim(&pool, task.id, Utc::now() - Duration::minutes(10))
        .await
        .unwrap()
        .unwrap();

    let mut tx = pool.begin().await.unwrap();
    assert!(ProjectRepo::touch(&mut tx, pid).await.unwrap());
    assert!(PendingTaskRepo::complete(&mut tx, task.id, claimed.claim_seq).await.unwrap());
    let version = ArtifactRepo::next_version(&mut tx, pid, "keyframe_image", Some(1))
        .await
        .unwrap();
    let artifact = ArtifactRepo::insert(&mut tx, &new_artifact(pid, "keyframe_image", Some(1), version))
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(artifact.version, 1);
    assert!(PendingTaskRepo::find_by_id(&pool, task.id).await.unwrap().is_none());
}

#[tokio::test]
async fn rolled_back_transaction_keeps_descriptor() {
    let pool = setup().await;
    let pid = new_project(&pool, 1).await;
    let task = PendingTaskRepo::create(&pool, &new_task(pid, Some(1))).await.unwrap();
    let claimed = PendingTaskRepo::claim(&pool, task.id, Utc::now() - Duration::minutes(10))
        .await
        .unwrap()
        .unwrap();

    let mut tx = pool.begin().await.unwrap();
    assert!(PendingTaskRepo::complete(&mut tx, task.id, claimed.claim_seq).await.unwrap());
    ArtifactRepo::insert(&mut tx, &new_artifact(pid, "keyframe_image", Some(1), 1))
        .await
        .unwrap();
    tx.rollback().await.unwrap();

    assert!(PendingTaskRepo::find_by_id(&pool, task.id).await.unwrap().is_some());
    assert!(ArtifactRepo::list_by_project(&pool, pid).await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

#[tokio::test]
async fn exchange_appends_messages_and_events_in_order() {
    let pool = setup().await;
    let pid = new_project(&pool, 1).await;
    let session = ChatSessionRepo::create(
        &pool,
        &CreateChatSession {
            project_id: Some(pid),
            title: Some("Planning".to_string()),
        },
    )
    .await
    .unwrap();
    assert_eq!(session.status, ChatSessionStatus::Active);

    let exchange = NewChatExchange {
        user: message(ChatMessageRole::User, "progress?"),
        assistant: message(ChatMessageRole::Assistant, "Here is where things stand."),
        events: vec![
            ChatEventPayload::Status(StatusPayload::new(StatusPhase::Requested, INTENT_SUMMARY)),
            ChatEventPayload::Status(StatusPayload::new(StatusPhase::Completed, INTENT_SUMMARY)),
        ],
    };
    let written = ChatMessageRepo::append_exchange(&pool, session.id, &exchange)
        .await
        .unwrap();

    assert!(written.user_message.id < written.assistant_message.id);
    let types: Vec<ChatEventType> = written.events.iter().map(|e| e.event_type).collect();
    assert_eq!(
        types,
        vec![ChatEventType::Status, ChatEventType::Status, ChatEventType::Message]
    );
    let closing = written.events.last().unwrap();
    assert_eq!(closing.payload.0["message_id"], written.assistant_message.id);
    assert_eq!(closing.payload.0["role"], "assistant");

    let messages = ChatMessageRepo::list_by_session(&pool, session.id, 100, 0).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, ChatMessageRole::User);

    let refreshed = ChatSessionRepo::find_by_id(&pool, session.id).await.unwrap().unwrap();
    assert!(refreshed.updated_at >= session.updated_at);
}

#[tokio::test]
async fn event_cursor_returns_only_newer_events() {
    let pool = setup().await;
    let session = ChatSessionRepo::create(&pool, &CreateChatSession::default()).await.unwrap();

    for text in ["one", "two"] {
        let exchange = NewChatExchange {
            user: message(ChatMessageRole::User, text),
            assistant: message(ChatMessageRole::Assistant, text),
            events: Vec::new(),
        };
        ChatMessageRepo::append_exchange(&pool, session.id, &exchange).await.unwrap();
    }

    let all = ChatEventRepo::list_after(&pool, session.id, None, 100).await.unwrap();
    assert_eq!(all.len(), 2);
    let newer = ChatEventRepo::list_after(&pool, session.id, Some(all[0].id), 100)
        .await
        .unwrap();
    assert_eq!(newer.len(), 1);
    assert_eq!(newer[0].id, all[1].id);
    assert!(ChatEventRepo::list_after(&pool, session.id, Some(all[1].id), 100)
        .await
        .unwrap()
        .is_empty());

    let recent = ChatMessageRepo::recent(&pool, session.id, 3).await.unwrap();
    let contents: Vec<&str> = recent.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["one", "two", "two"]);
}

#[tokio::test]
async fn status_update_is_conditional() {
    let pool = setup().await;
    let session = ChatSessionRepo::create(&pool, &CreateChatSession::default()).await.unwrap();

    let closed = ChatSessionRepo::update_status(
        &pool,
        session.id,
        ChatSessionStatus::Active,
        ChatSessionStatus::Closed,
    )
    .await
    .unwrap();
    assert_matches!(closed, Some(s) if s.status == ChatSessionStatus::Closed);

    let again = ChatSessionRepo::update_status(
        &pool,
        session.id,
        ChatSessionStatus::Active,
        ChatSessionStatus::Archived,
    )
    .await
    .unwrap();
    assert!(again.is_none());

    let active = ChatSessionRepo::list(&pool, None, Some(ChatSessionStatus::Active), 20, 0)
        .await
        .unwrap();
    assert!(active.is_empty());
    let closed = ChatSessionRepo::list(&pool, None, Some(ChatSessionStatus::Closed), 20, 0)
        .await
        .unwrap();
    assert_eq!(closed.len(), 1);
}
