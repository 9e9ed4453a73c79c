#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use studio_core::templates::TemplateCatalog;
use studio_db::models::project::CreateProject;
use studio_db::repositories::ProjectRepo;
use studio_db::DbPool;
use studio_pipeline::generator::{
    GeneratedContent, GenerationError, ImageGenerator, PlaceholderImageGenerator,
    TemplateTextGenerator, TextGenerator,
};
use studio_pipeline::storage::InMemoryStorage;
use studio_pipeline::{GenerateRequest, GenerationDispatcher};

pub struct Harness {
    pub pool: DbPool,
    pub storage: Arc<InMemoryStorage>,
    pub dispatcher: Arc<GenerationDispatcher>,
}

pub async fn harness() -> Harness {
    harness_with(
        Arc::new(TemplateTextGenerator::default()),
        Arc::new(PlaceholderImageGenerator),
    )
    .await
}

pub async fn harness_with(
    text: Arc<dyn TextGenerator>,
    image: Arc<dyn ImageGenerator>,
) -> Harness {
    let pool = studio_db::create_memory_pool().await.unwrap();
    studio_db::run_migrations(&pool).await.unwrap();
    let storage = Arc::new(InMemoryStorage::new());
    let dispatcher = Arc::new(GenerationDispatcher::new(
        pool.clone(),
        TemplateCatalog::builtin(),
        storage.clone(),
        text,
        image,
    ));
    Harness {
        pool,
        storage,
        dispatcher,
    }
}

/// A second dispatcher over the same database and blob store, standing in for
/// another server or worker process. It shares no in-process locks with `h`.
pub fn peer_dispatcher(
    h: &Harness,
    text: Arc<dyn TextGenerator>,
    image: Arc<dyn ImageGenerator>,
) -> Arc<GenerationDispatcher> {
    Arc::new(GenerationDispatcher::new(
        h.pool.clone(),
        TemplateCatalog::builtin(),
        h.storage.clone(),
        text,
        image,
    ))
}

pub async fn new_project(pool: &DbPool, episodes: i32) -> i64 {
    ProjectRepo::create(
        pool,
        &CreateProject {
            name: "Skyline".to_string(),
            description: Some("Sky pirates over a drowned city".to_string()),
            episodes_planned: episodes,
        },
    )
    .await
    .unwrap()
    .id
}

pub fn request(project_id: i64, code: &str, episode: Option<i32>) -> GenerateRequest {
    GenerateRequest {
        project_id,
        template_code: code.to_string(),
        episode,
        instructions: "keep it tense".to_string(),
        created_by: "tester".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Generator doubles
// ---------------------------------------------------------------------------

/// Always fails.
pub struct FailingGenerator;

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn generate_text(&self, _prompt: &str) -> Result<String, GenerationError> {
        Err(GenerationError::Backend("model offline".to_string()))
    }
}

#[async_trait]
impl ImageGenerator for FailingGenerator {
    async fn generate_image(&self, _prompt: &str) -> Result<GeneratedContent, GenerationError> {
        Err(GenerationError::Backend("renderer offline".to_string()))
    }
}

/// Remembers every prompt and delegates to the placeholder renderer.
#[derive(Default)]
pub struct RecordingImageGenerator {
    pub prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl ImageGenerator for RecordingImageGenerator {
    async fn generate_image(&self, prompt: &str) -> Result<GeneratedContent, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        PlaceholderImageGenerator.generate_image(prompt).await
    }
}

/// Returns the prompt itself as the image body after a short delay, so a
/// stored blob shows which run produced it.
pub struct SlowEchoImageGenerator;

#[async_trait]
impl ImageGenerator for SlowEchoImageGenerator {
    async fn generate_image(&self, prompt: &str) -> Result<GeneratedContent, GenerationError> {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(GeneratedContent {
            data: prompt.as_bytes().to_vec(),
            content_type: "image/png".to_string(),
        })
    }
}
