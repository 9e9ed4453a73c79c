#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use studio_api::config::{LogFormat, ServerConfig};
use studio_api::router::build_app_router;
use studio_api::state::AppState;
use studio_core::templates::TemplateCatalog;
use studio_db::DbPool;
use studio_pipeline::generator::{PlaceholderImageGenerator, TemplateTextGenerator};
use studio_pipeline::storage::InMemoryStorage;
use studio_pipeline::GenerationDispatcher;
use tower::ServiceExt;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        database_url: "sqlite::memory:".to_string(),
        storage_root: PathBuf::from("unused"),
        chat_max_message_chars: 4000,
        log_format: LogFormat::Pretty,
    }
}

pub struct TestApp {
    pub router: Router,
    pub pool: DbPool,
}

/// The production router over a fresh in-memory database and blob store.
///
/// `Router` is cheap to clone; every helper below sends through a clone so
/// requests share one state.
pub async fn build_test_app() -> TestApp {
    let pool = studio_db::create_memory_pool().await.unwrap();
    studio_db::run_migrations(&pool).await.unwrap();

    let dispatcher = Arc::new(GenerationDispatcher::new(
        pool.clone(),
        TemplateCatalog::builtin(),
        Arc::new(InMemoryStorage::new()),
        Arc::new(TemplateTextGenerator::default()),
        Arc::new(PlaceholderImageGenerator),
    ));
    let state = AppState::new(pool.clone(), test_config(), dispatcher);

    TestApp {
        router: build_app_router(state),
        pool,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

async fn send(app: &TestApp, method: Method, uri: &str, body: Option<Value>) -> Response<Body> {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &TestApp, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None).await
}

pub async fn post_json(app: &TestApp, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(body)).await
}

pub async fn put_json(app: &TestApp, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::PUT, uri, Some(body)).await
}

pub async fn delete(app: &TestApp, uri: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, None).await
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Create a project and return its id.
pub async fn create_project(app: &TestApp, name: &str, episodes: i32) -> i64 {
    let response = post_json(
        app,
        "/api/v1/projects",
        serde_json::json!({ "name": name, "episodes_planned": episodes }),
    )
    .await;
    body_json(response).await["data"]["id"].as_i64().unwrap()
}
