use std::sync::Arc;

use anyhow::Context;
use studio_core::templates::TemplateCatalog;
use studio_pipeline::generator::{PlaceholderImageGenerator, TemplateTextGenerator};
use studio_pipeline::storage::LocalStorage;
use studio_pipeline::GenerationDispatcher;
use studio_worker::WorkerConfig;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env();

    let (pretty, json) = if config.json_logs {
        (None, Some(fmt::layer().json().with_target(true)))
    } else {
        (Some(fmt::layer()), None)
    };
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "studio_worker=debug,studio_pipeline=debug".into()),
        )
        .with(pretty)
        .with(json)
        .init();

    let pool = studio_db::create_pool(&config.database_url)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_url))?;
    studio_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let dispatcher = GenerationDispatcher::new(
        pool.clone(),
        TemplateCatalog::builtin(),
        Arc::new(LocalStorage::new(config.storage_root.clone())),
        Arc::new(TemplateTextGenerator::default()),
        Arc::new(PlaceholderImageGenerator),
    );

    let report = studio_worker::drain(&dispatcher)
        .await
        .context("Failed to read the pending task queue")?;
    pool.close().await;

    if report.failed > 0 {
        anyhow::bail!("{} of the pending tasks failed", report.failed);
    }
    Ok(())
}
