use std::net::SocketAddr;
use std::sync::Arc;

use studio_api::config::ServerConfig;
use studio_api::logging;
use studio_api::router::build_app_router;
use studio_api::state::AppState;
use studio_core::templates::TemplateCatalog;
use studio_pipeline::generator::{PlaceholderImageGenerator, TemplateTextGenerator};
use studio_pipeline::storage::LocalStorage;
use studio_pipeline::GenerationDispatcher;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    dotenvy::dotenv().ok();

    // --- Configuration ---
    let config = ServerConfig::from_env()?;

    // --- Tracing ---
    logging::init(config.log_format, logging::DEFAULT_FILTER);
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let pool = studio_db::create_pool(&config.database_url).await?;
    tracing::info!("Database connection pool created");

    studio_db::health_check(&pool).await?;
    tracing::info!("Database health check passed");

    studio_db::run_migrations(&pool).await?;
    tracing::info!("Database migrations applied");

    // --- Generation pipeline ---
    let storage = Arc::new(LocalStorage::new(config.storage_root.clone()));
    tracing::info!(root = %config.storage_root.display(), "Artifact storage ready");

    let dispatcher = Arc::new(GenerationDispatcher::new(
        pool.clone(),
        TemplateCatalog::builtin(),
        storage,
        Arc::new(TemplateTextGenerator::default()),
        Arc::new(PlaceholderImageGenerator),
    ));
    let pending = dispatcher.pending_task_ids().await?.len();
    tracing::info!(pending, "Generation dispatcher ready");

    // --- Router ---
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let state = AppState::new(pool.clone(), config, dispatcher);
    let app = build_app_router(state);

    // --- Serve ---
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
