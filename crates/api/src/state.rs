use std::sync::Arc;

use studio_pipeline::{ConversationService, GenerationDispatcher};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything is behind `Arc` or already `Clone`.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: studio_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Generation dispatcher and task queue.
    pub dispatcher: Arc<GenerationDispatcher>,
    /// Chat sessions driving the dispatcher.
    pub conversation: Arc<ConversationService>,
}

impl AppState {
    /// Wire the services together over one pool.
    pub fn new(
        pool: studio_db::DbPool,
        config: ServerConfig,
        dispatcher: Arc<GenerationDispatcher>,
    ) -> Self {
        let conversation = Arc::new(ConversationService::new(
            pool.clone(),
            Arc::clone(&dispatcher),
            config.chat_max_message_chars,
        ));
        Self {
            pool,
            config: Arc::new(config),
            dispatcher,
            conversation,
        }
    }
}
