//! Shared application state.

use std::sync::Arc;

use estthmar_chat::{Prompts, TextGenerator};
use estthmar_core::EstthmarConfig;
use estthmar_infer::EmbedderBackend;
use estthmar_store::SqliteStore;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: EstthmarConfig,
    pub store: SqliteStore,
    pub embedder: Arc<dyn EmbedderBackend>,
    pub llm: Arc<dyn TextGenerator>,
    pub prompts: Prompts,
}

impl AppState {
    pub fn new(
        config: EstthmarConfig,
        store: SqliteStore,
        embedder: Arc<dyn EmbedderBackend>,
        llm: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            config,
            store,
            embedder,
            llm,
            prompts: Prompts::default(),
        }
    }
}
