//! Stats and health routes.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use super::AppError;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stats", get(get_stats))
        .route("/health", get(health))
}

/// GET /api/stats: index statistics and active models.
async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store_stats = state.store.get_stats()?;
    let uploads = count_files_in_dir(&state.config.data_paths.documents);

    Ok(Json(serde_json::json!({
        "documents": store_stats.total_documents,
        "chunks": store_stats.total_chunks,
        "embeddings": store_stats.embeddings_stored,
        "embeddingDimension": store_stats.embedding_dimension,
        "dbSizeMb": store_stats.db_size_mb,
        "matrixRows": store_stats.matrix_rows,
        "uploads": uploads,
        "embedder": state.embedder.name(),
        "llmModel": state.llm.model(),
    })))
}

/// GET /api/health
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

fn count_files_in_dir(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
                .count()
        })
        .unwrap_or(0)
}
