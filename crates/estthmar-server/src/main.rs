//! Estthmar: feasibility-study assistant backend.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use estthmar_chat::{LlmClient, LlmConfig};
use estthmar_core::EstthmarConfig;
use estthmar_server::{build_router, AppState};
use estthmar_store::SqliteStore;

fn resolve_data_dir() -> PathBuf {
    std::env::var("ESTTHMAR_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let exe_dir = std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|p| p.to_path_buf()));
            if let Some(dir) = exe_dir {
                let parent_data = dir.join("../data");
                if parent_data.exists() {
                    return parent_data;
                }
            }
            PathBuf::from("data")
        })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let data_dir = resolve_data_dir();
    info!("Data directory: {}", data_dir.display());

    let config = EstthmarConfig::from_env(&data_dir)?;
    let port = config.port;

    let store = SqliteStore::open(&config.data_paths.vectordb, config.embedding.dimension)
        .map_err(|e| anyhow::anyhow!("Failed to open vector index: {}", e))?;

    // The Ollama embedder wraps a blocking HTTP client, which must be built
    // off the async runtime.
    let embedding_config = config.embedding.clone();
    let model_dir = config.data_paths.models.clone();
    let embedder = tokio::task::spawn_blocking(move || {
        estthmar_infer::create_embedder(&embedding_config, &model_dir)
    })
    .await??;

    let llm = LlmClient::new(LlmConfig::from_env()?)?;

    let state = Arc::new(AppState::new(config, store, embedder, Arc::new(llm)));
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Estthmar server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
