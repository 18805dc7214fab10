//! Retrieval-augmented answering over the uploaded documents.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use tracing::{debug, info};

use super::{run_blocking, AppError, QueryRequest};
use crate::state::AppState;

/// Separator between retrieved chunks in the prompt context.
const CONTEXT_SEPARATOR: &str = "\n\n";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/ask_pdf/", post(ask_pdf))
}

#[derive(Debug, Serialize)]
pub struct Source {
    pub source: String,
    pub page_content: String,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub sources: Vec<Source>,
}

/// POST /api/ask_pdf/: retrieve matching chunks and let the model answer.
///
/// The retrieved chunks fill the feasibility-question template; the query
/// itself only drives retrieval.
async fn ask_pdf(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<AskResponse>, AppError> {
    let retrieval = state.config.retrieval;
    let search_state = state.clone();
    let hits = run_blocking(move || {
        let query = search_state.embedder.embed(&req.query)?;
        search_state.store.similarity_search(
            &query.to_vec(),
            retrieval.top_k,
            retrieval.score_threshold,
        )
    })
    .await?;
    debug!("Retrieved {} chunks", hits.len());

    let context = hits
        .iter()
        .map(|h| h.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR);
    let prompt = state.prompts.questions.render(&context);
    let answer = state.llm.generate(&prompt).await?;

    let sources: Vec<Source> = hits
        .into_iter()
        .map(|hit| {
            let source = hit.source().unwrap_or_default().to_string();
            Source {
                source,
                page_content: hit.text,
            }
        })
        .collect();

    info!("Answered query from {} sources", sources.len());
    Ok(Json(AskResponse { answer, sources }))
}
