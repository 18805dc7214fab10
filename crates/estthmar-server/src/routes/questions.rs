//! Feasibility question generation.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use tracing::info;

use super::{AppError, QueryRequest};
use crate::state::AppState;
use estthmar_chat::{extract_questions, Question};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/ai/", post(generate_questions))
}

/// POST /api/ai/: ask the model for feasibility questions about a project.
async fn generate_questions(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<Vec<Question>>, AppError> {
    let prompt = state.prompts.questions.render(&req.query);
    let response = state.llm.generate(&prompt).await?;

    let questions = extract_questions(&response);
    info!(
        "Generated {} questions with {} ({} chars of model output)",
        questions.len(),
        state.llm.model(),
        response.len()
    );
    Ok(Json(questions))
}
