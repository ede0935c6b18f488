use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use retrieval_pipeline::ask_question;
use serde::Deserialize;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct AskParams {
    question: Option<String>,
}

pub async fn ask(
    State(state): State<ApiState>,
    Query(params): Query<AskParams>,
) -> Result<impl IntoResponse, ApiError> {
    let question = params
        .question
        .ok_or_else(|| ApiError::ValidationError("missing query parameter: question".into()))?;

    let answer = ask_question(state.backend.as_ref(), &question).await?;
    info!(has_answer = answer.has_answer, "Answered question");

    Ok(Json(answer))
}
