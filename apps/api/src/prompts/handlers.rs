//! Axum route handlers for the prompt API.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::prompts::job_ad::{generate_prompt_from_job_ad, resolve_source, JobAdRequest};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PromptFilterQuery {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub difficulty: String,
}

/// GET /prompt/all?type=&difficulty=
///
/// Unknown filter values normalize to `all`; an empty match is a valid
/// (count 0) response, not an error.
pub async fn handle_all_prompts(
    State(state): State<AppState>,
    Query(query): Query<PromptFilterQuery>,
) -> Json<Value> {
    let prompts = state.prompts.filtered(&query.kind, &query.difficulty);
    Json(json!({ "count": prompts.len(), "prompts": prompts }))
}

/// GET /prompt/random?type=&difficulty=
pub async fn handle_random_prompt(
    State(state): State<AppState>,
    Query(query): Query<PromptFilterQuery>,
) -> Result<Json<Value>, AppError> {
    let prompt = state
        .prompts
        .random(&query.kind, &query.difficulty)
        .ok_or_else(|| {
            AppError::NotFound("No prompts match the requested filters".to_string())
        })?;
    Ok(Json(json!({ "prompt": prompt })))
}

/// POST /prompt/from-job-ad
///
/// Accepts `{url}` or `{text}` (plus optional title and filters), extracts
/// the ad's visible text, and synthesizes one practice prompt via the LLM.
pub async fn handle_from_job_ad(
    State(state): State<AppState>,
    Json(request): Json<JobAdRequest>,
) -> Result<Json<Value>, AppError> {
    let source = resolve_source(&request).await?;
    let generated = generate_prompt_from_job_ad(
        &state.groq,
        &state.config.groq_model_fallbacks,
        &request,
        &source,
    )
    .await?;
    Ok(Json(json!({ "prompt": generated })))
}
