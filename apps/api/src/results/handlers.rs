//! Axum route handlers for the results read API.
//!
//! All readers accept an optional `?session=<uuid>` and default to the most
//! recent analysis session.

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::errors::AppError;
use crate::results::pdf::render_report;
use crate::results::timeline::to_pairs;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub session: Option<Uuid>,
}

/// GET /results/full
pub async fn handle_full_results(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Json<Value> {
    let results = state
        .results
        .load_result(query.session)
        .and_then(|r| serde_json::to_value(r).ok())
        .unwrap_or_else(|| json!({}));
    Json(json!({ "ok": true, "results": results }))
}

/// GET /results/timelines
pub async fn handle_timelines(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Json<Value> {
    let timelines = stored_timelines(&state, query.session);
    Json(json!({
        "ok": true,
        "interview_timelines": {
            "posture_timeline": projected(&timelines, "posture_timeline"),
            "eye_timeline": projected(&timelines, "eye_timeline"),
        }
    }))
}

/// GET /results/posture_timeline
pub async fn handle_posture_timeline(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Json<Value> {
    let timelines = stored_timelines(&state, query.session);
    Json(json!({
        "ok": true,
        "posture_timeline": projected(&timelines, "posture_timeline"),
    }))
}

/// GET /results/eye_timeline
pub async fn handle_eye_timeline(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Json<Value> {
    let timelines = stored_timelines(&state, query.session);
    Json(json!({
        "ok": true,
        "eye_timeline": projected(&timelines, "eye_timeline"),
    }))
}

/// GET /results/llm_review
pub async fn handle_llm_review(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Json<Value> {
    let review = state
        .results
        .load_result(query.session)
        .and_then(|r| {
            r.interview_analysis
                .completed()
                .map(|record| record.llm_review.clone())
        })
        .map(Value::String)
        .unwrap_or(Value::Null);
    Json(json!({ "ok": true, "llm_review": review }))
}

/// GET /results/interview/pdf
///
/// Renders the report on demand. With nothing stored yet this returns a
/// JSON error object (404), not a PDF byte stream.
pub async fn handle_interview_pdf(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Result<impl IntoResponse, AppError> {
    let result = state.results.load_result(query.session).ok_or_else(|| {
        AppError::NotFound("No analysis results available yet. Run an analysis first.".to_string())
    })?;
    let timelines = state
        .results
        .load_timelines(Some(result.session_id))
        .unwrap_or_else(|| json!({}));

    let bytes = render_report(&result, &timelines).map_err(AppError::Internal)?;
    Ok(([(header::CONTENT_TYPE, "application/pdf")], bytes))
}

fn stored_timelines(state: &AppState, session: Option<Uuid>) -> Value {
    state
        .results
        .load_timelines(session)
        .unwrap_or_else(|| json!({ "posture_timeline": [], "eye_timeline": [] }))
}

fn projected(timelines: &Value, key: &str) -> Vec<Value> {
    to_pairs(timelines.get(key).unwrap_or(&Value::Null))
}
