pub mod health;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::analysis::handlers as analysis;
use crate::prompts::handlers as prompts;
use crate::results::handlers as results;
use crate::state::AppState;

/// Uploads are buffered fully in memory before processing; cap them well
/// above a typical few-minute recording.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::root_handler))
        .route("/health", get(health::health_handler))
        // Analysis
        .route("/analyze", post(analysis::handle_analyze))
        // Results
        .route("/results/full", get(results::handle_full_results))
        .route("/results/timelines", get(results::handle_timelines))
        .route(
            "/results/posture_timeline",
            get(results::handle_posture_timeline),
        )
        .route("/results/eye_timeline", get(results::handle_eye_timeline))
        .route("/results/llm_review", get(results::handle_llm_review))
        .route("/results/interview/pdf", get(results::handle_interview_pdf))
        // Prompts
        .route("/prompt/all", get(prompts::handle_all_prompts))
        .route("/prompt/random", get(prompts::handle_random_prompt))
        .route("/prompt/from-job-ad", post(prompts::handle_from_job_ad))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}
