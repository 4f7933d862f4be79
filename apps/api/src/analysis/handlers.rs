//! Axum route handler for `POST /analyze`.

use std::path::Path;

use axum::extract::{Multipart, State};
use axum::Json;
use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::aggregate::{
    build_result, canonical_signals, AggregatedResult, AggregationInput, AudioMeta,
};
use crate::analysis::coerce::parse_json_field;
use crate::analysis::feedback::normalize_feedback;
use crate::analysis::AnalysisInput;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    #[serde(flatten)]
    pub result: AggregatedResult,
    pub message: String,
}

#[derive(Default)]
struct AnalyzeForm {
    audio: Option<(String, String, Bytes)>,
    prompt_id: String,
    prompt_text: String,
    prompt_type: String,
    prompt_difficulty: String,
    vision_metrics: String,
    interview_summary: String,
    interview_timelines: String,
    interview_feedback: String,
}

/// POST /analyze
///
/// Multipart form: `audio` (required binary) plus the prompt metadata and
/// JSON-encoded metric fields. Returns 200 with a best-effort payload even
/// when the AI analysis fails internally; only a missing audio field or an
/// unreadable request is a caller error.
pub async fn handle_analyze(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let form = read_form(&mut multipart).await?;

    let (filename, content_type, audio_bytes) = form
        .audio
        .ok_or_else(|| AppError::Validation("audio file is required".to_string()))?;

    // Every JSON-ish form field goes through the same coercion contract.
    let vision_metrics = parse_json_field(&form.vision_metrics);
    let summary = parse_json_field(&form.interview_summary);
    let timelines = parse_json_field(&form.interview_timelines);
    let feedback = normalize_feedback(&parse_json_field(&form.interview_feedback));

    let saved_to = save_upload(&state.config.upload_dir, &filename, &audio_bytes)
        .await
        .map_err(AppError::Internal)?;

    info!(
        filename = %filename,
        content_type = %content_type,
        bytes = audio_bytes.len(),
        saved_to = %saved_to,
        "received audio upload"
    );

    let (good_signals, red_flags) = canonical_signals(&feedback, &summary);

    let analysis = state
        .analyzer
        .analyze(AnalysisInput {
            audio: audio_bytes.to_vec(),
            audio_filename: filename.clone(),
            vision_metrics: vision_metrics.clone(),
            prompt_id: form.prompt_id.clone(),
            prompt_text: form.prompt_text.clone(),
            prompt_type: form.prompt_type.clone(),
            prompt_difficulty: form.prompt_difficulty.clone(),
            good_signals,
            red_flags,
        })
        .await;

    let result = build_result(AggregationInput {
        prompt_id: form.prompt_id,
        prompt_text: form.prompt_text,
        prompt_type: form.prompt_type,
        prompt_difficulty: form.prompt_difficulty,
        vision_metrics,
        summary,
        timelines,
        feedback,
        audio: AudioMeta {
            filename,
            content_type,
            bytes: audio_bytes.len(),
            saved_to,
        },
        analysis,
    });

    // Only a completed analysis replaces the stored records; a failed one
    // leaves the previous session current.
    if result.interview_analysis.is_completed() {
        state.results.store_result(result.clone());
        state
            .results
            .store_timelines(result.session_id, result.interview_timelines.clone());
    } else {
        warn!(
            session_id = %result.session_id,
            "analysis unavailable; previous stored results remain current"
        );
    }

    Ok(Json(AnalyzeResponse {
        result,
        message: "Received audio + metrics. Analysis attached.".to_string(),
    }))
}

async fn read_form(multipart: &mut Multipart) -> Result<AnalyzeForm, AppError> {
    let mut form = AnalyzeForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read multipart: {e}")))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == "audio" {
            let filename = field.file_name().unwrap_or("audio.webm").to_string();
            let content_type = field.content_type().unwrap_or("").to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("Failed to read audio field: {e}")))?;
            form.audio = Some((filename, content_type, data));
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read field '{name}': {e}")))?;
        match name.as_str() {
            "prompt_id" => form.prompt_id = value,
            "prompt_text" => form.prompt_text = value,
            "prompt_type" => form.prompt_type = value,
            "prompt_difficulty" => form.prompt_difficulty = value,
            "vision_metrics" => form.vision_metrics = value,
            "interview_summary" => form.interview_summary = value,
            "interview_timelines" => form.interview_timelines = value,
            "interview_feedback" => form.interview_feedback = value,
            other => warn!(field = %other, "ignoring unknown form field"),
        }
    }

    Ok(form)
}

/// Persists the upload under the configured directory and returns the path.
/// Filenames are prefixed with a timestamp and a short unique id so repeated
/// takes never collide.
async fn save_upload(dir: &str, original_filename: &str, bytes: &[u8]) -> anyhow::Result<String> {
    tokio::fs::create_dir_all(dir).await?;

    let safe_name = Path::new(original_filename)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("audio.webm");
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let unique = Uuid::new_v4().simple().to_string();
    let output_path = Path::new(dir).join(format!("{timestamp}_{}_{safe_name}", &unique[..8]));

    tokio::fs::write(&output_path, bytes).await?;
    Ok(output_path.to_string_lossy().into_owned())
}
