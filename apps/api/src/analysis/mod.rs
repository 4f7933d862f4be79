//! The interview analysis pipeline.
//!
//! `/analyze` hands one session's inputs to an [`InterviewAnalyzer`]; the
//! production [`LiveAnalyzer`] runs transcription, voice metrics, and the
//! LLM review in order. The pipeline never returns an error to the handler:
//! every failure collapses into the `analysis_unavailable` envelope so the
//! endpoint can keep its always-200 contract.

pub mod aggregate;
pub mod coerce;
pub mod feedback;
pub mod handlers;
pub mod review;
pub mod voice;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use crate::analysis::aggregate::{AnalysisRecord, InterviewAnalysis};
use crate::analysis::review::{build_review_prompt, ReviewBreakdown, ReviewContext};
use crate::analysis::voice::analyze_voice;
use crate::config::Config;
use crate::llm_client::prompts::{JSON_ONLY_SYSTEM, TRANSCRIPTION_PROMPT};
use crate::llm_client::{ChatOptions, LlmClient, LlmError};

/// Everything `/analyze` hands the pipeline for one session.
pub struct AnalysisInput {
    pub audio: Vec<u8>,
    pub audio_filename: String,
    pub vision_metrics: Value,
    pub prompt_id: String,
    pub prompt_text: String,
    pub prompt_type: String,
    pub prompt_difficulty: String,
    pub good_signals: Vec<String>,
    pub red_flags: Vec<String>,
}

/// Pluggable analysis backend, carried in `AppState` as
/// `Arc<dyn InterviewAnalyzer>` so tests can swap in a stub.
#[async_trait]
pub trait InterviewAnalyzer: Send + Sync {
    async fn analyze(&self, input: AnalysisInput) -> InterviewAnalysis;
}

/// Production pipeline: transcribe → voice metrics → LLM review.
pub struct LiveAnalyzer {
    llm: LlmClient,
    chat_model: String,
    whisper_model: String,
    ffmpeg_path: Option<String>,
}

impl LiveAnalyzer {
    pub fn new(llm: LlmClient, config: &Config) -> Self {
        Self {
            llm,
            chat_model: config.openai_model.clone(),
            whisper_model: config.whisper_model.clone(),
            ffmpeg_path: config.ffmpeg_path.clone(),
        }
    }

    /// Requests the review in JSON mode; endpoints that reject
    /// `response_format` get one plain retry.
    async fn request_review(&self, prompt: &str) -> Result<String, LlmError> {
        let json_opts = ChatOptions {
            system: Some(JSON_ONLY_SYSTEM),
            json_mode: true,
            temperature: None,
        };
        match self.llm.chat(&self.chat_model, prompt, json_opts).await {
            Err(LlmError::Api { status: 400, .. }) => {
                warn!("review endpoint rejected json_mode; retrying without response_format");
                self.llm
                    .chat(
                        &self.chat_model,
                        prompt,
                        ChatOptions {
                            system: Some(JSON_ONLY_SYSTEM),
                            json_mode: false,
                            temperature: None,
                        },
                    )
                    .await
            }
            other => other,
        }
    }
}

#[async_trait]
impl InterviewAnalyzer for LiveAnalyzer {
    async fn analyze(&self, input: AnalysisInput) -> InterviewAnalysis {
        if !self.llm.is_configured() {
            return InterviewAnalysis::unavailable("Missing OPENAI_API_KEY.");
        }

        let transcript = match self
            .llm
            .transcribe(
                input.audio.clone(),
                &input.audio_filename,
                &self.whisper_model,
                TRANSCRIPTION_PROMPT,
            )
            .await
        {
            Ok(transcript) => transcript,
            Err(e) => {
                return InterviewAnalysis::unavailable(format!("Transcription failed: {e}"));
            }
        };

        // Voice analysis is self-degrading; its failures ride along inside
        // the record instead of aborting the session.
        let voice = analyze_voice(input.audio, self.ffmpeg_path.as_deref()).await;

        let posture_pct = input
            .vision_metrics
            .get("postureGoodPct")
            .and_then(Value::as_f64);
        let eye_pct = input.vision_metrics.get("eyeGoodPct").and_then(Value::as_f64);

        let prompt = build_review_prompt(&ReviewContext {
            prompt_text: &input.prompt_text,
            prompt_type: &input.prompt_type,
            prompt_difficulty: &input.prompt_difficulty,
            good_signals: &input.good_signals,
            red_flags: &input.red_flags,
            transcript: &transcript,
            posture_pct,
            eye_pct,
            voice: &voice,
        });

        let raw_review = match self.request_review(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                return InterviewAnalysis::unavailable(format!("Review generation failed: {e}"));
            }
        };
        let breakdown = ReviewBreakdown::from_llm_text(&raw_review);

        info!(
            total_score = breakdown.total_score,
            transcript_chars = transcript.len(),
            "interview analysis complete"
        );

        InterviewAnalysis::Completed(Box::new(AnalysisRecord {
            transcript,
            vision_summary: input.vision_metrics,
            voice_analysis: voice,
            llm_review: breakdown.review,
            question: input.prompt_text,
            question_type: input.prompt_type,
            difficulty: input.prompt_difficulty,
            clarity_score: breakdown.clarity_score,
            content_score: breakdown.content_score,
            professionalism_score: breakdown.professionalism_score,
            body_language_score: breakdown.body_language_score,
            vocal_delivery_score: breakdown.vocal_delivery_score,
            total_score: breakdown.total_score,
            doing_well: breakdown.doing_well,
            must_improve: breakdown.must_improve,
            habits_to_keep: breakdown.habits_to_keep,
            action_plan: breakdown.action_plan,
        }))
    }
}
