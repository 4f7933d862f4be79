//! Result aggregation.
//!
//! Merges the heterogeneous, partially-optional inputs of one analysis call
//! (prompt metadata, vision metrics, summary, timelines, feedback, and the
//! upstream analysis output) into the single canonical per-session record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::analysis::feedback::{normalize_feedback, NormalizedFeedback};
use crate::analysis::voice::VoiceAnalysis;

// ────────────────────────────────────────────────────────────────────────────
// Record shapes
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioMeta {
    pub filename: String,
    pub content_type: String,
    pub bytes: usize,
    pub saved_to: String,
}

/// Upstream analysis output: a completed record, or the error envelope the
/// always-200 policy substitutes when the pipeline fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InterviewAnalysis {
    Completed(Box<AnalysisRecord>),
    Unavailable(AnalysisFailure),
}

impl InterviewAnalysis {
    pub fn unavailable(detail: impl Into<String>) -> Self {
        InterviewAnalysis::Unavailable(AnalysisFailure {
            error: "analysis_unavailable".to_string(),
            detail: detail.into(),
        })
    }

    pub fn completed(&self) -> Option<&AnalysisRecord> {
        match self {
            InterviewAnalysis::Completed(record) => Some(record),
            InterviewAnalysis::Unavailable(_) => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed().is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisFailure {
    pub error: String,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub transcript: String,
    /// The caller's vision metrics, echoed unmodified.
    pub vision_summary: Value,
    pub voice_analysis: VoiceAnalysis,
    pub llm_review: String,
    pub question: String,
    #[serde(rename = "type")]
    pub question_type: String,
    pub difficulty: String,
    pub clarity_score: u32,
    pub content_score: u32,
    pub professionalism_score: u32,
    pub body_language_score: u32,
    pub vocal_delivery_score: u32,
    pub total_score: u32,
    pub doing_well: String,
    pub must_improve: String,
    pub habits_to_keep: String,
    pub action_plan: String,
}

/// The canonical merged record for one analysis call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedResult {
    pub ok: bool,
    pub session_id: Uuid,
    pub prompt_id: String,
    pub prompt_text: String,
    /// Resolved: explicit request field wins over `summary.type`.
    pub prompt_type: String,
    /// Resolved: explicit request field wins over `summary.difficulty`.
    pub prompt_difficulty: String,
    pub audio: AudioMeta,
    pub interview_summary: Value,
    pub interview_timelines: Value,
    pub interview_feedback: NormalizedFeedback,
    pub good_signals: Vec<String>,
    pub red_flags: Vec<String>,
    pub vision_metrics: Value,
    pub interview_analysis: InterviewAnalysis,
    pub created_at: DateTime<Utc>,
}

// ────────────────────────────────────────────────────────────────────────────
// Aggregation
// ────────────────────────────────────────────────────────────────────────────

pub struct AggregationInput {
    pub prompt_id: String,
    pub prompt_text: String,
    pub prompt_type: String,
    pub prompt_difficulty: String,
    pub vision_metrics: Value,
    pub summary: Value,
    pub timelines: Value,
    pub feedback: NormalizedFeedback,
    pub audio: AudioMeta,
    pub analysis: InterviewAnalysis,
}

/// Builds the canonical record. Infallible: whatever shape the inputs are
/// in, an `AggregatedResult` comes out.
pub fn build_result(input: AggregationInput) -> AggregatedResult {
    let prompt_type = resolve_field(&input.prompt_type, &input.summary, "type");
    let prompt_difficulty = resolve_field(&input.prompt_difficulty, &input.summary, "difficulty");
    let (good_signals, red_flags) = canonical_signals(&input.feedback, &input.summary);

    AggregatedResult {
        ok: true,
        session_id: Uuid::new_v4(),
        prompt_id: input.prompt_id,
        prompt_text: input.prompt_text,
        prompt_type,
        prompt_difficulty,
        audio: input.audio,
        interview_summary: input.summary,
        interview_timelines: input.timelines,
        interview_feedback: input.feedback,
        good_signals,
        red_flags,
        vision_metrics: input.vision_metrics,
        interview_analysis: input.analysis,
        created_at: Utc::now(),
    }
}

/// Explicit request field if non-empty, else the summary's value for `key`,
/// else the empty string.
fn resolve_field(explicit: &str, summary: &Value, key: &str) -> String {
    let explicit = explicit.trim();
    if !explicit.is_empty() {
        return explicit.to_string();
    }
    summary
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Canonical good/red-signal source: the normalized feedback payload. The
/// summary's signals (run through the same normalizer) are only a fallback
/// for clients that never send a feedback field.
pub fn canonical_signals(
    feedback: &NormalizedFeedback,
    summary: &Value,
) -> (Vec<String>, Vec<String>) {
    if !feedback.is_empty() {
        return (feedback.good_signals.clone(), feedback.red_flags.clone());
    }
    let from_summary = normalize_feedback(summary);
    (from_summary.good_signals, from_summary.red_flags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn audio() -> AudioMeta {
        AudioMeta {
            filename: "clip.webm".to_string(),
            content_type: "audio/webm".to_string(),
            bytes: 1024,
            saved_to: "uploads/clip.webm".to_string(),
        }
    }

    fn input() -> AggregationInput {
        AggregationInput {
            prompt_id: "p1".to_string(),
            prompt_text: "Tell me about yourself.".to_string(),
            prompt_type: String::new(),
            prompt_difficulty: String::new(),
            vision_metrics: json!({"postureGoodPct": 90, "eyeGoodPct": 70}),
            summary: json!({}),
            timelines: json!({}),
            feedback: NormalizedFeedback::default(),
            audio: audio(),
            analysis: InterviewAnalysis::unavailable("no key"),
        }
    }

    #[test]
    fn test_summary_type_used_when_explicit_empty() {
        let mut i = input();
        i.summary = json!({"type": "technical", "difficulty": "hard"});
        let result = build_result(i);
        assert_eq!(result.prompt_type, "technical");
        assert_eq!(result.prompt_difficulty, "hard");
    }

    #[test]
    fn test_explicit_type_wins_over_summary() {
        let mut i = input();
        i.prompt_type = "general".to_string();
        i.summary = json!({"type": "technical"});
        let result = build_result(i);
        assert_eq!(result.prompt_type, "general");
    }

    #[test]
    fn test_both_missing_resolves_to_empty_string() {
        let result = build_result(input());
        assert_eq!(result.prompt_type, "");
        assert_eq!(result.prompt_difficulty, "");
    }

    #[test]
    fn test_non_string_summary_type_ignored() {
        let mut i = input();
        i.summary = json!({"type": 7});
        assert_eq!(build_result(i).prompt_type, "");
    }

    #[test]
    fn test_feedback_is_canonical_signal_source() {
        let mut i = input();
        i.feedback = NormalizedFeedback {
            good_signals: vec!["from feedback".to_string()],
            red_flags: vec![],
        };
        i.summary = json!({"good_signals": ["from summary"]});
        let result = build_result(i);
        assert_eq!(result.good_signals, vec!["from feedback"]);
    }

    #[test]
    fn test_summary_signals_used_when_feedback_empty() {
        let mut i = input();
        i.summary = json!({"good_signals": ["from summary"], "redFlags": ["camel flag"]});
        let result = build_result(i);
        assert_eq!(result.good_signals, vec!["from summary"]);
        assert_eq!(result.red_flags, vec!["camel flag"]);
    }

    #[test]
    fn test_failed_analysis_still_builds_a_result() {
        let result = build_result(input());
        assert!(result.ok);
        match &result.interview_analysis {
            InterviewAnalysis::Unavailable(f) => {
                assert_eq!(f.error, "analysis_unavailable");
                assert_eq!(f.detail, "no key");
            }
            InterviewAnalysis::Completed(_) => panic!("expected the error envelope"),
        }
    }

    #[test]
    fn test_vision_metrics_pass_through_unmodified() {
        let result = build_result(input());
        assert_eq!(
            result.vision_metrics,
            json!({"postureGoodPct": 90, "eyeGoodPct": 70})
        );
    }

    #[test]
    fn test_error_envelope_serializes_flat() {
        let analysis = InterviewAnalysis::unavailable("detail text");
        let value = serde_json::to_value(&analysis).unwrap();
        assert_eq!(
            value,
            json!({"error": "analysis_unavailable", "detail": "detail text"})
        );
    }
}
