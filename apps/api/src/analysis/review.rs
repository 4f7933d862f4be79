//! Recruiter-style LLM review of one interview answer.
//!
//! The model is asked for strict JSON so the category scores are direct
//! field reads. Extraction never fails the analysis: output that is not
//! valid JSON falls back to the legacy marker-split of the report text, and
//! if that fails too the review degrades to zero scores and empty sections
//! with the raw text preserved as `review`.

use serde::{Deserialize, Serialize};

use crate::analysis::voice::VoiceAnalysis;
use crate::llm_client::strip_json_fences;

/// Everything the review prompt needs about one answer.
pub struct ReviewContext<'a> {
    pub prompt_text: &'a str,
    pub prompt_type: &'a str,
    pub prompt_difficulty: &'a str,
    pub good_signals: &'a [String],
    pub red_flags: &'a [String],
    pub transcript: &'a str,
    pub posture_pct: Option<f64>,
    pub eye_pct: Option<f64>,
    pub voice: &'a VoiceAnalysis,
}

/// Parsed review: full text plus category scores and section texts.
/// Score denominators: clarity 25, content 25, professionalism 20,
/// body language 15, vocal delivery 15, total 100.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewBreakdown {
    #[serde(default)]
    pub review: String,
    #[serde(default)]
    pub clarity_score: u32,
    #[serde(default)]
    pub content_score: u32,
    #[serde(default)]
    pub professionalism_score: u32,
    #[serde(default)]
    pub body_language_score: u32,
    #[serde(default)]
    pub vocal_delivery_score: u32,
    #[serde(default)]
    pub total_score: u32,
    #[serde(default)]
    pub doing_well: String,
    #[serde(default)]
    pub must_improve: String,
    #[serde(default)]
    pub habits_to_keep: String,
    #[serde(default)]
    pub action_plan: String,
}

impl ReviewBreakdown {
    /// Parses whatever the model produced, in decreasing order of trust:
    /// strict JSON, then the legacy section-marker format, then a
    /// zero-score shell that still carries the raw text.
    pub fn from_llm_text(raw: &str) -> Self {
        let fenced = strip_json_fences(raw);
        if let Ok(parsed) = serde_json::from_str::<ReviewBreakdown>(fenced) {
            return parsed.sanitized(raw);
        }
        if let Some(parsed) = parse_review_markers(raw) {
            return parsed.sanitized(raw);
        }
        ReviewBreakdown {
            review: raw.to_string(),
            ..Default::default()
        }
    }

    /// Clamps scores to their denominators, recomputes a missing total, and
    /// makes sure the full report text is never lost.
    fn sanitized(mut self, raw: &str) -> Self {
        self.clarity_score = self.clarity_score.min(25);
        self.content_score = self.content_score.min(25);
        self.professionalism_score = self.professionalism_score.min(20);
        self.body_language_score = self.body_language_score.min(15);
        self.vocal_delivery_score = self.vocal_delivery_score.min(15);

        let sum = self.clarity_score
            + self.content_score
            + self.professionalism_score
            + self.body_language_score
            + self.vocal_delivery_score;
        if self.total_score == 0 || self.total_score > 100 {
            self.total_score = sum;
        }

        if self.review.trim().is_empty() {
            self.review = raw.to_string();
        }
        self
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Prompt construction
// ────────────────────────────────────────────────────────────────────────────

pub fn build_review_prompt(ctx: &ReviewContext<'_>) -> String {
    let question = non_empty_or(ctx.prompt_text, "General interview question");
    let question_type = non_empty_or(ctx.prompt_type, "General");
    let difficulty = non_empty_or(ctx.prompt_difficulty, "Unknown");

    let good_signals = if ctx.good_signals.is_empty() {
        "No specific signals provided.".to_string()
    } else {
        bulleted(ctx.good_signals)
    };
    let red_flags = if ctx.red_flags.is_empty() {
        "No specific red flags provided.".to_string()
    } else {
        bulleted(ctx.red_flags)
    };

    let posture = pct_or_na(ctx.posture_pct);
    let eye = pct_or_na(ctx.eye_pct);
    let voice = voice_lines(ctx.voice);

    format!(
        r#"You are a Senior Tech Recruiter with 15 years of experience evaluating candidates.
Evaluate this mock interview and provide detailed, realistic feedback.

--- INTERVIEW QUESTION ---
Question Asked: {question}
Question Type: {question_type}
Difficulty Level: {difficulty}

--- WHAT A GOOD ANSWER LOOKS LIKE ---
{answer_guidance}
{difficulty_guidance}

--- POSITIVE SIGNALS TO LOOK FOR ---
These are things the candidate SHOULD say or demonstrate. If you detect any of these in the transcript, highlight them as strengths:
{good_signals}

--- RED FLAGS TO WATCH FOR ---
These are things the candidate should NEVER say or do for this question. If you detect any of these in the transcript, call them out directly and firmly in the improvements section:
{red_flags}

--- INTERVIEW DATA ---
Transcript: {transcript}
Posture Score: {posture}
Eye Contact Score: {eye}

--- VOICE TONE DATA ---
{voice}

--- SCORING RUBRIC (100 points total) ---
Score each category honestly based on the question type and difficulty.
A 7/10 overall is a GOOD interview. Reserve 9-10 for exceptional candidates.

1. COMMUNICATION CLARITY (25 pts)
- Are answers clear, concise, and well-structured?
- Is vocabulary professional?
- Are filler words (um, uh, like) avoided?

2. CONTENT & SUBSTANCE (25 pts)
- Did the candidate actually answer the question that was asked?
- Are answers specific and detailed enough for the difficulty level?
- Does the candidate use examples or STAR method where appropriate?

3. PROFESSIONALISM (20 pts)
- Is the tone confident but not arrogant?
- Is the language appropriate for a professional setting?

4. BODY LANGUAGE (15 pts)
- Posture above 80% = full marks for posture
- Eye contact above 80% = full marks for eye contact

5. VOCAL DELIVERY (15 pts)
- Judge pitch, tone variation, and speaking rate from the voice tone data above.

--- RESPONSE FORMAT ---
Return ONLY a JSON object with exactly these keys (no markdown, no extra text):
{{
  "review": "the full written report, including specific moments from the transcript",
  "clarity_score": <integer 0-25>,
  "content_score": <integer 0-25>,
  "professionalism_score": <integer 0-20>,
  "body_language_score": <integer 0-15>,
  "vocal_delivery_score": <integer 0-15>,
  "total_score": <integer 0-100>,
  "doing_well": "specific strengths, referencing exact moments from the transcript",
  "must_improve": "direct, actionable improvements with specific examples",
  "habits_to_keep": "specific positive behaviors to continue",
  "action_plan": "1-2 concrete things to practice before the next interview"
}}"#,
        answer_guidance = answer_guidance(question_type),
        difficulty_guidance = difficulty_guidance(difficulty),
        transcript = ctx.transcript,
    )
}

fn answer_guidance(question_type: &str) -> &'static str {
    match question_type.to_lowercase().as_str() {
        "behavioral" | "behavioural" => {
            "For a BEHAVIOURAL question: The candidate should use the STAR method \
             (Situation, Task, Action, Result). Penalize vague answers with no real example."
        }
        "situational" => {
            "For a SITUATIONAL question: The candidate should walk through their thought \
             process clearly, explain what they would do and why."
        }
        "technical" => {
            "For a TECHNICAL question: The candidate should demonstrate knowledge, use \
             correct terminology, and explain their reasoning step by step."
        }
        _ => {
            "For a GENERAL question: The candidate should give a clear, confident, and \
             professional answer."
        }
    }
}

fn difficulty_guidance(difficulty: &str) -> &'static str {
    match difficulty.to_lowercase().as_str() {
        "hard" | "expert" | "master" => {
            "Hard difficulty requires depth, specifics, and structured responses. \
             Penalize surface-level answers harshly."
        }
        "medium" => "Medium difficulty expects some structure and relevant examples.",
        "easy" => "Easy difficulty just needs a clear and confident response.",
        _ => "",
    }
}

fn voice_lines(voice: &VoiceAnalysis) -> String {
    match voice {
        VoiceAnalysis::Metrics(m) => format!(
            "Average Pitch: {} Hz — {}\nTone Variation: {}\nSpeaking Rate: {} — {}",
            m.avg_pitch_hz, m.pitch_feedback, m.tone_feedback, m.speaking_rate, m.rate_feedback
        ),
        VoiceAnalysis::Failed(f) => format!("Voice analysis unavailable: {}", f.error),
    }
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

fn pct_or_na(value: Option<f64>) -> String {
    match value {
        Some(pct) => format!("{pct}%"),
        None => "n/a".to_string(),
    }
}

fn bulleted(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

// ────────────────────────────────────────────────────────────────────────────
// Legacy marker-split fallback
// ────────────────────────────────────────────────────────────────────────────

/// Extracts scores/sections from the historical plain-text report format.
/// Returns `None` when any score marker is missing.
fn parse_review_markers(text: &str) -> Option<ReviewBreakdown> {
    let clarity = score_between(text, "Communication Clarity: ", "/25")?;
    let content = score_between(text, "Content & Substance: ", "/25")?;
    let professionalism = score_between(text, "Professionalism: ", "/20")?;
    let body_language = score_between(text, "Body Language: ", "/15")?;
    let vocal_delivery = score_between(text, "Vocal Delivery: ", "/15")?;
    let total = score_between(text, "TOTAL SCORE: ", "/100")?;

    Some(ReviewBreakdown {
        review: text.to_string(),
        clarity_score: clarity,
        content_score: content,
        professionalism_score: professionalism,
        body_language_score: body_language,
        vocal_delivery_score: vocal_delivery,
        total_score: total,
        doing_well: section_between(text, "WHAT YOU ARE DOING WELL", "WHAT YOU MUST IMPROVE"),
        must_improve: section_between(text, "WHAT YOU MUST IMPROVE", "HABITS TO KEEP"),
        habits_to_keep: section_between(text, "HABITS TO KEEP", "ACTION PLAN FOR NEXT INTERVIEW"),
        action_plan: tail_after(text, "ACTION PLAN FOR NEXT INTERVIEW"),
    })
}

fn score_between(text: &str, start: &str, end: &str) -> Option<u32> {
    let after = &text[text.find(start)? + start.len()..];
    let raw = &after[..after.find(end)?];
    raw.trim().parse().ok()
}

fn section_between(text: &str, start: &str, end: &str) -> String {
    let Some(start_idx) = text.find(start) else {
        return String::new();
    };
    let after = &text[start_idx + start.len()..];
    let body = match after.find(end) {
        Some(end_idx) => &after[..end_idx],
        None => after,
    };
    body.trim_start_matches(|c: char| c == ':' || c == ' ')
        .trim()
        .to_string()
}

fn tail_after(text: &str, start: &str) -> String {
    match text.find(start) {
        Some(idx) => text[idx + start.len()..]
            .trim_start_matches(|c: char| c == ':' || c == ' ')
            .trim()
            .to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::voice::{VoiceAnalysis, VoiceMetrics};

    fn metrics() -> VoiceAnalysis {
        VoiceAnalysis::Metrics(VoiceMetrics {
            avg_pitch_hz: 180.5,
            pitch_variation: 32.0,
            pitch_variation_pct: 17.7,
            speaking_rate: 3.4,
            avg_energy: 0.05,
            energy_variation: 0.01,
            pitch_feedback: "Normal pitch range — good for conversation.".to_string(),
            tone_feedback: "Good pitch variation — your voice sounds natural and engaging."
                .to_string(),
            rate_feedback: "Good speaking rate — easy to follow.".to_string(),
        })
    }

    #[test]
    fn test_json_output_is_a_direct_field_read() {
        let raw = r#"{
            "review": "Solid answer overall.",
            "clarity_score": 20,
            "content_score": 18,
            "professionalism_score": 16,
            "body_language_score": 12,
            "vocal_delivery_score": 11,
            "total_score": 77,
            "doing_well": "Clear structure.",
            "must_improve": "Fewer filler words.",
            "habits_to_keep": "Concrete examples.",
            "action_plan": "Practice STAR."
        }"#;
        let breakdown = ReviewBreakdown::from_llm_text(raw);
        assert_eq!(breakdown.clarity_score, 20);
        assert_eq!(breakdown.total_score, 77);
        assert_eq!(breakdown.doing_well, "Clear structure.");
    }

    #[test]
    fn test_fenced_json_is_accepted() {
        let raw = "```json\n{\"review\": \"ok\", \"clarity_score\": 10, \"total_score\": 10}\n```";
        let breakdown = ReviewBreakdown::from_llm_text(raw);
        assert_eq!(breakdown.clarity_score, 10);
        assert_eq!(breakdown.review, "ok");
    }

    #[test]
    fn test_legacy_marker_format_still_parses() {
        let raw = "\
CATEGORY SCORES:\n\
- Communication Clarity: 21/25\n\
- Content & Substance: 19/25\n\
- Professionalism: 17/20\n\
- Body Language: 13/15\n\
- Vocal Delivery: 10/15\n\
\n\
TOTAL SCORE: 80/100 (8/10)\n\
\n\
WHAT YOU ARE DOING WELL:\n- Strong opening\n\
WHAT YOU MUST IMPROVE:\n- Pacing\n\
HABITS TO KEEP:\n- Eye contact\n\
ACTION PLAN FOR NEXT INTERVIEW:\n- Rehearse twice\n";
        let breakdown = ReviewBreakdown::from_llm_text(raw);
        assert_eq!(breakdown.clarity_score, 21);
        assert_eq!(breakdown.total_score, 80);
        assert_eq!(breakdown.doing_well, "- Strong opening");
        assert_eq!(breakdown.action_plan, "- Rehearse twice");
        assert_eq!(breakdown.review, raw);
    }

    #[test]
    fn test_garbage_output_degrades_to_zero_scores() {
        let raw = "The model went completely off script here.";
        let breakdown = ReviewBreakdown::from_llm_text(raw);
        assert_eq!(breakdown.clarity_score, 0);
        assert_eq!(breakdown.total_score, 0);
        assert!(breakdown.doing_well.is_empty());
        assert_eq!(breakdown.review, raw);
    }

    #[test]
    fn test_sanitize_clamps_and_recomputes_total() {
        let raw = r#"{"review": "x", "clarity_score": 99, "content_score": 10,
            "professionalism_score": 10, "body_language_score": 10,
            "vocal_delivery_score": 10, "total_score": 0}"#;
        let breakdown = ReviewBreakdown::from_llm_text(raw);
        assert_eq!(breakdown.clarity_score, 25);
        assert_eq!(breakdown.total_score, 25 + 10 + 10 + 10 + 10);
    }

    #[test]
    fn test_prompt_mentions_signals_and_metrics() {
        let good = vec!["mentions tradeoffs".to_string()];
        let red = vec!["blames the team".to_string()];
        let voice = metrics();
        let prompt = build_review_prompt(&ReviewContext {
            prompt_text: "Tell me about a hard bug.",
            prompt_type: "behavioral",
            prompt_difficulty: "medium",
            good_signals: &good,
            red_flags: &red,
            transcript: "Well, um, last year...",
            posture_pct: Some(90.0),
            eye_pct: Some(70.0),
            voice: &voice,
        });
        assert!(prompt.contains("mentions tradeoffs"));
        assert!(prompt.contains("blames the team"));
        assert!(prompt.contains("Posture Score: 90%"));
        assert!(prompt.contains("STAR method"));
        assert!(prompt.contains("180.5 Hz"));
    }

    #[test]
    fn test_prompt_handles_missing_vision_and_empty_fields() {
        let voice = VoiceAnalysis::failed("Not enough speech detected", None);
        let prompt = build_review_prompt(&ReviewContext {
            prompt_text: "",
            prompt_type: "",
            prompt_difficulty: "",
            good_signals: &[],
            red_flags: &[],
            transcript: "hello",
            posture_pct: None,
            eye_pct: None,
            voice: &voice,
        });
        assert!(prompt.contains("General interview question"));
        assert!(prompt.contains("Posture Score: n/a"));
        assert!(prompt.contains("No specific signals provided."));
        assert!(prompt.contains("Voice analysis unavailable"));
    }
}
