// Shared prompt constants.
// Each service that needs LLM calls defines its own prompts alongside it;
// this file holds cross-cutting fragments.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Prompt sent with every transcription request. Filler words matter to the
/// downstream clarity scoring, so the transcript must keep them.
pub const TRANSCRIPTION_PROMPT: &str = "Transcribe this interview audio clearly and accurately. \
    Focus on capturing the candidate's words verbatim, including \
    filler words and hesitations, as these are important for analysis.";
