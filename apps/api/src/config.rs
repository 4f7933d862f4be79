use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
///
/// Nothing here is strictly required at startup: the service boots without
/// any AI credentials and degrades to `analysis_unavailable` payloads, the
/// same way it tolerates a missing ffmpeg binary.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,

    /// OpenAI-compatible endpoint used for transcription + the review LLM.
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub whisper_model: String,

    /// Groq-hosted endpoint used for job-ad prompt generation.
    pub groq_api_key: Option<String>,
    pub groq_base_url: String,
    pub groq_model: String,
    pub groq_model_fallbacks: Vec<String>,

    /// Explicit path to an ffmpeg binary; falls back to PATH lookup.
    pub ffmpeg_path: Option<String>,
    pub upload_dir: String,
    pub prompts_path: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),

            openai_api_key: optional_env("OPENAI_API_KEY"),
            openai_base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            openai_model: std::env::var("OPENAI_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            whisper_model: std::env::var("OPENAI_WHISPER_MODEL")
                .unwrap_or_else(|_| "whisper-1".to_string()),

            groq_api_key: optional_env("GROQ_API_KEY"),
            groq_base_url: std::env::var("GROQ_BASE_URL")
                .unwrap_or_else(|_| "https://api.groq.com/openai/v1".to_string()),
            groq_model: std::env::var("GROQ_MODEL")
                .unwrap_or_else(|_| "llama-3.3-70b-versatile".to_string()),
            groq_model_fallbacks: csv_env("GROQ_MODEL_FALLBACKS"),

            ffmpeg_path: optional_env("FFMPEG_PATH"),
            upload_dir: std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()),
            prompts_path: std::env::var("PROMPTS_PATH")
                .unwrap_or_else(|_| "prompts.json".to_string()),
        })
    }
}

/// Returns the variable's value, treating empty/whitespace as unset.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parses a comma-separated variable into a list, dropping blanks.
fn csv_env(key: &str) -> Vec<String> {
    std::env::var(key)
        .unwrap_or_default()
        .split(',')
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}
