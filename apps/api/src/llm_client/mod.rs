/// LLM Client — the single point of entry for all AI provider calls.
///
/// ARCHITECTURAL RULE: No other module may talk to an AI API directly.
/// All chat and transcription traffic MUST go through this module.
///
/// The client speaks the OpenAI-compatible surface (chat completions +
/// audio transcriptions), so the same type serves both the OpenAI endpoint
/// and the Groq endpoint; only `base_url`, key, and model differ.
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

const MAX_RETRIES: u32 = 3;
const REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("No API key configured for this endpoint")]
    MissingApiKey,
}

/// One chat call. `json_mode` requests `response_format: json_object`,
/// which some models reject; callers that need it should be prepared to
/// retry without it (see the job-ad generator).
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatOptions<'a> {
    pub system: Option<&'a str>,
    pub temperature: Option<f32>,
    pub json_mode: bool,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// An OpenAI-compatible endpoint binding (base URL + key + default model).
/// Wraps the provider with retry logic and structured-output helpers.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    default_model: String,
}

impl LlmClient {
    pub fn new(base_url: String, api_key: Option<String>, default_model: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            default_model,
        }
    }

    /// Whether a key is present. When false every call returns
    /// `LlmError::MissingApiKey` without touching the network.
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    fn key(&self) -> Result<&str, LlmError> {
        self.api_key.as_deref().ok_or(LlmError::MissingApiKey)
    }

    /// Makes a chat-completion call and returns the assistant text.
    /// Retries on 429 (rate limit) and 5xx errors with exponential backoff.
    pub async fn chat(
        &self,
        model: &str,
        prompt: &str,
        opts: ChatOptions<'_>,
    ) -> Result<String, LlmError> {
        let api_key = self.key()?.to_string();

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = opts.system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        let request_body = ChatCompletionRequest {
            model,
            messages,
            temperature: opts.temperature,
            response_format: opts.json_mode.then_some(ResponseFormat {
                format_type: "json_object",
            }),
        };

        let url = format!("{}/chat/completions", self.base_url);
        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&url)
                .bearer_auth(&api_key)
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let completion: ChatCompletionResponse = response.json().await?;

            if let Some(usage) = &completion.usage {
                debug!(
                    "LLM call succeeded: prompt_tokens={:?}, completion_tokens={:?}",
                    usage.prompt_tokens, usage.completion_tokens
                );
            }

            return completion
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .filter(|c| !c.trim().is_empty())
                .ok_or(LlmError::EmptyContent);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }

    /// Convenience method that calls the LLM and deserializes the text
    /// response as JSON. The prompt must instruct the model to return JSON.
    pub async fn chat_json<T: DeserializeOwned>(
        &self,
        model: &str,
        prompt: &str,
        opts: ChatOptions<'_>,
    ) -> Result<T, LlmError> {
        let text = self.chat(model, prompt, opts).await?;

        // Strip markdown code fences if the model wraps JSON in them
        let text = strip_json_fences(&text);

        serde_json::from_str(text).map_err(LlmError::Parse)
    }

    /// Transcribes audio bytes via the `audio/transcriptions` endpoint.
    /// `response_format: text` keeps the body a bare transcript string.
    pub async fn transcribe(
        &self,
        audio: Vec<u8>,
        filename: &str,
        model: &str,
        prompt: &str,
    ) -> Result<String, LlmError> {
        let api_key = self.key()?.to_string();

        let mime = mime_for_filename(filename);
        let file_part = reqwest::multipart::Part::bytes(audio)
            .file_name(filename.to_string())
            .mime_str(mime)?;

        let form = reqwest::multipart::Form::new()
            .text("model", model.to_string())
            .text("prompt", prompt.to_string())
            .text("response_format", "text")
            .part("file", file_part);

        let url = format!("{}/audio/transcriptions", self.base_url);
        debug!(model = %model, "Sending audio for transcription");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let transcript = response.text().await?;
        debug!(chars = transcript.len(), "Transcription completed");
        Ok(transcript.trim().to_string())
    }
}

/// Maps an upload filename to the MIME type the transcription endpoint
/// expects. Unknown extensions fall back to webm, the browser default.
fn mime_for_filename(filename: &str) -> &'static str {
    match filename.rsplit('.').next().map(str::to_ascii_lowercase) {
        Some(ext) if ext == "wav" => "audio/wav",
        Some(ext) if ext == "mp3" => "audio/mpeg",
        Some(ext) if ext == "m4a" => "audio/mp4",
        Some(ext) if ext == "ogg" => "audio/ogg",
        _ => "audio/webm",
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}
