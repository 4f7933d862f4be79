//! Job-ad → interview prompt generation.
//!
//! Takes a job-ad URL (fetched and reduced to visible text) or pasted text,
//! and asks the Groq-hosted LLM to synthesize one role-specific practice
//! prompt. Unlike the analysis pipeline, failures here surface as real HTTP
//! errors: the caller asked for a prompt and there is no partial payload
//! worth returning.

use reqwest::header;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::llm_client::{strip_json_fences, ChatOptions, LlmClient};
use crate::prompts::store::{normalize_difficulty, normalize_prompt_type, Prompt};

/// Minimum visible text for a fetched page to count as a usable job ad.
const MIN_EXTRACTED_CHARS: usize = 200;
/// Minimum length for pasted text.
const MIN_PASTED_CHARS: usize = 40;
/// The LLM prompt only carries this much of the ad.
const MAX_JOB_TEXT_CHARS: usize = 10_000;
const FETCH_TIMEOUT_SECS: u64 = 20;

const BUILTIN_FALLBACK_MODELS: [&str; 3] = [
    "llama-3.3-70b-versatile",
    "llama-3.1-70b-versatile",
    "mixtral-8x7b-32768",
];

const JOB_AD_SYSTEM: &str = "You generate one high-quality interview practice question from a \
    job advertisement. Return strict JSON only, no markdown. Keep the question realistic and \
    role-specific.";

const DEFAULT_GOOD_SIGNALS: [&str; 2] = [
    "References responsibilities and requirements from the job ad",
    "Explains tradeoffs and decisions clearly",
];
const DEFAULT_RED_FLAGS: [&str; 2] = [
    "Generic answer not tied to the posted role",
    "No clear rationale or prioritization",
];

#[derive(Debug, Deserialize)]
pub struct JobAdRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub prompt_type: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
}

/// A generated prompt plus its provenance.
#[derive(Debug, Serialize)]
pub struct GeneratedPrompt {
    #[serde(flatten)]
    pub prompt: Prompt,
    pub source: String,
    pub job_ad_url: String,
    pub job_ad_title: String,
    pub model: String,
}

/// The resolved job-ad material handed to the generator.
pub struct JobAdSource {
    pub text: String,
    pub url: String,
    pub title: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Source resolution (fetch or passthrough)
// ────────────────────────────────────────────────────────────────────────────

pub async fn resolve_source(request: &JobAdRequest) -> Result<JobAdSource, AppError> {
    if let Some(text) = request.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        if text.chars().count() < MIN_PASTED_CHARS {
            return Err(AppError::UnprocessableEntity(format!(
                "pasted job ad text is too short ({} chars, need at least {MIN_PASTED_CHARS})",
                text.chars().count()
            )));
        }
        return Ok(JobAdSource {
            text: text.to_string(),
            url: request.url.clone().unwrap_or_default(),
            title: request.title.clone().unwrap_or_default(),
        });
    }

    let Some(url) = request.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) else {
        return Err(AppError::Validation(
            "either 'url' or 'text' is required".to_string(),
        ));
    };
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(AppError::Validation(
            "job ad url must start with http:// or https://".to_string(),
        ));
    }

    let (page_text, page_title) = fetch_job_ad(url).await?;
    if page_text.chars().count() < MIN_EXTRACTED_CHARS {
        return Err(AppError::UnprocessableEntity(format!(
            "extracted too little text from the job ad page ({} chars, need at least \
             {MIN_EXTRACTED_CHARS})",
            page_text.chars().count()
        )));
    }

    Ok(JobAdSource {
        text: page_text,
        url: url.to_string(),
        title: request.title.clone().filter(|t| !t.is_empty()).unwrap_or(page_title),
    })
}

async fn fetch_job_ad(url: &str) -> Result<(String, String), AppError> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(FETCH_TIMEOUT_SECS))
        .build()
        .map_err(|e| AppError::Internal(e.into()))?;

    let response = client
        .get(url)
        .header(header::USER_AGENT, "interview-coach-api/0.1")
        .send()
        .await
        .map_err(|e| AppError::UpstreamFetch(format!("failed to fetch job ad: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(AppError::UpstreamFetch(format!(
            "job ad url returned HTTP {status}"
        )));
    }

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    if !content_type.contains("text/html") && !content_type.contains("text/plain") {
        return Err(AppError::UnprocessableEntity(format!(
            "job ad url did not return a text page (content-type: {content_type})"
        )));
    }

    let body = response
        .text()
        .await
        .map_err(|e| AppError::UpstreamFetch(format!("failed to read job ad body: {e}")))?;

    if content_type.contains("text/plain") {
        return Ok((collapse_whitespace(&body), String::new()));
    }

    let document = Html::parse_document(&body);
    Ok((extract_visible_text(&document), extract_title(&document)))
}

/// Visible page text: everything except script/style/noscript/template
/// subtrees, whitespace-collapsed, in document order.
fn extract_visible_text(document: &Html) -> String {
    let mut out = String::new();
    let mut stack = vec![document.root_element()];
    while let Some(element) = stack.pop() {
        if matches!(
            element.value().name(),
            "script" | "style" | "noscript" | "template"
        ) {
            continue;
        }
        let children: Vec<_> = element.children().collect();
        for child in children.into_iter().rev() {
            if let Some(el) = ElementRef::wrap(child) {
                stack.push(el);
            } else if let Some(text) = child.value().as_text() {
                out.push_str(text);
                out.push(' ');
            }
        }
    }
    collapse_whitespace(&out)
}

fn extract_title(document: &Html) -> String {
    Selector::parse("title")
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .map(|el| el.text().collect::<String>())
        })
        .map(|t| collapse_whitespace(&t))
        .unwrap_or_default()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ────────────────────────────────────────────────────────────────────────────
// Generation
// ────────────────────────────────────────────────────────────────────────────

pub async fn generate_prompt_from_job_ad(
    groq: &LlmClient,
    fallback_models: &[String],
    request: &JobAdRequest,
    source: &JobAdSource,
) -> Result<GeneratedPrompt, AppError> {
    if !groq.is_configured() {
        return Err(AppError::Llm(
            "Missing GROQ_API_KEY for job-ad prompt generation".to_string(),
        ));
    }

    let normalized_type = normalize_prompt_type(request.prompt_type.as_deref().unwrap_or("all"));
    let normalized_difficulty = normalize_difficulty(request.difficulty.as_deref().unwrap_or("all"));

    let job_text: String = source.text.chars().take(MAX_JOB_TEXT_CHARS).collect();
    let user_prompt = build_generation_prompt(
        &normalized_type,
        &normalized_difficulty,
        &source.url,
        &source.title,
        &job_text,
    );

    let opts = ChatOptions {
        system: Some(JOB_AD_SYSTEM),
        temperature: Some(0.4),
        json_mode: true,
    };
    let plain_opts = ChatOptions {
        json_mode: false,
        ..opts
    };

    let mut payload: Option<Value> = None;
    let mut chosen_model = String::new();
    let mut last_error = String::new();

    for model in model_candidates(groq.default_model(), fallback_models) {
        match groq.chat_json::<Value>(&model, &user_prompt, opts).await {
            Ok(value) if value.is_object() => {
                payload = Some(value);
                chosen_model = model;
                break;
            }
            Ok(other) => {
                last_error = format!("model '{model}' returned non-object JSON: {other}");
                warn!("{last_error}");
            }
            Err(e) => {
                last_error = format!("model '{model}' failed: {e}");
                warn!("{last_error}");
                // Some models reject response_format; retry once without it.
                match groq.chat(&model, &user_prompt, plain_opts).await {
                    Ok(raw) => {
                        if let Some(value) = extract_json_object(&raw) {
                            payload = Some(value);
                            chosen_model = model;
                            break;
                        }
                        last_error =
                            format!("model '{model}' produced no parsable JSON object");
                        warn!("{last_error}");
                    }
                    Err(e2) => {
                        last_error = format!("model '{model}' retry failed: {e2}");
                        warn!("{last_error}");
                    }
                }
            }
        }
    }

    let payload = payload.ok_or_else(|| {
        AppError::Llm(format!(
            "All Groq model attempts failed. Last error: {last_error}"
        ))
    })?;

    let kind = resolve_generated_value(
        payload.get("type").and_then(Value::as_str),
        &normalized_type,
        normalize_prompt_type,
        "technical",
    );
    let difficulty = resolve_generated_value(
        payload.get("difficulty").and_then(Value::as_str),
        &normalized_difficulty,
        normalize_difficulty,
        "medium",
    );

    let text = payload
        .get("text")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Llm("Groq response did not include prompt text".to_string()))?
        .to_string();

    let unique = Uuid::new_v4().simple().to_string();
    let generated = GeneratedPrompt {
        prompt: Prompt {
            id: format!("jobad_groq_{}", &unique[..8]),
            kind,
            text,
            difficulty,
            good_signals: coerce_string_list(
                payload.get("good_signals"),
                &DEFAULT_GOOD_SIGNALS,
            ),
            red_flags: coerce_string_list(payload.get("red_flags"), &DEFAULT_RED_FLAGS),
        },
        source: "groq_job_ad".to_string(),
        job_ad_url: source.url.clone(),
        job_ad_title: source.title.clone(),
        model: chosen_model,
    };

    info!(
        model = %generated.model,
        prompt_type = %generated.prompt.kind,
        difficulty = %generated.prompt.difficulty,
        "generated prompt from job ad"
    );
    Ok(generated)
}

fn build_generation_prompt(
    prompt_type: &str,
    difficulty: &str,
    job_url: &str,
    job_title: &str,
    job_text: &str,
) -> String {
    format!(
        r#"Generate one interview prompt from this job ad.

Requirements:
- Use the job ad details heavily (responsibilities, skills, seniority).
- If prompt_type is not "all", use it exactly.
- If difficulty is not "all", use it exactly.
- If prompt_type is "all", infer one of: technical, behavioral, situational, general.
- If difficulty is "all", infer one of: easy, medium, hard, expert, master.
- Return ONLY one valid JSON object (no markdown, no comments, no extra text).
- JSON schema:
  {{
    "id": "custom_prompt",
    "type": "technical|behavioral|situational|general",
    "text": "interview question",
    "difficulty": "easy|medium|hard|expert|master",
    "good_signals": ["...", "..."],
    "red_flags": ["...", "..."]
  }}
- `good_signals` and `red_flags` should each contain 2-5 concise strings.

User-selected filters:
- prompt_type: {prompt_type}
- difficulty: {difficulty}

Job Ad URL:
{job_url}

Job Ad Title:
{job_title}

Job Ad Text (truncated):
{job_text}"#
    )
}

/// Ordered, deduplicated model candidate chain: the configured default,
/// then the configured fallbacks, then the builtin fallbacks.
fn model_candidates(default_model: &str, fallbacks: &[String]) -> Vec<String> {
    let mut candidates: Vec<String> = Vec::new();
    let mut push = |candidate: &str| {
        let candidate = candidate.trim();
        if !candidate.is_empty() && !candidates.iter().any(|c| c == candidate) {
            candidates.push(candidate.to_string());
        }
    };
    push(default_model);
    for fallback in fallbacks {
        push(fallback);
    }
    for builtin in BUILTIN_FALLBACK_MODELS {
        push(builtin);
    }
    candidates
}

/// The model's value is normalized; a non-`all` user filter overrides it,
/// and a still-unresolved `all` collapses to the given default.
fn resolve_generated_value(
    generated: Option<&str>,
    requested: &str,
    normalize: fn(&str) -> String,
    default: &str,
) -> String {
    let mut resolved = normalize(generated.unwrap_or(requested));
    if requested != "all" {
        resolved = requested.to_string();
    }
    if resolved == "all" {
        resolved = default.to_string();
    }
    resolved
}

/// Pulls a JSON object out of possibly-wrapped LLM output: plain JSON,
/// fenced JSON, or the outermost `{...}` slice.
fn extract_json_object(raw: &str) -> Option<Value> {
    let text = strip_json_fences(raw.trim());
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        if value.is_object() {
            return Some(value);
        }
    }

    let first = text.find('{')?;
    let last = text.rfind('}')?;
    if last > first {
        if let Ok(value) = serde_json::from_str::<Value>(&text[first..=last]) {
            if value.is_object() {
                return Some(value);
            }
        }
    }
    None
}

/// Cleans a signal list: items stringified and trimmed, capped at 5; an
/// empty or non-list value falls back to the defaults.
fn coerce_string_list(value: Option<&Value>, fallback: &[&str]) -> Vec<String> {
    let cleaned: Vec<String> = value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.trim().to_string(),
                    other => other.to_string(),
                })
                .filter(|s| !s.is_empty())
                .take(5)
                .collect()
        })
        .unwrap_or_default();

    if cleaned.is_empty() {
        fallback.iter().map(|s| s.to_string()).collect()
    } else {
        cleaned
    }
}
