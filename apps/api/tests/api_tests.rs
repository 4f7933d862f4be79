//! Router integration tests driven through `tower::ServiceExt::oneshot`,
//! with the analysis pipeline replaced by a deterministic stub.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use interview_api::analysis::aggregate::{AnalysisRecord, InterviewAnalysis};
use interview_api::analysis::voice::VoiceAnalysis;
use interview_api::analysis::{AnalysisInput, InterviewAnalyzer};
use interview_api::config::Config;
use interview_api::llm_client::LlmClient;
use interview_api::prompts::store::{Prompt, PromptStore};
use interview_api::results::store::ResultsStore;
use interview_api::{build_router, AppState};

const BOUNDARY: &str = "interview-test-boundary";

// ────────────────────────────────────────────────────────────────────────────
// Test fixtures
// ────────────────────────────────────────────────────────────────────────────

/// Deterministic analyzer: either a fixed completed review or the
/// `analysis_unavailable` envelope.
struct StubAnalyzer {
    fail: bool,
}

#[async_trait]
impl InterviewAnalyzer for StubAnalyzer {
    async fn analyze(&self, input: AnalysisInput) -> InterviewAnalysis {
        if self.fail {
            return InterviewAnalysis::unavailable("stub failure");
        }
        InterviewAnalysis::Completed(Box::new(AnalysisRecord {
            transcript: "I would use the STAR method here.".to_string(),
            vision_summary: input.vision_metrics.clone(),
            voice_analysis: VoiceAnalysis::failed("Not enough speech detected", None),
            llm_review: "Solid answer overall.".to_string(),
            question: input.prompt_text.clone(),
            question_type: input.prompt_type.clone(),
            difficulty: input.prompt_difficulty.clone(),
            clarity_score: 20,
            content_score: 18,
            professionalism_score: 16,
            body_language_score: 12,
            vocal_delivery_score: 11,
            total_score: 77,
            doing_well: "Clear structure.".to_string(),
            must_improve: "Fewer filler words.".to_string(),
            habits_to_keep: "Concrete examples.".to_string(),
            action_plan: "Practice STAR twice.".to_string(),
        }))
    }
}

fn catalog() -> Vec<Prompt> {
    vec![
        Prompt {
            id: "tech_easy_1".to_string(),
            kind: "technical".to_string(),
            text: "What is a hash map?".to_string(),
            difficulty: "easy".to_string(),
            good_signals: vec!["mentions O(1) lookup".to_string()],
            red_flags: vec![],
        },
        Prompt {
            id: "beh_medium_1".to_string(),
            kind: "behavioral".to_string(),
            text: "Describe a disagreement with a teammate.".to_string(),
            difficulty: "medium".to_string(),
            good_signals: vec![],
            red_flags: vec!["blames the teammate".to_string()],
        },
    ]
}

fn test_config(upload_dir: &std::path::Path) -> Config {
    Config {
        port: 0,
        rust_log: "info".to_string(),
        openai_api_key: None,
        openai_base_url: "https://api.openai.com/v1".to_string(),
        openai_model: "gpt-4o-mini".to_string(),
        whisper_model: "whisper-1".to_string(),
        groq_api_key: None,
        groq_base_url: "https://api.groq.com/openai/v1".to_string(),
        groq_model: "llama-3.3-70b-versatile".to_string(),
        groq_model_fallbacks: vec![],
        ffmpeg_path: None,
        upload_dir: upload_dir.to_string_lossy().into_owned(),
        prompts_path: "prompts.json".to_string(),
    }
}

fn test_app(upload_dir: &tempfile::TempDir, fail_analysis: bool) -> Router {
    let config = test_config(upload_dir.path());
    let groq = LlmClient::new(config.groq_base_url.clone(), None, config.groq_model.clone());
    build_router(AppState {
        groq,
        analyzer: Arc::new(StubAnalyzer {
            fail: fail_analysis,
        }),
        prompts: Arc::new(PromptStore::from_prompts(catalog())),
        results: Arc::new(ResultsStore::new()),
        config,
    })
}

fn multipart_body(fields: &[(&str, &str)], audio: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, bytes)) = audio {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"audio\"; \
                 filename=\"{filename}\"\r\nContent-Type: audio/webm\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn analyze_request(fields: &[(&str, &str)], audio: Option<(&str, &[u8])>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/analyze")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(fields, audio)))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ────────────────────────────────────────────────────────────────────────────
// Empty-store behavior
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_results_full_is_empty_before_any_analysis() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir, false);

    let response = app.oneshot(get("/results/full")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "ok": true, "results": {} })
    );
}

#[tokio::test]
async fn test_pdf_before_any_analysis_is_a_json_error() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir, false);

    let response = app.oneshot(get("/results/interview/pdf")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.contains("application/json"));
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_timelines_default_to_empty_lists() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir, false);

    let body = body_json(app.oneshot(get("/results/timelines")).await.unwrap()).await;
    assert_eq!(
        body["interview_timelines"],
        json!({ "posture_timeline": [], "eye_timeline": [] })
    );
}

// ────────────────────────────────────────────────────────────────────────────
// /analyze end-to-end
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_analyze_end_to_end_with_stubbed_review() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir, false);

    let fields = [
        ("prompt_id", "beh_medium_1"),
        ("prompt_text", "Describe a disagreement with a teammate."),
        ("prompt_type", ""),
        ("prompt_difficulty", "hard"),
        ("vision_metrics", r#"{"postureGoodPct":90,"eyeGoodPct":70}"#),
        ("interview_summary", r#"{"type":"technical","difficulty":"easy"}"#),
        (
            "interview_timelines",
            r#"{"posture_timeline":[{"timestamp":1,"percentage":50},{"timestamp":2,"percentage":80}],"eye_timeline":[{"timestamp":1,"percentage":60}]}"#,
        ),
        ("interview_feedback", r#"{"goodSignals":["uses STAR"]}"#),
    ];
    let response = app
        .clone()
        .oneshot(analyze_request(&fields, Some(("clip.webm", b"fake-webm-bytes"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;

    assert_eq!(body["ok"], json!(true));
    // Explicit difficulty wins; missing type falls back to the summary.
    assert_eq!(body["prompt_type"], "technical");
    assert_eq!(body["prompt_difficulty"], "hard");
    // camelCase feedback keys normalized, and canonical for signal lookup.
    assert_eq!(body["interview_feedback"]["good_signals"], json!(["uses STAR"]));
    assert_eq!(body["good_signals"], json!(["uses STAR"]));
    assert_eq!(
        body["vision_metrics"],
        json!({"postureGoodPct": 90, "eyeGoodPct": 70})
    );
    assert_eq!(body["audio"]["filename"], "clip.webm");
    assert_eq!(body["audio"]["bytes"], 15);
    assert_eq!(body["interview_analysis"]["total_score"], 77);
    assert!(body["session_id"].is_string());

    // The stored record round-trips through /results/full unmodified.
    let full = body_json(app.clone().oneshot(get("/results/full")).await.unwrap()).await;
    assert_eq!(full["ok"], json!(true));
    assert_eq!(full["results"]["prompt_type"], "technical");
    assert_eq!(full["results"]["prompt_difficulty"], "hard");
    assert_eq!(
        full["results"]["vision_metrics"],
        json!({"postureGoodPct": 90, "eyeGoodPct": 70})
    );

    // Timelines project to ordered pairs.
    let timelines = body_json(app.clone().oneshot(get("/results/timelines")).await.unwrap()).await;
    assert_eq!(
        timelines["interview_timelines"]["posture_timeline"],
        json!([[1, 50], [2, 80]])
    );
    let posture =
        body_json(app.clone().oneshot(get("/results/posture_timeline")).await.unwrap()).await;
    assert_eq!(posture["posture_timeline"], json!([[1, 50], [2, 80]]));
    let eye = body_json(app.clone().oneshot(get("/results/eye_timeline")).await.unwrap()).await;
    assert_eq!(eye["eye_timeline"], json!([[1, 60]]));

    // Review text is exposed directly.
    let review = body_json(app.clone().oneshot(get("/results/llm_review")).await.unwrap()).await;
    assert_eq!(review["llm_review"], "Solid answer overall.");

    // And the PDF renders from the stored state.
    let pdf = app.oneshot(get("/results/interview/pdf")).await.unwrap();
    assert_eq!(pdf.status(), StatusCode::OK);
    assert_eq!(pdf.headers()[header::CONTENT_TYPE], "application/pdf");
    let bytes = pdf.into_body().collect().await.unwrap().to_bytes();
    assert!(bytes.starts_with(b"%PDF"));
}

#[tokio::test]
async fn test_analyze_failure_returns_200_but_stores_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir, true);

    let response = app
        .clone()
        .oneshot(analyze_request(&[], Some(("clip.webm", b"bytes"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ok"], json!(true));
    assert_eq!(
        body["interview_analysis"],
        json!({ "error": "analysis_unavailable", "detail": "stub failure" })
    );

    // The failed session must not replace the stored state.
    let full = body_json(app.oneshot(get("/results/full")).await.unwrap()).await;
    assert_eq!(full["results"], json!({}));
}

#[tokio::test]
async fn test_analyze_without_audio_is_a_client_error() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir, false);

    let response = app
        .oneshot(analyze_request(&[("prompt_id", "p1")], None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_analyze_tolerates_malformed_json_fields() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir, false);

    let fields = [
        ("vision_metrics", "{not json"),
        ("interview_feedback", "also not json"),
    ];
    let response = app
        .oneshot(analyze_request(&fields, Some(("clip.webm", b"bytes"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["vision_metrics"]["parse_error"], json!(true));
    assert_eq!(body["vision_metrics"]["raw"], "{not json");
    assert_eq!(
        body["interview_feedback"],
        json!({ "good_signals": [], "red_flags": [] })
    );
}

#[tokio::test]
async fn test_second_analysis_replaces_the_first() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir, false);

    for prompt_id in ["first", "second"] {
        let fields = [("prompt_id", prompt_id)];
        let response = app
            .clone()
            .oneshot(analyze_request(&fields, Some(("clip.webm", b"bytes"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let full = body_json(app.oneshot(get("/results/full")).await.unwrap()).await;
    assert_eq!(full["results"]["prompt_id"], "second");
}

// ────────────────────────────────────────────────────────────────────────────
// Prompt endpoints
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_prompt_all_unfiltered_returns_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir, false);

    let body = body_json(app.oneshot(get("/prompt/all")).await.unwrap()).await;
    assert_eq!(body["count"], 2);
    assert_eq!(body["prompts"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_prompt_all_unknown_filter_normalizes_to_all() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir, false);

    let body = body_json(
        app.oneshot(get("/prompt/all?type=bogus&difficulty=nope"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["count"], 2);
}

#[tokio::test]
async fn test_prompt_all_filters_by_type() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir, false);

    let body = body_json(app.oneshot(get("/prompt/all?type=technical")).await.unwrap()).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["prompts"][0]["id"], "tech_easy_1");
}

#[tokio::test]
async fn test_prompt_random_honors_filter() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir, false);

    let body = body_json(
        app.oneshot(get("/prompt/random?type=behavioral"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["prompt"]["type"], "behavioral");
}

#[tokio::test]
async fn test_prompt_random_empty_match_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir, false);

    // The test catalog has no master-difficulty prompts.
    let response = app
        .oneshot(get("/prompt/random?difficulty=master"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_from_job_ad_requires_a_source() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir, false);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/prompt/from-job-ad")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_from_job_ad_without_groq_key_is_an_llm_error() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir, false);

    let payload = json!({
        "text": "We are hiring a senior backend engineer to build payment infrastructure \
                 in Rust with strong ownership of reliability."
    });
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/prompt/from-job-ad")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "LLM_ERROR");
}

// ────────────────────────────────────────────────────────────────────────────
// Liveness
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health_endpoints() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir, false);

    let health = body_json(app.clone().oneshot(get("/health")).await.unwrap()).await;
    assert_eq!(health["status"], "ok");

    let root = app.oneshot(get("/")).await.unwrap();
    assert_eq!(root.status(), StatusCode::OK);
}
