use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use interview_api::analysis::LiveAnalyzer;
use interview_api::config::Config;
use interview_api::llm_client::LlmClient;
use interview_api::prompts::store::PromptStore;
use interview_api::results::store::ResultsStore;
use interview_api::{build_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first so the log filter default can come from it.
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Interview Coach API v{}", env!("CARGO_PKG_VERSION"));

    let prompts = PromptStore::load(Path::new(&config.prompts_path))?;
    info!(count = prompts.len(), "prompt catalog loaded");

    let openai = LlmClient::new(
        config.openai_base_url.clone(),
        config.openai_api_key.clone(),
        config.openai_model.clone(),
    );
    if !openai.is_configured() {
        warn!("OPENAI_API_KEY not set; /analyze will report analysis_unavailable");
    }

    let groq = LlmClient::new(
        config.groq_base_url.clone(),
        config.groq_api_key.clone(),
        config.groq_model.clone(),
    );
    if !groq.is_configured() {
        warn!("GROQ_API_KEY not set; /prompt/from-job-ad will be unavailable");
    }

    let analyzer = LiveAnalyzer::new(openai, &config);

    let state = AppState {
        config: config.clone(),
        groq,
        analyzer: Arc::new(analyzer),
        prompts: Arc::new(prompts),
        results: Arc::new(ResultsStore::new()),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // single-user dev tool; no origin policy

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
