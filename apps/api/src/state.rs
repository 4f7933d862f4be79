use std::sync::Arc;

use crate::analysis::InterviewAnalyzer;
use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::prompts::store::PromptStore;
use crate::results::store::ResultsStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Groq-hosted endpoint, used only by job-ad prompt generation.
    pub groq: LlmClient,
    /// Pluggable analysis backend. Production wires `LiveAnalyzer`; tests
    /// swap in a stub.
    pub analyzer: Arc<dyn InterviewAnalyzer>,
    pub prompts: Arc<PromptStore>,
    pub results: Arc<ResultsStore>,
}
