//! Interview Coach API.
//!
//! An axum service that takes an uploaded interview recording plus
//! client-computed vision metrics, orchestrates transcription, voice-tone
//! analysis, and an LLM review, and aggregates everything into one
//! canonical per-session result. Results are served by a family of read
//! endpoints and an on-demand PDF report. All state is in process memory.

pub mod analysis;
pub mod config;
pub mod errors;
pub mod llm_client;
pub mod prompts;
pub mod results;
pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::AppState;
