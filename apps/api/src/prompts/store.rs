//! The canned prompt catalog, loaded once at startup from `prompts.json`.

use std::path::Path;

use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

pub const PROMPT_TYPES: [&str; 4] = ["technical", "behavioral", "situational", "general"];
pub const DIFFICULTIES: [&str; 5] = ["easy", "medium", "hard", "expert", "master"];

/// One interview question with its scoring metadata. Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
    pub difficulty: String,
    #[serde(default)]
    pub good_signals: Vec<String>,
    #[serde(default)]
    pub red_flags: Vec<String>,
}

pub struct PromptStore {
    prompts: Vec<Prompt>,
}

impl PromptStore {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read prompts file: {}", path.display()))?;
        let prompts: Vec<Prompt> = serde_json::from_str(&raw)
            .context("prompts file must contain a JSON array of prompt objects")?;
        anyhow::ensure!(
            !prompts.is_empty(),
            "prompts file does not contain any prompts"
        );
        Ok(Self { prompts })
    }

    pub fn from_prompts(prompts: Vec<Prompt>) -> Self {
        Self { prompts }
    }

    /// Prompts matching the (normalized) filters. Unknown filter values
    /// normalize to `all`, so a typo widens the filter instead of emptying it.
    pub fn filtered(&self, kind: &str, difficulty: &str) -> Vec<&Prompt> {
        let kind = normalize_prompt_type(kind);
        let difficulty = normalize_difficulty(difficulty);
        self.prompts
            .iter()
            .filter(|p| kind == "all" || p.kind.eq_ignore_ascii_case(&kind))
            .filter(|p| difficulty == "all" || p.difficulty.eq_ignore_ascii_case(&difficulty))
            .collect()
    }

    /// Uniform random pick from the filtered set.
    pub fn random(&self, kind: &str, difficulty: &str) -> Option<&Prompt> {
        self.filtered(kind, difficulty)
            .choose(&mut rand::thread_rng())
            .copied()
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }
}

/// Lowercases and validates a prompt-type filter; anything unknown becomes
/// `all`. The British `behavioural` spelling is folded into `behavioral`.
pub fn normalize_prompt_type(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    if lower == "behavioural" {
        return "behavioral".to_string();
    }
    if PROMPT_TYPES.contains(&lower.as_str()) {
        lower
    } else {
        "all".to_string()
    }
}

/// Lowercases and validates a difficulty filter; anything unknown becomes `all`.
pub fn normalize_difficulty(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    if DIFFICULTIES.contains(&lower.as_str()) {
        lower
    } else {
        "all".to_string()
    }
}
