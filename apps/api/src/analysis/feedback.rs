//! Feedback normalization.
//!
//! The frontend has shipped both `good_signals`/`red_flags` (snake_case)
//! and `goodSignals`/`redFlags` (camelCase) for the same semantic fields.
//! Naming drift between producer and consumer is tolerated, not rejected:
//! the snake_case key wins when it carries data, the camelCase key is the
//! fallback, and anything malformed collapses to empty lists.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The canonical shape every feedback payload normalizes to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedFeedback {
    pub good_signals: Vec<String>,
    pub red_flags: Vec<String>,
}

impl NormalizedFeedback {
    pub fn is_empty(&self) -> bool {
        self.good_signals.is_empty() && self.red_flags.is_empty()
    }
}

/// Normalizes an arbitrary decoded value into [`NormalizedFeedback`].
///
/// Non-mapping input yields the empty shape. For each side, the snake_case
/// key is read first; if it is absent or holds an empty list, the
/// camelCase alternate is consulted. Non-list values coerce to `[]`.
pub fn normalize_feedback(value: &Value) -> NormalizedFeedback {
    let Some(map) = value.as_object() else {
        return NormalizedFeedback::default();
    };

    NormalizedFeedback {
        good_signals: string_list_with_fallback(map.get("good_signals"), map.get("goodSignals")),
        red_flags: string_list_with_fallback(map.get("red_flags"), map.get("redFlags")),
    }
}

fn string_list_with_fallback(primary: Option<&Value>, alternate: Option<&Value>) -> Vec<String> {
    let from_primary = string_list(primary);
    if !from_primary.is_empty() {
        return from_primary;
    }
    string_list(alternate)
}

/// Declared as a list of strings in the data model, so non-string items
/// inside an otherwise-valid list are dropped.
fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
