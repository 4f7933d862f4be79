//! Field coercion for JSON-encoded multipart form fields.
//!
//! Every "parse this form field as JSON" call site in the request path goes
//! through [`parse_json_field`]: vision metrics, summary, timelines, and
//! feedback all get the identical contract, a total function that never
//! fails the caller's flow.

use serde_json::{json, Value};

/// Parses a form field expected to contain JSON.
///
/// - empty/blank input → `{}` (the field was simply not supplied)
/// - valid JSON → the parsed value, unmodified
/// - invalid JSON → `{"parse_error": true, "raw": <original string>}`
pub fn parse_json_field(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return json!({});
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => value,
        Err(_) => json!({ "parse_error": true, "raw": raw }),
    }
}
