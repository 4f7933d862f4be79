//! Timeline projection for charting.
//!
//! Stored timelines are sequences of `{timestamp, percentage}` readings;
//! the chart endpoints serve them as ordered `[timestamp, percentage]`
//! pairs. Projection is total: malformed entries are dropped, missing keys
//! project as `null`, and input order is preserved.

use serde_json::Value;

/// Projects one timeline value into `[timestamp, percentage]` pairs.
///
/// Entries that are already two-element arrays pass through unchanged;
/// anything that is neither a mapping nor such a pair is silently dropped.
pub fn to_pairs(timeline: &Value) -> Vec<Value> {
    let Some(items) = timeline.as_array() else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(Value::Array(vec![
                map.get("timestamp").cloned().unwrap_or(Value::Null),
                map.get("percentage").cloned().unwrap_or(Value::Null),
            ])),
            Value::Array(pair) if pair.len() == 2 => Some(item.clone()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mappings_project_to_pairs_in_order() {
        let timeline = json!([
            {"timestamp": 1, "percentage": 50},
            {"timestamp": 2, "percentage": 80}
        ]);
        assert_eq!(to_pairs(&timeline), vec![json!([1, 50]), json!([2, 80])]);
    }

    #[test]
    fn test_malformed_entries_silently_dropped() {
        let timeline = json!([
            {"timestamp": 1, "percentage": 50},
            "not a dict",
            {"timestamp": 2, "percentage": 80}
        ]);
        assert_eq!(to_pairs(&timeline), vec![json!([1, 50]), json!([2, 80])]);
    }

    #[test]
    fn test_missing_keys_project_as_null() {
        let timeline = json!([{"timestamp": 3}, {"percentage": 10}, {}]);
        assert_eq!(
            to_pairs(&timeline),
            vec![json!([3, null]), json!([null, 10]), json!([null, null])]
        );
    }

    #[test]
    fn test_two_element_pairs_pass_through() {
        let timeline = json!([[1, 50], {"timestamp": 2, "percentage": 80}, [9, 9, 9]]);
        assert_eq!(to_pairs(&timeline), vec![json!([1, 50]), json!([2, 80])]);
    }

    #[test]
    fn test_non_array_input_yields_empty() {
        for input in [json!(null), json!({}), json!("x"), json!(5)] {
            assert!(to_pairs(&input).is_empty());
        }
    }
}
