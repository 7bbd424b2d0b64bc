//! Token claim matching for mapping rules
//!
//! Claim names are either plain top-level keys or `$.`-prefixed dotted paths
//! into nested claim objects. Array claims match if any element matches.

use serde_json::{Map, Value};

const PATH_PREFIX: &str = "$.";

/// Resolve a claim by name or `$.a.b` path
pub fn lookup<'a>(claims: &'a Map<String, Value>, claim_name: &str) -> Option<&'a Value> {
    match claim_name.strip_prefix(PATH_PREFIX) {
        Some(path) => {
            let mut segments = path.split('.');
            let first = segments.next()?;
            let mut current = claims.get(first)?;
            for segment in segments {
                current = current.as_object()?.get(segment)?;
            }
            Some(current)
        }
        None => claims.get(claim_name),
    }
}

/// Whether a claim value equals the expected textual value
pub fn value_matches(value: &Value, expected: &str) -> bool {
    match value {
        Value::String(s) => s == expected,
        Value::Number(n) => n.to_string() == expected,
        Value::Bool(b) => b.to_string() == expected,
        Value::Array(items) => items.iter().any(|item| value_matches(item, expected)),
        Value::Null | Value::Object(_) => false,
    }
}

/// Whether the claims satisfy `claim_name == claim_value`
pub fn matches(claims: &Map<String, Value>, claim_name: &str, claim_value: &str) -> bool {
    lookup(claims, claim_name)
        .map(|value| value_matches(value, claim_value))
        .unwrap_or(false)
}
