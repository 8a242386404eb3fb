//! Secret redaction for log and audit payloads
//!
//! Masks credential-bearing fields in structured payloads before they are
//! emitted to logs or stored as audit metadata. Matching is by key substring,
//! case-insensitive, and recurses through nested objects and arrays up to a
//! fixed depth.

use serde_json::Value;

/// Key substrings whose values are masked
const SENSITIVE_KEYS: &[&str] = &[
    "access_token",
    "accesstoken",
    "token",
    "secret",
    "password",
    "key",
    "authorization",
    "auth",
];

/// Traversal stops below this depth; deeper values pass through unmasked
const MAX_DEPTH: usize = 10;

/// Returns a copy of `value` with sensitive fields masked.
///
/// String secrets keep their first four characters followed by `****` so log
/// lines stay correlatable without exposing the credential. JSON values are
/// trees, so the depth cap alone bounds the recursion.
pub fn redact(value: &Value) -> Value {
    redact_at_depth(value, 0)
}

fn redact_at_depth(value: &Value, depth: usize) -> Value {
    if depth > MAX_DEPTH {
        return value.clone();
    }

    match value {
        Value::Array(items) => Value::Array(
            items.iter().map(|item| redact_at_depth(item, depth + 1)).collect(),
        ),
        Value::Object(map) => {
            let mut redacted = serde_json::Map::with_capacity(map.len());
            for (key, entry) in map {
                let lower_key = key.to_lowercase();
                let is_sensitive = SENSITIVE_KEYS.iter().any(|sensitive| lower_key.contains(sensitive));

                let masked = if is_sensitive {
                    mask(entry)
                } else {
                    redact_at_depth(entry, depth + 1)
                };
                redacted.insert(key.clone(), masked);
            }
            Value::Object(redacted)
        }
        other => other.clone(),
    }
}

fn mask(value: &Value) -> Value {
    match value {
        Value::String(secret) if !secret.is_empty() => {
            let prefix: String = secret.chars().take(4).collect();
            Value::String(format!("{}****", prefix))
        }
        _ => Value::String("****".to_string()),
    }
}
