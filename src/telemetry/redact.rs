//! Sanitising of structured values before they reach logs or the audit trail.

use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Strings longer than this are cut.
pub const MAX_STRING_CHARS: usize = 800;
/// Nesting deeper than this is replaced wholesale.
pub const MAX_DEPTH: usize = 6;

const REDACTED: &str = "[redacted]";
const REDACTED_DEPTH: &str = "[redacted:depth]";

/// Lower-cased keys whose values never leave the process.
static SENSITIVE_KEYS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "password",
        "token",
        "accesstoken",
        "refreshtoken",
        "idtoken",
        "authorization",
        "cookie",
        "set-cookie",
        "stripe-signature",
        "apikey",
        "secret",
        "clientsecret",
        "webhooksecret",
        "email",
        "transcript",
        "jobdesc",
    ]
    .into_iter()
    .collect()
});

fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    SENSITIVE_KEYS.contains(lower.as_str())
        || lower.contains("token")
        || lower.contains("secret")
        || lower.contains("password")
}

fn truncate(s: &str) -> Value {
    let total = s.chars().count();
    if total <= MAX_STRING_CHARS {
        return Value::String(s.to_string());
    }
    let kept: String = s.chars().take(MAX_STRING_CHARS).collect();
    Value::String(format!(
        "{}…[truncated {} chars]",
        kept,
        total - MAX_STRING_CHARS
    ))
}

/// Returns a copy of `value` safe to log.
pub fn redact(value: &Value) -> Value {
    redact_at(value, 0)
}

fn redact_at(value: &Value, depth: usize) -> Value {
    if depth > MAX_DEPTH {
        return Value::String(REDACTED_DEPTH.to_string());
    }
    match value {
        Value::String(s) => truncate(s),
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| redact_at(v, depth + 1)).collect())
        }
        Value::Object(fields) => {
            let mut out = Map::with_capacity(fields.len());
            for (key, v) in fields {
                let clean = if is_sensitive_key(key) {
                    Value::String(REDACTED.to_string())
                } else {
                    redact_at(v, depth + 1)
                };
                out.insert(key.clone(), clean);
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}
