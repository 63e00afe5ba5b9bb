//! Config redaction: produce a loggable snapshot with secrets masked.

use serde_json::Value;

/// Keys whose string values are never logged in full.
static SENSITIVE_KEYS: &[&str] = &[
    "accessToken",
    "access_token",
    "password",
    "token",
    "secret",
    "privateKey",
    "private_key",
    "privateKeyPath",
];

/// Redact a config JSON value, masking every sensitive field.
pub fn redact(value: &Value) -> Value {
    redact_recursive(value, "")
}

fn is_sensitive_key(key: &str) -> bool {
    SENSITIVE_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key))
}

fn mask(s: &str) -> String {
    // Keep a short prefix so operators can tell which secret is configured.
    let prefix: String = s.chars().take(4).collect();
    if s.chars().count() > 8 {
        format!("{prefix}***")
    } else {
        "***".to_string()
    }
}

fn redact_recursive(value: &Value, key: &str) -> Value {
    match value {
        Value::String(s) if is_sensitive_key(key) && !s.is_empty() => Value::String(mask(s)),
        Value::Array(arr) => Value::Array(arr.iter().map(|v| redact_recursive(v, key)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), redact_recursive(v, k)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Field paths that `redact` would mask.
pub fn collect_redacted_paths(value: &Value) -> Vec<String> {
    fn walk(value: &Value, path: &str, out: &mut Vec<String>) {
        match value {
            Value::String(s) if !s.is_empty() => {
                let key = path.rsplit('.').next().unwrap_or("");
                if is_sensitive_key(key) {
                    out.push(path.to_string());
                }
            }
            Value::Object(map) => {
                for (k, v) in map {
                    let child = if path.is_empty() { k.clone() } else { format!("{path}.{k}") };
                    walk(v, &child, out);
                }
            }
            _ => {}
        }
    }
    let mut paths = Vec::new();
    walk(value, "", &mut paths);
    paths
}
