//! Config redaction: produce safe-to-share config snapshots by masking secrets.

use serde_json::Value;

/// Keys whose string values are secrets.
static SECRET_KEYS: &[&str] = &[
    "apiKey",
    "api_key",
    "apikey",
    "token",
    "accessToken",
    "access_token",
    "secret",
    "password",
    "authorization",
];

/// Redact a config JSON value, masking every secret field.
///
/// The result is safe to log or print with `config show`.
pub fn redact(value: &Value) -> Value {
    redact_recursive(value, "")
}

fn is_secret_key(key: &str) -> bool {
    SECRET_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key))
}

fn redact_string(s: &str, key: &str) -> Value {
    if !is_secret_key(key) || s.is_empty() {
        return Value::String(s.to_string());
    }
    // Keep a short prefix as a hint; never for short secrets
    let hint = if s.chars().count() > 8 {
        format!("{}***", s.chars().take(4).collect::<String>())
    } else {
        "***".to_string()
    };
    Value::String(hint)
}

fn redact_recursive(value: &Value, key: &str) -> Value {
    match value {
        Value::String(s) => redact_string(s, key),
        Value::Array(arr) => Value::Array(arr.iter().map(|v| redact_recursive(v, key)).collect()),
        Value::Object(map) => {
            let mut result = serde_json::Map::new();
            for (k, v) in map {
                result.insert(k.clone(), redact_recursive(v, k));
            }
            Value::Object(result)
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redacts_api_key() {
        let v = json!({ "model": { "apiKey": "sk-abcdef123456" } });
        let redacted = redact(&v);
        let key = redacted["model"]["apiKey"].as_str().unwrap();
        assert_eq!(key, "sk-a***");
    }

    #[test]
    fn short_secret_is_fully_masked() {
        let v = json!({ "token": "abc" });
        assert_eq!(redact(&v)["token"], "***");
    }

    #[test]
    fn passthrough_non_sensitive() {
        let v = json!({ "logging": { "level": "debug" }, "agent": { "maxToolRounds": 5 } });
        assert_eq!(redact(&v), v);
    }
}
