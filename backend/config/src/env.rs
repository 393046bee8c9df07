//! Environment variable substitution for config values.
//!
//! Supports `${VAR_NAME}` and `${VAR_NAME:-fallback}` in string values,
//! resolved at load time. Only uppercase `[A-Z_][A-Z0-9_]*` names are matched.
//! `$${VAR}` escapes to a literal `${VAR}`.

use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::HashMap;

/// `$` (escape marker), name, optional `:-fallback`.
static ENV_VAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$(\$?)\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}").unwrap());

/// Error returned for missing env vars.
#[derive(Debug, thiserror::Error)]
#[error("Missing env var \"{var_name}\" referenced at config path: {config_path}")]
pub struct MissingEnvVarError {
    pub var_name: String,
    pub config_path: String,
}

/// Substitute `${VAR}` references in a config JSON value tree.
///
/// Only string leaves are processed. An unset or empty variable without a
/// fallback is an error.
pub fn resolve_env_vars(value: &Value) -> Result<Value> {
    substitute_value(value, &std::env::vars().collect(), "")
}

/// Substitute env vars using a provided map (useful for testing).
pub fn resolve_env_vars_with(value: &Value, env: &HashMap<String, String>) -> Result<Value> {
    substitute_value(value, env, "")
}

fn substitute_value(value: &Value, env: &HashMap<String, String>, path: &str) -> Result<Value> {
    match value {
        Value::String(s) => Ok(Value::String(substitute_string(s, env, path)?)),
        Value::Array(arr) => {
            let result: Result<Vec<_>> = arr
                .iter()
                .enumerate()
                .map(|(i, v)| substitute_value(v, env, &format!("{path}[{i}]")))
                .collect();
            Ok(Value::Array(result?))
        }
        Value::Object(map) => {
            let mut result = serde_json::Map::new();
            for (k, v) in map {
                let child_path = if path.is_empty() {
                    k.clone()
                } else {
                    format!("{path}.{k}")
                };
                result.insert(k.clone(), substitute_value(v, env, &child_path)?);
            }
            Ok(Value::Object(result))
        }
        other => Ok(other.clone()),
    }
}

fn substitute_string(s: &str, env: &HashMap<String, String>, path: &str) -> Result<String> {
    if !s.contains('$') {
        return Ok(s.to_string());
    }

    let mut missing: Option<MissingEnvVarError> = None;
    let substituted = ENV_VAR_PATTERN.replace_all(s, |caps: &Captures| {
        let whole = &caps[0];
        if !caps[1].is_empty() {
            // $${VAR} -> ${VAR}
            return whole[1..].to_string();
        }
        let var_name = &caps[2];
        match (env.get(var_name), caps.get(3)) {
            (Some(val), _) if !val.is_empty() => val.clone(),
            (_, Some(fallback)) => fallback.as_str().to_string(),
            _ => {
                missing.get_or_insert_with(|| MissingEnvVarError {
                    var_name: var_name.to_string(),
                    config_path: path.to_string(),
                });
                String::new()
            }
        }
    });

    if let Some(err) = missing {
        bail!(err);
    }
    Ok(substituted.into_owned())
}

/// Check whether a string contains any unescaped env var references.
pub fn contains_env_var_reference(s: &str) -> bool {
    ENV_VAR_PATTERN.captures_iter(s).any(|caps| caps[1].is_empty())
}

/// Collect all env var names referenced in a config value tree (for diagnostics).
pub fn collect_referenced_vars(value: &Value) -> Vec<String> {
    let mut vars = Vec::new();
    collect_vars_recursive(value, &mut vars);
    vars.sort();
    vars.dedup();
    vars
}

fn collect_vars_recursive(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            for caps in ENV_VAR_PATTERN.captures_iter(s) {
                if caps[1].is_empty() {
                    out.push(caps[2].to_string());
                }
            }
        }
        Value::Array(arr) => arr.iter().for_each(|v| collect_vars_recursive(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_vars_recursive(v, out)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn substitutes_simple_var() {
        let v = json!({"model": {"apiKey": "${OPENAI_API_KEY}"}});
        let env = env(&[("OPENAI_API_KEY", "sk-abc123")]);
        let result = resolve_env_vars_with(&v, &env).unwrap();
        assert_eq!(result["model"]["apiKey"], "sk-abc123");
    }

    #[test]
    fn error_on_missing_var_names_path() {
        let v = json!({"perception": {"ocr": {"endpoint": "${OCR_URL}"}}});
        let err = resolve_env_vars_with(&v, &HashMap::new()).unwrap_err().to_string();
        assert!(err.contains("OCR_URL"));
        assert!(err.contains("perception.ocr.endpoint"));
    }

    #[test]
    fn fallback_used_when_unset_or_empty() {
        let v = json!({"url": "${DETECTOR_URL:-http://localhost:9000/detect}"});
        let result = resolve_env_vars_with(&v, &HashMap::new()).unwrap();
        assert_eq!(result["url"], "http://localhost:9000/detect");

        let result = resolve_env_vars_with(&v, &env(&[("DETECTOR_URL", "")])).unwrap();
        assert_eq!(result["url"], "http://localhost:9000/detect");

        let result = resolve_env_vars_with(&v, &env(&[("DETECTOR_URL", "http://gpu:1")])).unwrap();
        assert_eq!(result["url"], "http://gpu:1");
    }

    #[test]
    fn escaped_reference_is_literal() {
        let v = json!({"prompt": "say $${NAME} and ${NAME}"});
        let result = resolve_env_vars_with(&v, &env(&[("NAME", "bob")])).unwrap();
        assert_eq!(result["prompt"], "say ${NAME} and bob");
        assert!(!contains_env_var_reference("$${NAME}"));
    }

    #[test]
    fn passthrough_non_var_strings() {
        let v = json!({"key": "plain $ string", "n": 3});
        let result = resolve_env_vars_with(&v, &HashMap::new()).unwrap();
        assert_eq!(result, v);
    }

    #[test]
    fn collects_referenced_vars() {
        let v = json!({"a": "${FOO}", "b": {"c": ["${BAR:-x}", "$${SKIP}"]}});
        assert_eq!(collect_referenced_vars(&v), ["BAR", "FOO"]);
    }
}
