//! Log Redaction Layer
//!
//! Scrubs API keys, bearer tokens, and inline image payloads from strings prior to logging.

use regex::Regex;
use std::sync::LazyLock;

static API_KEY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(sk-[a-zA-Z0-9_\-]{20,})|(Bearer\s+[a-zA-Z0-9\-\._~+/]+=*)").unwrap());
static DATA_URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"data:[a-zA-Z0-9.+/\-]+;base64,[A-Za-z0-9+/=]+").unwrap());
static LONG_BASE64_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z0-9+/]{512,}={0,2}").unwrap());

/// Redacts sensitive or bulky patterns in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    // Image payloads first, so a key-like run inside base64 is not half-masked
    let redacted = DATA_URL_RE.replace_all(input, "[REDACTED_IMAGE]");
    let redacted = LONG_BASE64_RE.replace_all(&redacted, "[REDACTED_IMAGE]");
    API_KEY_RE.replace_all(&redacted, "[REDACTED_TOKEN]").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redaction() {
        let raw = "Calling with Bearer eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9 and sk-abcdefghijklmnopqrstuvwxyz012345";
        let clean = redact_sensitive_data(raw);
        assert!(!clean.contains("eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9"));
        assert!(!clean.contains("sk-abcdefghijklmnopqrstuvwxyz012345"));
    }

    #[test]
    fn test_image_payloads_are_dropped() {
        let raw = format!("{{\"url\":\"data:image/png;base64,{}\"}}", "iVBORw0KGgo".repeat(10));
        let clean = redact_sensitive_data(&raw);
        assert_eq!(clean, "{\"url\":\"[REDACTED_IMAGE]\"}");

        let bare = "A".repeat(600);
        assert_eq!(redact_sensitive_data(&bare), "[REDACTED_IMAGE]");
    }

    #[test]
    fn test_plain_text_untouched() {
        let raw = r#"{"labels":"dog, cat"}"#;
        assert_eq!(redact_sensitive_data(raw), raw);
    }
}
