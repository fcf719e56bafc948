//! Shared helpers and constants.

use chrono::Utc;

pub const APP_NAME: &str = "tephra_backend";

/// Display name stamped on records when nothing resolves from the caller's
/// identity metadata.
pub const ANONYMOUS_AUTHOR: &str = "匿名";

pub fn now_utc_iso() -> String {
    Utc::now().to_rfc3339()
}

pub fn print_banner() {
    println!("{} v{}", APP_NAME, env!("CARGO_PKG_VERSION"));
}

/// Caps user-supplied text at `max` characters. Truncation, not rejection;
/// always cuts on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max) {
        Some((idx, _)) => trimmed[..idx].to_string(),
        None => trimmed.to_string(),
    }
}

/// Pulls a human-readable message out of a platform error body, which may
/// be `{"message": ...}`, `{"error": ...}`, or not JSON at all.
pub fn remote_error_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .or_else(|| value.get("error"))
                .and_then(serde_json::Value::as_str)
                .map(String::from)
        })
        .unwrap_or_else(|| format!("remote request failed with status {status}"))
}

/// Lowercase base-36 rendering of a millisecond timestamp, used for
/// fallback-store record ids (`local-<base36 ms>`).
pub fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("  hello  ", 10), "hello");
        assert_eq!(truncate_chars("hello", 3), "hel");
        // multibyte chars must not be split
        assert_eq!(truncate_chars("匿名の投稿", 2), "匿名");
    }

    #[test]
    fn base36_matches_known_values() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        // millisecond-epoch input stays compact
        assert_eq!(to_base36(1_700_000_000_000), "loyw3v28");
    }

    #[test]
    fn remote_error_messages_prefer_structured_fields() {
        let status = reqwest::StatusCode::BAD_REQUEST;
        assert_eq!(
            remote_error_message(status, r#"{"message":"broken"}"#),
            "broken"
        );
        assert_eq!(
            remote_error_message(status, r#"{"error":"denied"}"#),
            "denied"
        );
        assert_eq!(
            remote_error_message(status, "<html>oops</html>"),
            "remote request failed with status 400 Bad Request"
        );
    }
}
