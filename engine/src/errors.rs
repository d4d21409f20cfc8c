//! Error formatting for failed requests.
//!
//! This module turns backend failures into short user-facing messages.

use serde_json::Value;

use crate::backend::BackendError;

const MAX_DETAIL_CHARS: usize = 200;

/// Pull a human-readable message out of a JSON error body.
#[must_use]
pub fn extract_error_message(body: &str) -> Option<String> {
    let payload: Value = serde_json::from_str(body.trim()).ok()?;
    payload
        .pointer("/error/message")
        .and_then(Value::as_str)
        .or_else(|| {
            payload
                .pointer("/response/error/message")
                .and_then(Value::as_str)
        })
        .or_else(|| payload.pointer("/message").and_then(Value::as_str))
        .or_else(|| payload.as_str())
        .map(ToString::to_string)
}

#[must_use]
pub fn is_auth_error(raw: &str) -> bool {
    let lower = raw.to_ascii_lowercase();
    let mentions_key =
        lower.contains("api key") || lower.contains("x-api-key") || lower.contains("authorization");
    let auth_words = lower.contains("invalid")
        || lower.contains("incorrect")
        || lower.contains("missing")
        || lower.contains("unauthorized")
        || lower.contains("authentication");

    lower.contains("invalid_api_key") || (mentions_key && auth_words)
}

/// Truncate to `max_chars` characters, marking the cut with an ellipsis.
#[must_use]
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Format a backend failure for the chat error line.
#[must_use]
pub fn format_request_failed(error: &BackendError) -> String {
    match error {
        BackendError::Transport(detail) | BackendError::Rejected(detail) => {
            format!("Request failed: {}", detail_or_unknown(detail))
        }
        BackendError::Api { status, body } => {
            let extracted = extract_error_message(body).unwrap_or_else(|| body.trim().to_string());
            if *status == 401 || is_auth_error(&extracted) {
                return format!(
                    "Request failed ({status}): authentication rejected. Check the API key of the active api config."
                );
            }
            format!("Request failed ({status}): {}", detail_or_unknown(&extracted))
        }
    }
}

fn detail_or_unknown(detail: &str) -> String {
    let trimmed = detail.trim();
    if trimmed.is_empty() {
        "unknown error".to_string()
    } else {
        truncate_with_ellipsis(trimmed, MAX_DETAIL_CHARS)
    }
}
