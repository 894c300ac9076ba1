use serde_json::Value;

use super::ChatError;

/// Build a user-visible error from a failed HTTP response.
///
/// Providers wrap errors in a handful of envelopes:
/// `{ "error": { "message": "..." } }` (OpenAI, Anthropic, OpenRouter, Gemini),
/// `{ "code": "...", "message": "..." }` (DashScope) or `{ "error": "..." }`.
/// HTML error pages and unparseable bodies fall back to a generic message.
pub fn classify_http_error(status: u16, content_type: Option<&str>, body: &str) -> ChatError {
    let is_html = content_type
        .map(|ct| ct.to_ascii_lowercase().contains("text/html"))
        .unwrap_or(false)
        || body.trim_start().starts_with('<');

    let extracted = if is_html {
        None
    } else {
        extract_error_message(body)
    };

    let message = extracted.unwrap_or_else(|| generic_message(status));
    ChatError::api_error(status, message)
}

/// Pull the provider message out of a JSON error body.
pub fn extract_error_message(body: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body.trim()).ok()?;

    let candidate = match json.get("error") {
        Some(Value::Object(obj)) => obj.get("message").and_then(Value::as_str),
        Some(Value::String(s)) => Some(s.as_str()),
        _ => None,
    }
    .or_else(|| json.get("message").and_then(Value::as_str));

    candidate
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn generic_message(status: u16) -> String {
    match status {
        401 | 403 => "Authentication failed, check the API key for this provider".to_string(),
        404 => "The provider endpoint or model was not found".to_string(),
        429 => "Rate limit exceeded, wait a moment and try again".to_string(),
        500..=599 => "The provider service is unavailable, try again later".to_string(),
        _ => format!("Request failed with status {status}"),
    }
}
