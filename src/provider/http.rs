//! Shared HTTP client, line framing, and status mapping.

use std::sync::OnceLock;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::error::BackendError;

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Get (or create) the shared reqwest client.
///
/// No overall request timeout: generations may stream for minutes. Only the
/// connection phase is bounded.
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .build()
            .expect("Failed to build HTTP client")
    })
}

/// Build default headers for a JSON API, with a Bearer token when one is set.
pub fn json_headers(api_key: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(key) = api_key.filter(|k| !k.is_empty()) {
        if let Ok(val) = HeaderValue::from_str(&format!("Bearer {key}")) {
            headers.insert(AUTHORIZATION, val);
        }
    }
    headers
}

/// Parse an SSE "data:" line, returning None for "[DONE]" and non-data lines.
pub fn parse_sse_data(line: &str) -> Option<&str> {
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return None;
    }
    Some(data)
}

/// Pop the next complete line off `buffer`, decoded and trimmed.
///
/// Bytes stay buffered until their newline arrives, so a multi-byte character
/// split across network chunks is decoded whole.
pub fn next_line(buffer: &mut Vec<u8>) -> Option<Result<String, BackendError>> {
    let line_end = buffer.iter().position(|b| *b == b'\n')?;
    let line: Vec<u8> = buffer.drain(..=line_end).collect();
    Some(
        String::from_utf8(line)
            .map(|line| line.trim().to_string())
            .map_err(|e| BackendError::StreamInterrupted(format!("invalid UTF-8 in stream: {e}"))),
    )
}

/// The error for a body that closed before the backend's end-of-stream marker.
pub fn truncated_stream() -> BackendError {
    BackendError::StreamInterrupted("stream ended before completion".into())
}

/// Map a non-success HTTP status to a backend error.
pub fn status_to_error(status: u16, body: &str) -> BackendError {
    let message = format!("status {status}: {}", extract_error_message(body));
    match status {
        401 | 403 => BackendError::AuthenticationFailed(message),
        408 | 429 | 500..=599 => BackendError::Unavailable(message),
        _ => BackendError::InvalidRequest(message),
    }
}

/// Pull `error.message` (OpenAI) or `error` (Ollama) out of a JSON error body,
/// falling back to the raw body.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            let error = v.get("error")?;
            error
                .get("message")
                .and_then(|m| m.as_str())
                .or_else(|| error.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}
