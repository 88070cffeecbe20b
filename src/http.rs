//! Shared HTTP client, SSE line parsing, and auth utilities.

use std::sync::OnceLock;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::error::VoiceError;

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Get (or create) the shared reqwest client.
///
/// No overall request timeout is set here: chat streams stay open for as long
/// as the backend keeps producing. Callers bound their own requests.
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new())
    })
}

/// Build default headers for a Bearer-token API.
pub fn bearer_headers(api_key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(val) = HeaderValue::from_str(&format!("Bearer {api_key}")) {
        headers.insert(AUTHORIZATION, val);
    }
    headers
}

/// One classified line of a server-sent-event body.
#[derive(Debug, PartialEq, Eq)]
pub enum SseLine<'a> {
    /// A `data:` payload.
    Data(&'a str),
    /// The `data: [DONE]` sentinel.
    Done,
    /// Blank lines, comments, and `event:`/`id:`/`retry:` fields.
    Ignored,
}

/// Classify a single (already trimmed) SSE line.
pub fn parse_sse_line(line: &str) -> SseLine<'_> {
    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Ignored;
    };
    let data = data.trim_start();
    if data == "[DONE]" {
        SseLine::Done
    } else if data.is_empty() {
        SseLine::Ignored
    } else {
        SseLine::Data(data)
    }
}

/// Map a non-success HTTP status (and body) to an error.
pub fn status_to_error(status: u16, body: &str) -> VoiceError {
    match status {
        401 | 403 => VoiceError::Authentication(body.to_string()),
        429 => VoiceError::RateLimited {
            retry_after_ms: extract_retry_after(body),
        },
        _ => VoiceError::api(status, body),
    }
}

fn extract_retry_after(body: &str) -> Option<u64> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("retry_after"))
                .and_then(|r| r.as_f64())
                .map(|s| (s * 1000.0) as u64)
        })
}

/// Pull `error.message` (OpenAI style) or `message` out of a JSON error body.
pub fn extract_error_message(body: &str) -> Option<String> {
    let parsed: serde_json::Value = serde_json::from_str(body).ok()?;
    parsed
        .get("error")
        .and_then(|error| error.get("message").or(Some(error)))
        .or_else(|| parsed.get("message"))
        .and_then(|message| message.as_str())
        .map(ToString::to_string)
}

pub(crate) fn trim_trailing_slash(url: &str) -> &str {
    url.trim_end_matches('/')
}
