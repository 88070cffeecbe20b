//! CustomGPT.ai conversation messages API.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use tracing::debug;

use super::{ChatBackend, ChatRequest, DeltaStream, TurnRole};
use crate::error::{Result, VoiceError};
use crate::http::{
    bearer_headers, parse_sse_line, shared_client, status_to_error, trim_trailing_slash, SseLine,
};
use crate::util::timeout::with_timeout;

const DEFAULT_BASE_URL: &str = "https://app.customgpt.ai/api/v1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_CONTEXT_TURNS: usize = 6;

/// Streaming chat against a CustomGPT project conversation.
#[derive(Debug, Clone)]
pub struct CustomGptChat {
    base_url: String,
    timeout: Duration,
    idle_timeout: Duration,
}

impl Default for CustomGptChat {
    fn default() -> Self {
        Self::new()
    }
}

impl CustomGptChat {
    pub fn new() -> Self {
        Self::new_with_base_url(DEFAULT_BASE_URL)
    }

    pub fn new_with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    /// Bound on the non-streaming call and on opening a stream.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Longest silence tolerated between two body chunks of a stream.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    fn messages_url(&self, request: &ChatRequest) -> String {
        format!(
            "{}/projects/{}/conversations/{}/messages",
            trim_trailing_slash(&self.base_url),
            request.project_id,
            request.session_id
        )
    }

    fn build_request_body(&self, request: &ChatRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "prompt": render_prompt(request),
            "stream": stream,
            "response_source": "default",
        });
        if let Some(persona) = request.persona.as_deref().filter(|p| !p.trim().is_empty()) {
            body["custom_persona"] = serde_json::json!(persona);
        }
        body
    }

    fn validate(request: &ChatRequest, credential: &str) -> Result<()> {
        if credential.trim().is_empty() {
            return Err(VoiceError::CredentialMissing(
                "Missing CustomGPT API key".to_string(),
            ));
        }
        if request.project_id.trim().is_empty() || request.session_id.trim().is_empty() {
            return Err(VoiceError::InvalidArgument(
                "Chat request needs a project id and a session id".to_string(),
            ));
        }
        if request.prompt.trim().is_empty() {
            return Err(VoiceError::InvalidArgument(
                "Chat prompt cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ChatBackend for CustomGptChat {
    async fn stream_chat(&self, request: &ChatRequest, credential: &str) -> Result<DeltaStream> {
        Self::validate(request, credential)?;
        let url = self.messages_url(request);
        let body = self.build_request_body(request, true);

        debug!(project = %request.project_id, session = %request.session_id, "CustomGPT stream_chat");

        let resp = with_timeout(self.timeout, async {
            Ok(shared_client()
                .post(&url)
                .headers(bearer_headers(credential))
                .json(&body)
                .send()
                .await?)
        })
        .await?;

        let status = resp.status().as_u16();
        if !(200..300).contains(&status) {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        let idle_timeout = self.idle_timeout;
        let byte_stream = resp.bytes_stream();

        let stream = async_stream::stream! {
            let mut buffer: Vec<u8> = Vec::new();
            let mut finished = false;
            futures::pin_mut!(byte_stream);

            'read: loop {
                let chunk = match tokio::time::timeout(idle_timeout, byte_stream.next()).await {
                    Ok(Some(Ok(chunk))) => chunk,
                    Ok(Some(Err(e))) => {
                        yield Err(VoiceError::ChatStreamFailed(format!("Connection error: {e}")));
                        return;
                    }
                    Ok(None) => break,
                    Err(_) => {
                        yield Err(VoiceError::ChatStreamFailed(format!(
                            "No data from chat stream for {}ms",
                            idle_timeout.as_millis()
                        )));
                        return;
                    }
                };

                buffer.extend_from_slice(&chunk);

                while let Some(line_end) = buffer.iter().position(|b| *b == b'\n') {
                    let raw: Vec<u8> = buffer.drain(..=line_end).collect();
                    let line = String::from_utf8_lossy(&raw);
                    match parse_frame(line.trim()) {
                        Ok(Frame::Delta(text)) => yield Ok(text),
                        Ok(Frame::Finish) => {
                            finished = true;
                            break 'read;
                        }
                        Ok(Frame::Skip) => {}
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }
            }

            if !finished {
                // A final line without a trailing newline can still carry the marker.
                let line = String::from_utf8_lossy(&buffer).trim().to_string();
                match parse_frame(&line) {
                    Ok(Frame::Finish) => {}
                    Ok(Frame::Delta(_)) | Ok(Frame::Skip) => {
                        yield Err(VoiceError::ChatStreamFailed(
                            "Chat stream closed before completion marker".to_string(),
                        ));
                    }
                    Err(e) => yield Err(e),
                }
            }
        };

        Ok(Box::pin(stream))
    }

    async fn complete_chat(&self, request: &ChatRequest, credential: &str) -> Result<String> {
        Self::validate(request, credential)?;
        let url = self.messages_url(request);
        let body = self.build_request_body(request, false);

        debug!(project = %request.project_id, session = %request.session_id, "CustomGPT complete_chat");

        with_timeout(self.timeout, async {
            let resp = shared_client()
                .post(&url)
                .headers(bearer_headers(credential))
                .json(&body)
                .send()
                .await?;

            let status = resp.status().as_u16();
            if !(200..300).contains(&status) {
                let body_text = resp.text().await.unwrap_or_default();
                return Err(status_to_error(status, &body_text));
            }

            let data: MessageResponse = resp.json().await?;
            Ok(data.data.openai_response)
        })
        .await
    }
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    data: MessageData,
}

#[derive(Debug, Deserialize)]
struct MessageData {
    #[serde(default)]
    openai_response: String,
}

#[derive(Debug, Deserialize)]
struct StreamFrame {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum Frame {
    Delta(String),
    Finish,
    Skip,
}

fn parse_frame(line: &str) -> Result<Frame> {
    let data = match parse_sse_line(line) {
        SseLine::Data(data) => data,
        SseLine::Done => return Ok(Frame::Finish),
        SseLine::Ignored => return Ok(Frame::Skip),
    };

    let frame: StreamFrame = serde_json::from_str(data)
        .map_err(|e| VoiceError::ChatStreamFailed(format!("Malformed stream frame: {e}")))?;

    match frame.status.as_deref() {
        Some("progress") => match frame.message {
            Some(text) if !text.is_empty() => Ok(Frame::Delta(text)),
            _ => Ok(Frame::Skip),
        },
        Some("finish") => Ok(Frame::Finish),
        Some("error") => Err(VoiceError::ChatStreamFailed(
            frame
                .message
                .unwrap_or_else(|| "Upstream reported an error".to_string()),
        )),
        other => {
            debug!(status = ?other, "Skipping chat stream frame");
            Ok(Frame::Skip)
        }
    }
}

/// The spoken question, preceded by recent conversation turns when there are any.
fn render_prompt(request: &ChatRequest) -> String {
    if request.conversation.is_empty() {
        return request.prompt.clone();
    }

    let skip = request.conversation.len().saturating_sub(MAX_CONTEXT_TURNS);
    let mut prompt = String::from("Previous conversation:\n");
    for turn in request.conversation.iter().skip(skip) {
        let speaker = match turn.role {
            TurnRole::User => "User",
            TurnRole::Assistant => "Assistant",
        };
        prompt.push_str(speaker);
        prompt.push_str(": ");
        prompt.push_str(turn.content.trim());
        prompt.push('\n');
    }
    prompt.push_str("\nCurrent question: ");
    prompt.push_str(&request.prompt);
    prompt
}
