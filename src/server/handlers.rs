//! Route handlers.

use std::convert::Infallible;

use axum::body::Body;
use axum::extract::{Multipart, Query, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use futures::StreamExt;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::error::ApiError;
use super::AppState;
use crate::audio::{resolve_voice, AudioFormat};
use crate::chat::decode_conversation;
use crate::config::{CallerKeys, DeploymentMode, SessionContext};
use crate::error::VoiceError;
use crate::events::EventSink;
use crate::orchestrator::VoiceRequest;

pub const DEPLOYMENT_MODE_HEADER: &str = "x-deployment-mode";
pub const OPENAI_KEY_HEADER: &str = "x-openai-api-key";
pub const CUSTOMGPT_KEY_HEADER: &str = "x-customgpt-api-key";
pub const CONVERSATION_HEADER: &str = "conversation";

const DEFAULT_AUDIO_MIME: &str = "audio/webm";

/// Multipart fields of a voice upload.
#[derive(Debug, Default)]
struct VoiceUpload {
    audio: Option<Vec<u8>>,
    mime_type: Option<String>,
    project_id: Option<String>,
    session_id: Option<String>,
    voice: Option<String>,
    persona: Option<String>,
}

impl VoiceUpload {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut upload = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "audio" => {
                    upload.mime_type = field.content_type().map(str::to_string);
                    upload.audio = Some(field.bytes().await?.to_vec());
                }
                "project_id" => upload.project_id = non_blank(field.text().await?),
                "session_id" => upload.session_id = non_blank(field.text().await?),
                "voice" => upload.voice = non_blank(field.text().await?),
                "persona" => upload.persona = non_blank(field.text().await?),
                other => debug!(field = other, "Ignoring unknown upload field"),
            }
        }
        Ok(upload)
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// `POST /voice/stream`: answer a recorded question as a framed event stream.
pub async fn stream_voice(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let upload = VoiceUpload::read(multipart).await?;

    let audio = upload
        .audio
        .filter(|audio| !audio.is_empty())
        .ok_or_else(|| ApiError::bad_request("No audio file provided"))?;
    let project_id = upload
        .project_id
        .or_else(|| state.config.default_project_id.clone())
        .ok_or_else(|| ApiError::bad_request("Missing project_id"))?;
    let session_id = upload
        .session_id
        .ok_or_else(|| ApiError::bad_request("Missing session_id"))?;

    let mode_header = header(&headers, DEPLOYMENT_MODE_HEADER);
    let caller = CallerKeys {
        openai: header(&headers, OPENAI_KEY_HEADER).map(str::to_string),
        customgpt: header(&headers, CUSTOMGPT_KEY_HEADER).map(str::to_string),
    };
    let session = SessionContext::resolve(&state.config, mode_header, &caller).map_err(|e| {
        let mode = mode_header
            .and_then(|m| m.trim().parse::<DeploymentMode>().ok())
            .unwrap_or(state.config.default_mode);
        warn!(error = %e, mode = %mode, "Rejected voice request");
        ApiError::from(e).with_mode(mode)
    })?;

    let conversation = match header(&headers, CONVERSATION_HEADER).map(decode_conversation) {
        Some(Ok(turns)) => turns,
        Some(Err(e)) => {
            warn!(error = %e, "Ignoring malformed conversation header");
            Vec::new()
        }
        None => Vec::new(),
    };

    let request = VoiceRequest {
        audio,
        mime_type: upload
            .mime_type
            .unwrap_or_else(|| DEFAULT_AUDIO_MIME.to_string()),
        project_id,
        session_id,
        voice: resolve_voice(upload.voice.as_deref(), &state.config.default_voice),
        persona: upload.persona,
        conversation,
        session,
    };

    info!(
        bytes = request.audio.len(),
        mime = %request.mime_type,
        mode = %request.session.mode,
        voice = %request.voice,
        history = request.conversation.len(),
        "Starting voice stream"
    );

    let (sink, events) = EventSink::channel();
    let run = state.pipeline.clone().spawn(request, sink);
    tokio::spawn(async move {
        if let Ok(outcome) = run.await {
            debug!(?outcome, "Voice stream finished");
        }
    });

    let body = Body::from_stream(events.map(|event| Ok::<_, Infallible>(event.to_frame())));
    Ok((
        [
            (CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8")),
            (CACHE_CONTROL, HeaderValue::from_static("no-cache")),
        ],
        body,
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct AudioQuery {
    id: Option<String>,
}

/// `GET /voice/stream?id=`: fetch a synthesized clip. Each clip can be fetched once.
pub async fn fetch_audio(
    State(state): State<AppState>,
    Query(query): Query<AudioQuery>,
) -> Result<Response, ApiError> {
    let id = query
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing audio id"))?;

    let bytes = state
        .store
        .take(id)
        .ok_or_else(|| VoiceError::AudioNotFound(format!("Audio {id} not found or expired")))?;

    debug!(audio_id = id, bytes = bytes.len(), "Serving audio clip");
    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, HeaderValue::from_static(AudioFormat::Mp3.mime_type())),
            (CACHE_CONTROL, HeaderValue::from_static("no-store")),
        ],
        bytes,
    )
        .into_response())
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "storedClips": state.store.len(),
    }))
}
