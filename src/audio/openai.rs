//! OpenAI audio adapters (Whisper transcription + TTS).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use tracing::{debug, warn};
use uuid::Uuid;

use super::openai_helpers::{
    build_transcription_multipart, content_type_matches_expected_audio, normalize_mime_type,
    transcription_extension_for_mime,
};
use super::transcription::Transcriber;
use super::tts::SpeechSynthesizer;
use super::types::{AudioFormat, SpeechRequest};
use crate::error::VoiceError;
use crate::http::{
    bearer_headers, extract_error_message, shared_client, status_to_error, trim_trailing_slash,
};
use crate::util::retry::RetryPolicy;
use crate::util::timeout::with_timeout;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_WHISPER_MODEL: &str = "whisper-1";
const DEFAULT_TTS_MODEL: &str = "tts-1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Whisper transcription adapter (`/audio/transcriptions`).
#[derive(Debug, Clone)]
pub struct OpenAiTranscriber {
    base_url: String,
    model: String,
    timeout: Duration,
    retry_policy: RetryPolicy,
}

impl Default for OpenAiTranscriber {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenAiTranscriber {
    pub fn new() -> Self {
        Self::new_with_base_url(DEFAULT_BASE_URL)
    }

    pub fn new_with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: DEFAULT_WHISPER_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Transcribe, surfacing the reason for any failure.
    pub async fn try_transcribe(
        &self,
        audio: &[u8],
        mime_type: &str,
        credential: &str,
    ) -> Result<String, VoiceError> {
        let (mime_type, extension) = self.validate_inputs(audio, mime_type, credential)?;
        self.retry_policy
            .execute(|| self.transcribe_once(audio, &mime_type, extension, credential))
            .await
    }

    fn validate_inputs(
        &self,
        audio: &[u8],
        mime_type: &str,
        credential: &str,
    ) -> Result<(String, &'static str), VoiceError> {
        if credential.trim().is_empty() {
            return Err(VoiceError::CredentialMissing(
                "Missing OpenAI API key for transcription".to_string(),
            ));
        }
        if audio.is_empty() {
            return Err(VoiceError::InvalidArgument(
                "Audio payload cannot be empty".to_string(),
            ));
        }

        let normalized = normalize_mime_type(mime_type)
            .ok_or_else(|| VoiceError::InvalidArgument("MIME type cannot be empty".to_string()))?;
        let extension = transcription_extension_for_mime(&normalized).ok_or_else(|| {
            VoiceError::InvalidArgument(format!("Unsupported transcription MIME type: {normalized}"))
        })?;

        Ok((normalized, extension))
    }

    async fn transcribe_once(
        &self,
        audio: &[u8],
        mime_type: &str,
        extension: &str,
        credential: &str,
    ) -> Result<String, VoiceError> {
        let boundary = format!("voxstream-{}", Uuid::new_v4().simple());
        let body = build_transcription_multipart(&boundary, &self.model, audio, mime_type, extension);

        let mut headers = bearer_headers(credential);
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_str(&format!("multipart/form-data; boundary={boundary}")).map_err(
                |e| VoiceError::InvalidArgument(format!("Failed to build multipart content-type: {e}")),
            )?,
        );

        let url = format!("{}/audio/transcriptions", trim_trailing_slash(&self.base_url));
        debug!(bytes = audio.len(), mime_type, model = %self.model, "Transcribing clip");

        with_timeout(self.timeout, async {
            let response = shared_client()
                .post(url)
                .headers(headers)
                .body(body)
                .send()
                .await?;

            let status = response.status().as_u16();
            let text = response.text().await?;
            if !(200..300).contains(&status) {
                return Err(status_to_error(status, &text));
            }
            Ok(text.trim().to_string())
        })
        .await
    }
}

#[async_trait]
impl Transcriber for OpenAiTranscriber {
    async fn transcribe(
        &self,
        audio: &[u8],
        mime_type: &str,
        credential: &str,
    ) -> Option<String> {
        match self.try_transcribe(audio, mime_type, credential).await {
            Ok(text) => Some(text),
            Err(error) => {
                warn!(error = %error, "Transcription failed");
                None
            }
        }
    }
}

/// OpenAI text-to-speech adapter (`/audio/speech`).
#[derive(Debug, Clone)]
pub struct OpenAiSpeechSynthesizer {
    base_url: String,
    model: String,
    timeout: Duration,
    retry_policy: RetryPolicy,
}

impl Default for OpenAiSpeechSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenAiSpeechSynthesizer {
    pub fn new() -> Self {
        Self::new_with_base_url(DEFAULT_BASE_URL)
    }

    pub fn new_with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: DEFAULT_TTS_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    fn validate_request(&self, request: &SpeechRequest, credential: &str) -> Result<(), VoiceError> {
        if credential.trim().is_empty() {
            return Err(VoiceError::CredentialMissing(
                "Missing OpenAI API key for speech synthesis".to_string(),
            ));
        }
        if request.text.trim().is_empty() {
            return Err(VoiceError::InvalidArgument(
                "Speech text cannot be empty".to_string(),
            ));
        }
        if request.voice.trim().is_empty() {
            return Err(VoiceError::InvalidArgument(
                "Voice id cannot be empty".to_string(),
            ));
        }
        if !request.speed.is_finite() || !(0.25..=4.0).contains(&request.speed) {
            return Err(VoiceError::InvalidArgument(
                "Speech speed must be between 0.25 and 4.0".to_string(),
            ));
        }
        Ok(())
    }

    async fn synthesize_once(
        &self,
        request: &SpeechRequest,
        credential: &str,
    ) -> Result<Vec<u8>, VoiceError> {
        let payload = serde_json::json!({
            "model": self.model,
            "input": request.text,
            "voice": request.voice,
            "response_format": request.format.request_name(),
            "speed": request.speed,
        });

        let url = format!("{}/audio/speech", trim_trailing_slash(&self.base_url));
        let headers = bearer_headers(credential);

        with_timeout(self.timeout, async {
            let response = shared_client()
                .post(url)
                .headers(headers)
                .json(&payload)
                .send()
                .await?;

            parse_speech_response(response, request.format).await
        })
        .await
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSpeechSynthesizer {
    async fn synthesize(
        &self,
        request: &SpeechRequest,
        credential: &str,
    ) -> Result<Vec<u8>, VoiceError> {
        self.validate_request(request, credential)?;
        self.retry_policy
            .execute(|| self.synthesize_once(request, credential))
            .await
    }
}

async fn parse_speech_response(
    response: reqwest::Response,
    format: AudioFormat,
) -> Result<Vec<u8>, VoiceError> {
    let status = response.status().as_u16();
    if !(200..300).contains(&status) {
        let body = response.text().await.unwrap_or_default();
        return Err(status_to_error(status, &body));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("application/json") {
        let body = response.text().await.unwrap_or_default();
        if let Some(message) = extract_error_message(&body) {
            return Err(VoiceError::Provider {
                provider: "openai".to_string(),
                message,
            });
        }
        return Err(VoiceError::SynthesisFailed(
            "Expected audio payload, got JSON response".to_string(),
        ));
    }

    if !content_type_matches_expected_audio(&content_type, format) {
        return Err(VoiceError::SynthesisFailed(format!(
            "Unexpected speech response MIME type '{content_type}' for format {format:?}"
        )));
    }

    let bytes = response.bytes().await?;
    if bytes.is_empty() {
        return Err(VoiceError::SynthesisFailed(
            "Speech response contained empty audio payload".to_string(),
        ));
    }

    Ok(bytes.to_vec())
}
