//! Shared test helpers and mock adapters.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use voxstream::audio::{SpeechRequest, SpeechSynthesizer, Transcriber};
use voxstream::chat::{ChatBackend, ChatRequest, DeltaStream};
use voxstream::config::{DeploymentMode, SessionContext};
use voxstream::error::{Result, VoiceError};
use voxstream::events::{EventSink, StreamEvent};
use voxstream::orchestrator::{Outcome, VoicePipeline, VoiceRequest};
use voxstream::store::AudioStore;

/// Returns a fixed transcript and counts calls.
pub struct MockTranscriber {
    transcript: Option<String>,
    panics: bool,
    calls: AtomicUsize,
}

impl MockTranscriber {
    pub fn new(transcript: Option<&str>) -> Self {
        Self {
            transcript: transcript.map(String::from),
            panics: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Panics instead of answering.
    pub fn panicking() -> Self {
        Self {
            panics: true,
            ..Self::new(None)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(&self, _audio: &[u8], _mime: &str, _key: &str) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panics {
            panic!("mock transcriber crashed");
        }
        self.transcript.clone()
    }
}

/// One step of a scripted chat stream.
#[derive(Debug, Clone)]
pub enum Step {
    Delta(&'static str),
    Fail(&'static str),
}

/// Replays a scripted delta stream; optionally answers the non-streaming fallback.
pub struct MockChat {
    script: Vec<Step>,
    open_error: Option<&'static str>,
    fallback: Option<std::result::Result<&'static str, &'static str>>,
    stream_calls: AtomicUsize,
    complete_calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockChat {
    pub fn deltas(deltas: &[&'static str]) -> Self {
        Self::scripted(deltas.iter().copied().map(Step::Delta).collect())
    }

    pub fn scripted(script: Vec<Step>) -> Self {
        Self {
            script,
            open_error: None,
            fallback: None,
            stream_calls: AtomicUsize::new(0),
            complete_calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Fail when the stream is opened.
    pub fn failing_to_open(message: &'static str) -> Self {
        Self {
            open_error: Some(message),
            ..Self::scripted(Vec::new())
        }
    }

    pub fn with_fallback(mut self, reply: &'static str) -> Self {
        self.fallback = Some(Ok(reply));
        self
    }

    pub fn with_failing_fallback(mut self, message: &'static str) -> Self {
        self.fallback = Some(Err(message));
        self
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    pub fn complete_calls(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for MockChat {
    async fn stream_chat(&self, request: &ChatRequest, _key: &str) -> Result<DeltaStream> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.prompt.clone());
        if let Some(message) = self.open_error {
            return Err(VoiceError::ChatStreamFailed(message.to_string()));
        }
        let items = self.script.clone().into_iter().map(|step| match step {
            Step::Delta(text) => Ok(text.to_string()),
            Step::Fail(message) => Err(VoiceError::ChatStreamFailed(message.to_string())),
        });
        Ok(futures::stream::iter(items).boxed())
    }

    async fn complete_chat(&self, _request: &ChatRequest, _key: &str) -> Result<String> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        match self.fallback {
            Some(Ok(reply)) => Ok(reply.to_string()),
            Some(Err(message)) => Err(VoiceError::api(502, message)),
            None => Err(VoiceError::ChatStreamFailed("no fallback scripted".to_string())),
        }
    }
}

/// Echoes the text back as "audio" after an optional per-text delay.
#[derive(Default)]
pub struct MockSynthesizer {
    delays: Vec<(&'static str, Duration)>,
    failures: Vec<&'static str>,
    panics: Vec<&'static str>,
    requests: Mutex<Vec<String>>,
}

impl MockSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay synthesis of any text containing `needle`.
    pub fn delay_when(mut self, needle: &'static str, delay: Duration) -> Self {
        self.delays.push((needle, delay));
        self
    }

    /// Fail synthesis of any text containing `needle`.
    pub fn fail_when(mut self, needle: &'static str) -> Self {
        self.failures.push(needle);
        self
    }

    /// Panic while synthesizing any text containing `needle`.
    pub fn panic_when(mut self, needle: &'static str) -> Self {
        self.panics.push(needle);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    async fn synthesize(&self, request: &SpeechRequest, _key: &str) -> Result<Vec<u8>> {
        self.requests.lock().unwrap().push(request.text.clone());
        if let Some((_, delay)) = self.delays.iter().find(|(n, _)| request.text.contains(n)) {
            tokio::time::sleep(*delay).await;
        }
        if self.panics.iter().any(|n| request.text.contains(n)) {
            panic!("mock synthesizer crashed on {:?}", request.text);
        }
        if self.failures.iter().any(|n| request.text.contains(n)) {
            return Err(VoiceError::SynthesisFailed("mock voice unavailable".to_string()));
        }
        Ok(request.text.as_bytes().to_vec())
    }
}

/// Pipeline plus handles on its mocks.
pub struct Harness {
    pub pipeline: Arc<VoicePipeline>,
    pub transcriber: Arc<MockTranscriber>,
    pub chat: Arc<MockChat>,
    pub synthesizer: Arc<MockSynthesizer>,
    pub store: Arc<AudioStore>,
}

impl Harness {
    pub fn new(transcript: Option<&str>, chat: MockChat, synthesizer: MockSynthesizer) -> Self {
        Self::with_chunk_target(transcript, chat, synthesizer, 150)
    }

    pub fn with_chunk_target(
        transcript: Option<&str>,
        chat: MockChat,
        synthesizer: MockSynthesizer,
        chunk_target: usize,
    ) -> Self {
        Self::assemble(MockTranscriber::new(transcript), chat, synthesizer, chunk_target)
    }

    pub fn assemble(
        transcriber: MockTranscriber,
        chat: MockChat,
        synthesizer: MockSynthesizer,
        chunk_target: usize,
    ) -> Self {
        let transcriber = Arc::new(transcriber);
        let chat = Arc::new(chat);
        let synthesizer = Arc::new(synthesizer);
        let store = Arc::new(AudioStore::default());
        let pipeline = VoicePipeline::new(
            transcriber.clone(),
            chat.clone(),
            synthesizer.clone(),
            store.clone(),
        )
        .with_chunk_target(chunk_target);
        Self {
            pipeline: Arc::new(pipeline),
            transcriber,
            chat,
            synthesizer,
            store,
        }
    }

    /// Run one request and collect every event it produced.
    pub async fn run(&self) -> (Outcome, Vec<StreamEvent>) {
        run_pipeline(&self.pipeline, voice_request()).await
    }
}

pub async fn run_pipeline(
    pipeline: &VoicePipeline,
    request: VoiceRequest,
) -> (Outcome, Vec<StreamEvent>) {
    let (sink, stream) = EventSink::channel();
    let outcome = pipeline.run(request, sink).await;
    (outcome, stream.collect().await)
}

pub fn session() -> SessionContext {
    SessionContext {
        mode: DeploymentMode::Production,
        transcription_key: "sk-test".to_string(),
        chat_key: "cg-test".to_string(),
        synthesis_key: "sk-test".to_string(),
    }
}

pub fn voice_request() -> VoiceRequest {
    VoiceRequest {
        audio: b"fake-webm".to_vec(),
        mime_type: "audio/webm".to_string(),
        project_id: "p1".to_string(),
        session_id: "s1".to_string(),
        voice: "alloy".to_string(),
        persona: None,
        conversation: Vec::new(),
        session: session(),
    }
}

pub fn audio_ids(events: &[StreamEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            StreamEvent::AudioReference { audio_id, .. } => Some(audio_id.clone()),
            _ => None,
        })
        .collect()
}

/// Hand-built `multipart/form-data` body. Returns (content type, body).
pub fn multipart_body(fields: &[(&str, &[u8], Option<&str>)]) -> (String, Vec<u8>) {
    let boundary = "voxstream-test-boundary";
    let mut body = Vec::new();
    for (name, value, content_type) in fields {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        match content_type {
            Some(content_type) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"clip\"\r\n\
                         Content-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
            }
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            ),
        }
        body.extend_from_slice(value);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}
