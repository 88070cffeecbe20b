//! Drives one voice request from recorded clip to completion event.
//!
//! The pipeline transcribes the clip, streams the chat reply, emits each
//! delta as a text event, cuts the reply into speakable chunks, and renders
//! every chunk concurrently. Audio references arrive as their synthesis
//! finishes, so they may be out of chunk order; each carries its `chunkId`.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::audio::{prepare_for_speech, SpeechRequest, SpeechSynthesizer, Transcriber};
use crate::chat::{ChatBackend, ChatRequest, ConversationTurn};
use crate::chunker::{SentenceChunker, DEFAULT_TARGET_CHARS};
use crate::config::SessionContext;
use crate::error::VoiceError;
use crate::events::{EventSink, StreamEvent};
use crate::store::AudioStore;

/// Lifecycle of one request. Each request walks it exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Transcribing,
    Streaming,
    Draining,
    Terminated(Outcome),
}

/// How a request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A completion event was sent.
    Success,
    /// A stream-level error event was sent.
    Error,
    /// The client went away; nothing terminal could be delivered.
    Abandoned,
}

/// One recorded question plus everything needed to answer it.
#[derive(Debug, Clone)]
pub struct VoiceRequest {
    pub audio: Vec<u8>,
    pub mime_type: String,
    pub project_id: String,
    pub session_id: String,
    pub voice: String,
    pub persona: Option<String>,
    pub conversation: Vec<ConversationTurn>,
    pub session: SessionContext,
}

/// The streaming voice pipeline. Cheap to share; holds no per-request state.
pub struct VoicePipeline {
    transcriber: Arc<dyn Transcriber>,
    chat: Arc<dyn ChatBackend>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    store: Arc<AudioStore>,
    chunk_target: usize,
}

impl VoicePipeline {
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        chat: Arc<dyn ChatBackend>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        store: Arc<AudioStore>,
    ) -> Self {
        Self {
            transcriber,
            chat,
            synthesizer,
            store,
            chunk_target: DEFAULT_TARGET_CHARS,
        }
    }

    pub fn with_chunk_target(mut self, chunk_target: usize) -> Self {
        self.chunk_target = chunk_target.max(1);
        self
    }

    pub fn store(&self) -> &Arc<AudioStore> {
        &self.store
    }

    /// Run one request on its own task.
    ///
    /// If the run panics, a stream-level error is sent in place of the
    /// terminal event it never reached.
    pub fn spawn(self: Arc<Self>, request: VoiceRequest, sink: EventSink) -> JoinHandle<Outcome> {
        tokio::spawn(async move {
            let guard = sink.clone();
            let run = tokio::spawn(async move { self.run(request, sink).await });
            match run.await {
                Ok(outcome) => outcome,
                Err(error) => {
                    warn!(error = %error, "Voice pipeline task did not complete");
                    let delivered = guard.finish(StreamEvent::stream_error(
                        "Internal error while answering the request",
                    ));
                    if delivered {
                        Outcome::Error
                    } else {
                        Outcome::Abandoned
                    }
                }
            }
        })
    }

    /// Run one request to completion, writing every event to `sink`.
    ///
    /// Exactly one terminal event is sent, after all synthesis has settled,
    /// unless the client disconnects first.
    pub async fn run(&self, request: VoiceRequest, sink: EventSink) -> Outcome {
        let tasks = SynthesisTasks::new(
            Arc::clone(&self.synthesizer),
            Arc::clone(&self.store),
            request.voice.clone(),
            request.session.synthesis_key.clone(),
            sink.clone(),
        );
        let mut run = Run {
            pipeline: self,
            sink,
            state: PipelineState::Idle,
            chunker: SentenceChunker::new(self.chunk_target),
            tasks,
            full_response: String::new(),
            next_chunk: 0,
        };
        run.execute(request).await
    }
}

struct Run<'a> {
    pipeline: &'a VoicePipeline,
    sink: EventSink,
    state: PipelineState,
    chunker: SentenceChunker,
    tasks: SynthesisTasks,
    full_response: String,
    next_chunk: u32,
}

/// Why the streaming phase stopped early.
enum Interrupt {
    Disconnected,
    Failed(VoiceError),
}

impl Run<'_> {
    fn transition(&mut self, next: PipelineState) {
        debug!(from = ?self.state, to = ?next, "Pipeline transition");
        self.state = next;
    }

    async fn execute(&mut self, request: VoiceRequest) -> Outcome {
        self.transition(PipelineState::Transcribing);
        let transcript = self
            .pipeline
            .transcriber
            .transcribe(&request.audio, &request.mime_type, &request.session.transcription_key)
            .await
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());

        let Some(transcript) = transcript else {
            return self
                .fail(VoiceError::TranscriptionFailed(
                    "No speech could be transcribed from the recording".to_string(),
                ))
                .await;
        };
        info!(chars = transcript.len(), "Transcribed voice request");

        let chat_request = ChatRequest {
            project_id: request.project_id,
            session_id: request.session_id,
            prompt: transcript.clone(),
            persona: request.persona,
            conversation: request.conversation,
        };
        let chat_key = request.session.chat_key;

        self.transition(PipelineState::Streaming);
        match self.stream_reply(&chat_request, &chat_key).await {
            Ok(()) => {}
            Err(Interrupt::Disconnected) => return self.abandon().await,
            Err(Interrupt::Failed(error)) => {
                warn!(error = %error, "Chat stream failed, trying non-streaming fallback");
                match self.fallback(&chat_request, &chat_key).await {
                    Ok(()) => {}
                    Err(Interrupt::Disconnected) => return self.abandon().await,
                    Err(Interrupt::Failed(error)) => {
                        return self.fail(as_chat_failure(error)).await;
                    }
                }
            }
        }

        self.transition(PipelineState::Draining);
        if let Some(chunk) = self.chunker.flush() {
            self.launch(chunk);
        }
        self.tasks.drain().await;

        let delivered = self.sink.finish(StreamEvent::Completion {
            full_response: std::mem::take(&mut self.full_response),
            transcript,
        });
        let outcome = if delivered {
            Outcome::Success
        } else {
            Outcome::Abandoned
        };
        self.transition(PipelineState::Terminated(outcome));
        outcome
    }

    async fn stream_reply(&mut self, request: &ChatRequest, key: &str) -> Result<(), Interrupt> {
        let mut deltas = self
            .pipeline
            .chat
            .stream_chat(request, key)
            .await
            .map_err(Interrupt::Failed)?;

        while let Some(delta) = deltas.next().await {
            let delta = delta.map_err(Interrupt::Failed)?;
            self.deliver(&delta)?;
        }
        Ok(())
    }

    /// One non-streaming retry. Only text beyond what was already sent is delivered.
    async fn fallback(&mut self, request: &ChatRequest, key: &str) -> Result<(), Interrupt> {
        let reply = self
            .pipeline
            .chat
            .complete_chat(request, key)
            .await
            .map_err(Interrupt::Failed)?;

        let Some(remainder) = reply.strip_prefix(self.full_response.as_str()) else {
            return Err(Interrupt::Failed(VoiceError::ChatStreamFailed(
                "Fallback reply does not match the text already delivered".to_string(),
            )));
        };
        if !remainder.is_empty() {
            let remainder = remainder.to_string();
            self.deliver(&remainder)?;
        }
        Ok(())
    }

    fn deliver(&mut self, delta: &str) -> Result<(), Interrupt> {
        if delta.is_empty() {
            return Ok(());
        }
        if !self.sink.emit(StreamEvent::text(self.next_chunk, delta)) {
            return Err(Interrupt::Disconnected);
        }
        self.full_response.push_str(delta);
        for chunk in self.chunker.feed(delta) {
            self.launch(chunk);
        }
        Ok(())
    }

    fn launch(&mut self, chunk: String) {
        let chunk_id = self.next_chunk;
        self.next_chunk += 1;
        self.tasks.spawn(chunk_id, chunk);
    }

    async fn fail(&mut self, error: VoiceError) -> Outcome {
        warn!(error = %error, state = ?self.state, "Voice request failed");
        self.tasks.drain().await;
        let delivered = self.sink.finish(StreamEvent::stream_error(error.to_string()));
        let outcome = if delivered {
            Outcome::Error
        } else {
            Outcome::Abandoned
        };
        self.transition(PipelineState::Terminated(outcome));
        outcome
    }

    async fn abandon(&mut self) -> Outcome {
        info!(pending = self.tasks.len(), "Client disconnected, finishing launched synthesis");
        self.tasks.drain().await;
        self.transition(PipelineState::Terminated(Outcome::Abandoned));
        Outcome::Abandoned
    }
}

fn as_chat_failure(error: VoiceError) -> VoiceError {
    match error {
        VoiceError::ChatStreamFailed(_) => error,
        other => VoiceError::ChatStreamFailed(other.to_string()),
    }
}

/// In-flight synthesis for one request.
///
/// Every task is tracked in a `JoinSet`; [`drain`](Self::drain) awaits all of
/// them, removing each as it settles.
pub struct SynthesisTasks {
    set: JoinSet<()>,
    chunks: HashMap<tokio::task::Id, u32>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    store: Arc<AudioStore>,
    voice: String,
    credential: String,
    sink: EventSink,
}

impl SynthesisTasks {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        store: Arc<AudioStore>,
        voice: String,
        credential: String,
        sink: EventSink,
    ) -> Self {
        Self {
            set: JoinSet::new(),
            chunks: HashMap::new(),
            synthesizer,
            store,
            voice,
            credential,
            sink,
        }
    }

    /// Start rendering `text` as chunk `chunk_id`. Does not wait for it.
    ///
    /// Chunks with nothing speakable (markup only) are skipped.
    pub fn spawn(&mut self, chunk_id: u32, text: String) {
        let speakable = prepare_for_speech(&text);
        if speakable.is_empty() {
            debug!(chunk_id, "Skipping chunk with no speakable text");
            return;
        }

        let synthesizer = Arc::clone(&self.synthesizer);
        let store = Arc::clone(&self.store);
        let sink = self.sink.clone();
        let request = SpeechRequest::new(speakable, self.voice.clone());
        let credential = self.credential.clone();

        let handle = self.set.spawn(async move {
            match synthesizer.synthesize(&request, &credential).await {
                Ok(bytes) => {
                    let audio_id = store.allocate_id(chunk_id);
                    debug!(chunk_id, %audio_id, bytes = bytes.len(), "Chunk synthesized");
                    store.put(audio_id.clone(), bytes);
                    sink.emit(StreamEvent::AudioReference {
                        chunk_id,
                        audio_id,
                        text,
                    });
                }
                Err(error) => {
                    // Chunk failures never end the stream.
                    let error = if error.is_fatal() {
                        VoiceError::SynthesisFailed(error.to_string())
                    } else {
                        error
                    };
                    warn!(chunk_id, error = %error, "Chunk synthesis failed");
                    sink.emit(StreamEvent::chunk_error(chunk_id, error.to_string()));
                }
            }
        });
        self.chunks.insert(handle.id(), chunk_id);
    }

    /// Tasks still running.
    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Wait for every task to settle. A task that panics is reported as a
    /// failure of its chunk.
    pub async fn drain(&mut self) {
        while let Some(result) = self.set.join_next_with_id().await {
            match result {
                Ok((id, ())) => {
                    self.chunks.remove(&id);
                }
                Err(error) => {
                    let Some(chunk_id) = self.chunks.remove(&error.id()) else {
                        continue;
                    };
                    warn!(chunk_id, error = %error, "Synthesis task did not complete");
                    let failure = VoiceError::SynthesisFailed("synthesis task aborted".to_string());
                    self.sink
                        .emit(StreamEvent::chunk_error(chunk_id, failure.to_string()));
                }
            }
        }
    }
}
