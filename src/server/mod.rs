//! HTTP surface: the voice stream endpoint, clip fetches, and a health probe.

pub mod error;
pub mod handlers;

pub use error::ApiError;

use std::future::Future;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::audio::{OpenAiSpeechSynthesizer, OpenAiTranscriber};
use crate::chat::CustomGptChat;
use crate::config::VoiceConfig;
use crate::error::Result;
use crate::orchestrator::VoicePipeline;
use crate::store::AudioStore;
use crate::util::retry::RetryPolicy;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<VoicePipeline>,
    pub store: Arc<AudioStore>,
    pub config: Arc<VoiceConfig>,
}

impl AppState {
    /// Wrap an already-built pipeline. The store is the one the pipeline writes to.
    pub fn new(config: VoiceConfig, pipeline: VoicePipeline) -> Self {
        let store = Arc::clone(pipeline.store());
        Self {
            pipeline: Arc::new(pipeline),
            store,
            config: Arc::new(config),
        }
    }

    /// Build the production adapters, store and pipeline from configuration.
    pub fn from_config(config: VoiceConfig) -> Self {
        let retry = RetryPolicy::default().with_max_attempts(config.retry_attempts);
        let timeout = config.request_timeout();

        let transcriber = OpenAiTranscriber::new_with_base_url(config.openai_base_url.clone())
            .with_model(config.transcription_model.clone())
            .with_timeout(timeout)
            .with_retry_policy(retry.clone());
        let synthesizer = OpenAiSpeechSynthesizer::new_with_base_url(config.openai_base_url.clone())
            .with_model(config.tts_model.clone())
            .with_timeout(timeout)
            .with_retry_policy(retry);
        let chat = CustomGptChat::new_with_base_url(config.customgpt_base_url.clone())
            .with_timeout(timeout)
            .with_idle_timeout(timeout);
        let store = AudioStore::with_limits(
            config.audio_retention(),
            config.eviction_interval(),
            config.max_stored_clips,
        );

        let pipeline = VoicePipeline::new(
            Arc::new(transcriber),
            Arc::new(chat),
            Arc::new(synthesizer),
            Arc::new(store),
        )
        .with_chunk_target(config.chunk_target_chars);

        Self::new(config, pipeline)
    }
}

/// Routes with the upload limit applied.
pub fn router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes;
    Router::new()
        .route(
            "/voice/stream",
            post(handlers::stream_voice).get(handlers::fetch_audio),
        )
        .route("/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(state)
}

/// Serve until `shutdown` resolves. In-flight streams are allowed to finish.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!(%addr, "Voice server listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!(%addr, "Voice server stopped");
    Ok(())
}
