//! Chat-completion streaming against the RAG backend.

pub mod customgpt;

pub use customgpt::CustomGptChat;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VoiceError};

/// Lazy, finite stream of text deltas. Not restartable.
pub type DeltaStream = BoxStream<'static, Result<String>>;

/// Who said a prior turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One prior turn of the conversation, as sent by the voice widget.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
}

/// Everything the backend needs to answer one spoken question.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub project_id: String,
    pub session_id: String,
    pub prompt: String,
    pub persona: Option<String>,
    pub conversation: Vec<ConversationTurn>,
}

/// A chat-completion backend that can stream.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Open a streaming completion. Deltas arrive in backend order.
    async fn stream_chat(&self, request: &ChatRequest, credential: &str) -> Result<DeltaStream>;

    /// Non-streaming completion, used once as a fallback when streaming fails.
    async fn complete_chat(&self, request: &ChatRequest, credential: &str) -> Result<String>;
}

/// Decode the `conversation` header: base64 of a JSON array of turns.
pub fn decode_conversation(encoded: &str) -> Result<Vec<ConversationTurn>> {
    let encoded = encoded.trim();
    if encoded.is_empty() {
        return Ok(Vec::new());
    }
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| VoiceError::InvalidArgument(format!("conversation is not base64: {e}")))?;
    Ok(serde_json::from_slice(&bytes)?)
}
