//! Convenience re-exports for common use.

pub use crate::audio::{SpeechRequest, SpeechSynthesizer, Transcriber};
pub use crate::chat::{ChatBackend, ChatRequest, ConversationTurn, DeltaStream, TurnRole};
pub use crate::config::{DeploymentMode, SessionContext, VoiceConfig};
pub use crate::error::{Result, VoiceError};
pub use crate::events::{EventSink, EventStream, StreamEvent};
pub use crate::orchestrator::{Outcome, VoicePipeline, VoiceRequest};
pub use crate::store::AudioStore;
