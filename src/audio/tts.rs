//! Text-to-speech trait.

use async_trait::async_trait;

use super::types::SpeechRequest;
use crate::error::VoiceError;

/// Renders one chunk of text to audio bytes.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `request` using `credential`.
    async fn synthesize(
        &self,
        request: &SpeechRequest,
        credential: &str,
    ) -> Result<Vec<u8>, VoiceError>;
}
