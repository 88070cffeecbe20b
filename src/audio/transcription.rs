//! Speech-to-text trait.

use async_trait::async_trait;

/// Turns a recorded clip into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe `audio` using `credential`.
    ///
    /// Returns `None` when the service could not produce a transcript; the
    /// failure is logged, never raised.
    async fn transcribe(&self, audio: &[u8], mime_type: &str, credential: &str)
        -> Option<String>;
}
