//! Audio-related types.

use serde::{Deserialize, Serialize};

/// Output format for synthesized speech.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Mp3,
}

impl AudioFormat {
    /// Name used in the `response_format` request field.
    pub fn request_name(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
        }
    }

    /// MIME type served to the browser for stored clips.
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
        }
    }
}

/// Voices accepted by the speech endpoint.
pub const KNOWN_VOICES: &[&str] = &[
    "alloy", "ash", "ballad", "coral", "echo", "fable", "nova", "onyx", "sage", "shimmer",
    "verse",
];

/// Request for speech synthesis.
#[derive(Debug, Clone)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: String,
    pub format: AudioFormat,
    pub speed: f64,
}

impl SpeechRequest {
    /// Standard-speed MP3 request.
    pub fn new(text: impl Into<String>, voice: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: voice.into(),
            format: AudioFormat::Mp3,
            speed: 1.0,
        }
    }
}
