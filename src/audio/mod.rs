//! Audio adapters: transcription, speech synthesis, and speech text cleanup.

pub mod openai;
mod openai_helpers;
pub mod text;
pub mod transcription;
pub mod tts;
pub mod types;

pub use openai::{OpenAiSpeechSynthesizer, OpenAiTranscriber};
pub use text::{prepare_for_speech, resolve_voice};
pub use transcription::Transcriber;
pub use tts::SpeechSynthesizer;
pub use types::*;
