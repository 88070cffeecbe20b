//! Error types for the voice pipeline.

use thiserror::Error;

/// Primary error type for all voxstream operations.
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Missing credential: {0}")]
    CredentialMissing(String),

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("Chat stream failed: {0}")]
    ChatStreamFailed(String),

    #[error("Speech synthesis failed: {0}")]
    SynthesisFailed(String),

    #[error("Audio not found: {0}")]
    AudioNotFound(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rate limited: retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Provider error: {provider} — {message}")]
    Provider { provider: String, message: String },
}

/// Coarse classification used for retry and status decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    RateLimit,
    Network,
    Timeout,
    Server,
    Api,
    Configuration,
    Serialization,
    Pipeline,
    Client,
    Unknown,
}

impl VoiceError {
    /// Create an API error from an upstream status and body.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Authentication(_) | Self::CredentialMissing(_) => ErrorCategory::Authentication,
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::Network(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Configuration(_) | Self::ConfigParse(_) => ErrorCategory::Configuration,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                429 => ErrorCategory::RateLimit,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
            Self::TranscriptionFailed(_)
            | Self::ChatStreamFailed(_)
            | Self::SynthesisFailed(_) => ErrorCategory::Pipeline,
            Self::InvalidArgument(_) | Self::AudioNotFound(_) => ErrorCategory::Client,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Whether this error is potentially retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::RateLimit
                | ErrorCategory::Network
                | ErrorCategory::Timeout
                | ErrorCategory::Server
        )
    }

    /// Whether this error ends the whole stream.
    ///
    /// Synthesis failures are scoped to one chunk and a missing clip only
    /// fails the GET that asked for it.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::SynthesisFailed(_) | Self::AudioNotFound(_))
    }

    /// Message suitable for showing to an end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::CredentialMissing(_) => {
                "Voice features are not configured. Please provide the required API keys."
            }
            Self::TranscriptionFailed(_) => {
                "We couldn't understand the recording. Please try speaking again."
            }
            Self::ChatStreamFailed(_) => "The assistant could not respond. Please try again.",
            Self::SynthesisFailed(_) => "Part of the spoken response could not be played.",
            Self::AudioNotFound(_) => "This audio clip has expired.",
            Self::InvalidArgument(_) => "The request was invalid.",
            _ => "Something went wrong. Please try again.",
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, VoiceError>;
