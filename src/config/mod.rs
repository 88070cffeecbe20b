//! Configuration system (layered: defaults < TOML file < env < CLI flags).

pub mod session;

pub use session::{CallerKeys, DeploymentMode, SessionContext};

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, VoiceError};

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_CUSTOMGPT_BASE_URL: &str = "https://app.customgpt.ai/api/v1";

/// Server configuration.
///
/// Every field has a default, so a TOML file only needs the keys it changes.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub bind_addr: SocketAddr,
    pub default_mode: DeploymentMode,
    pub allow_demo_mode: bool,
    pub openai_api_key: Option<String>,
    pub customgpt_api_key: Option<String>,
    pub openai_base_url: String,
    pub customgpt_base_url: String,
    pub default_project_id: Option<String>,
    pub transcription_model: String,
    pub tts_model: String,
    pub default_voice: String,
    /// Target characters per speech chunk.
    pub chunk_target_chars: usize,
    pub audio_retention_secs: u64,
    pub eviction_interval_secs: u64,
    pub max_stored_clips: usize,
    /// Bound on each transcription, synthesis and non-streaming chat call.
    pub request_timeout_secs: u64,
    pub max_upload_bytes: usize,
    pub retry_attempts: u32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3001)),
            default_mode: DeploymentMode::Production,
            allow_demo_mode: true,
            openai_api_key: None,
            customgpt_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            customgpt_base_url: DEFAULT_CUSTOMGPT_BASE_URL.to_string(),
            default_project_id: None,
            transcription_model: "whisper-1".to_string(),
            tts_model: "tts-1".to_string(),
            default_voice: "alloy".to_string(),
            chunk_target_chars: 150,
            audio_retention_secs: 300,
            eviction_interval_secs: 60,
            max_stored_clips: 1000,
            request_timeout_secs: 60,
            max_upload_bytes: 25 * 1024 * 1024,
            retry_attempts: 2,
        }
    }
}

impl std::fmt::Debug for VoiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |key: &Option<String>| key.as_ref().map(|_| "<redacted>");
        f.debug_struct("VoiceConfig")
            .field("bind_addr", &self.bind_addr)
            .field("default_mode", &self.default_mode)
            .field("allow_demo_mode", &self.allow_demo_mode)
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("customgpt_api_key", &redact(&self.customgpt_api_key))
            .field("openai_base_url", &self.openai_base_url)
            .field("customgpt_base_url", &self.customgpt_base_url)
            .field("default_project_id", &self.default_project_id)
            .field("transcription_model", &self.transcription_model)
            .field("tts_model", &self.tts_model)
            .field("default_voice", &self.default_voice)
            .field("chunk_target_chars", &self.chunk_target_chars)
            .field("audio_retention_secs", &self.audio_retention_secs)
            .field("eviction_interval_secs", &self.eviction_interval_secs)
            .field("max_stored_clips", &self.max_stored_clips)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("retry_attempts", &self.retry_attempts)
            .finish()
    }
}

impl VoiceConfig {
    /// Load configuration: optional TOML file, then `.env` and process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error

        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("VOXSTREAM_CONFIG").map(Into::into));

        let mut config = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(&path)?;
                tracing::debug!(path = %path.display(), "Loaded config file");
                Self::from_toml_str(&contents)?
            }
            None => Self::default(),
        };

        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document on top of the defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Override fields from environment variables, read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(key) = non_empty("OPENAI_API_KEY") {
            self.openai_api_key = Some(key);
        }
        if let Some(key) = non_empty("CUSTOMGPT_API_KEY") {
            self.customgpt_api_key = Some(key);
        }
        if let Some(url) = non_empty("OPENAI_BASE_URL") {
            self.openai_base_url = url;
        }
        if let Some(url) = non_empty("CUSTOMGPT_BASE_URL") {
            self.customgpt_base_url = url;
        }
        if let Some(project) = non_empty("CUSTOMGPT_PROJECT_ID") {
            self.default_project_id = Some(project);
        }
        if let Some(voice) = non_empty("VOXSTREAM_VOICE") {
            self.default_voice = voice;
        }
        if let Some(bind) = non_empty("VOXSTREAM_BIND") {
            self.bind_addr = bind.parse().map_err(|e| {
                VoiceError::Configuration(format!("Invalid VOXSTREAM_BIND '{bind}': {e}"))
            })?;
        }
        if let Some(mode) = non_empty("VOXSTREAM_DEPLOYMENT_MODE") {
            self.default_mode = mode.parse().map_err(|_| {
                VoiceError::Configuration(format!("Invalid VOXSTREAM_DEPLOYMENT_MODE '{mode}'"))
            })?;
        }
        if let Some(allow) = non_empty("VOXSTREAM_ALLOW_DEMO") {
            self.allow_demo_mode = matches!(
                allow.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        Ok(())
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_target_chars == 0 {
            return Err(VoiceError::Configuration(
                "chunk_target_chars must be greater than zero".to_string(),
            ));
        }
        if self.audio_retention_secs == 0 || self.eviction_interval_secs == 0 {
            return Err(VoiceError::Configuration(
                "audio_retention_secs and eviction_interval_secs must be greater than zero"
                    .to_string(),
            ));
        }
        if self.max_stored_clips == 0 || self.max_upload_bytes == 0 {
            return Err(VoiceError::Configuration(
                "max_stored_clips and max_upload_bytes must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(VoiceError::Configuration(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.audio_retention_secs < self.eviction_interval_secs {
            tracing::warn!(
                retention_secs = self.audio_retention_secs,
                interval_secs = self.eviction_interval_secs,
                "Audio retention is shorter than the eviction interval"
            );
        }
        Ok(())
    }

    pub fn audio_retention(&self) -> Duration {
        Duration::from_secs(self.audio_retention_secs)
    }

    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs(self.eviction_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
