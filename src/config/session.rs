//! Per-request deployment context and credential resolution.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::VoiceConfig;
use crate::error::{Result, VoiceError};

/// Where a request's API keys come from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DeploymentMode {
    /// Keys are supplied by the caller in request headers.
    Demo,
    /// Keys are resolved from server configuration.
    Production,
}

/// Keys the caller sent with the request (demo mode only).
#[derive(Default, Clone)]
pub struct CallerKeys {
    pub openai: Option<String>,
    pub customgpt: Option<String>,
}

/// Credentials for one request. Read-only once resolved.
#[derive(Clone)]
pub struct SessionContext {
    pub mode: DeploymentMode,
    pub transcription_key: String,
    pub chat_key: String,
    pub synthesis_key: String,
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("mode", &self.mode)
            .field("transcription_key", &"<redacted>")
            .field("chat_key", &"<redacted>")
            .field("synthesis_key", &"<redacted>")
            .finish()
    }
}

impl SessionContext {
    /// Resolve the credentials for one request.
    ///
    /// `mode` is the raw `X-Deployment-Mode` header value, if any.
    pub fn resolve(
        config: &VoiceConfig,
        mode: Option<&str>,
        caller: &CallerKeys,
    ) -> Result<Self> {
        let mode = match mode.map(str::trim).filter(|m| !m.is_empty()) {
            Some(raw) => raw.parse::<DeploymentMode>().map_err(|_| {
                VoiceError::InvalidArgument(format!("Unknown deployment mode '{raw}'"))
            })?,
            None => config.default_mode,
        };

        let (openai, customgpt) = match mode {
            DeploymentMode::Demo => {
                if !config.allow_demo_mode {
                    return Err(VoiceError::InvalidArgument(
                        "Demo mode is disabled on this server".to_string(),
                    ));
                }
                (caller.openai.as_deref(), caller.customgpt.as_deref())
            }
            DeploymentMode::Production => (
                config.openai_api_key.as_deref(),
                config.customgpt_api_key.as_deref(),
            ),
        };

        let openai = present(openai).ok_or_else(|| missing(mode, "OpenAI API key"))?;
        let customgpt = present(customgpt).ok_or_else(|| missing(mode, "CustomGPT API key"))?;

        Ok(Self {
            mode,
            transcription_key: openai.to_string(),
            chat_key: customgpt.to_string(),
            synthesis_key: openai.to_string(),
        })
    }
}

fn present(key: Option<&str>) -> Option<&str> {
    key.map(str::trim).filter(|k| !k.is_empty())
}

fn missing(mode: DeploymentMode, what: &str) -> VoiceError {
    let source = match mode {
        DeploymentMode::Demo => "request headers",
        DeploymentMode::Production => "server configuration",
    };
    VoiceError::CredentialMissing(format!("{what} not found in {source} ({mode} mode)"))
}
