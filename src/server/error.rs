//! JSON error responses for requests rejected before streaming starts.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

use crate::config::DeploymentMode;
use crate::error::VoiceError;

/// An error returned as `{error, userMessage?, deploymentMode?}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deployment_mode: Option<DeploymentMode>,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: error.into(),
                user_message: None,
                deployment_mode: None,
            },
        }
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    /// Attach the deployment mode the request was resolved under.
    pub fn with_mode(mut self, mode: DeploymentMode) -> Self {
        self.body.deployment_mode = Some(mode);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<VoiceError> for ApiError {
    fn from(error: VoiceError) -> Self {
        let status = match &error {
            VoiceError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            VoiceError::CredentialMissing(_) => StatusCode::SERVICE_UNAVAILABLE,
            VoiceError::AudioNotFound(_) => StatusCode::NOT_FOUND,
            VoiceError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let user_message = match &error {
            VoiceError::CredentialMissing(_) => Some(error.user_message().to_string()),
            _ => None,
        };
        Self {
            status,
            body: ErrorBody {
                error: error.to_string(),
                user_message,
                deployment_mode: None,
            },
        }
    }
}

impl From<axum::extract::multipart::MultipartError> for ApiError {
    fn from(error: axum::extract::multipart::MultipartError) -> Self {
        Self::new(error.status(), format!("Malformed upload: {}", error.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
