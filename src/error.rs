//! Error types for the gateway.
//!
//! Every variant is terminal for the request that raised it. The server turns
//! them into an OpenAI-style error body with a non-2xx status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::translate::openai_types::ChatErrorResponse;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProxyError {
    #[error("request body is empty")]
    EmptyBody,

    #[error("parse payload error: {0}")]
    PayloadParse(#[source] serde_json::Error),

    #[error("deployment config for {model} not found")]
    DeploymentNotFound { model: String },

    #[error("token is empty")]
    MissingCredential,

    #[error("error converting to JSON: {0}")]
    OutboundSerialize(#[source] serde_json::Error),

    #[error("convert request error: {message}")]
    Convert { message: String },

    #[error("upstream request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("failed to read response body: {0}")]
    ResponseRead(#[source] reqwest::Error),

    #[error("failed to unmarshal response body: {0}")]
    ResponseParse(#[source] serde_json::Error),

    #[error("failed to marshal modified response body: {0}")]
    ResponseSerialize(#[source] serde_json::Error),

    #[error("candidate {index} has no content parts")]
    EmptyCandidateContent { index: u32 },

    #[error("upstream returned status {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ProxyError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn convert(msg: impl Into<String>) -> Self {
        Self::Convert {
            message: msg.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::EmptyBody | Self::PayloadParse(_) => StatusCode::BAD_REQUEST,
            Self::DeploymentNotFound { .. } => StatusCode::NOT_FOUND,
            Self::MissingCredential => StatusCode::UNAUTHORIZED,
            Self::Transport(_)
            | Self::ResponseRead(_)
            | Self::ResponseParse(_)
            | Self::ResponseSerialize(_)
            | Self::EmptyCandidateContent { .. } => StatusCode::BAD_GATEWAY,
            Self::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::OutboundSerialize(_)
            | Self::Convert { .. }
            | Self::Config { .. }
            | Self::Io(_)
            | Self::Toml(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for the `error.code` field.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyBody => "empty_body",
            Self::PayloadParse(_) => "payload_parse_error",
            Self::DeploymentNotFound { .. } => "deployment_not_found",
            Self::MissingCredential => "missing_credential",
            Self::OutboundSerialize(_) => "outbound_serialize_error",
            Self::Convert { .. } => "convert_error",
            Self::Transport(_) => "transport_error",
            Self::ResponseRead(_) => "response_read_error",
            Self::ResponseParse(_) => "response_parse_error",
            Self::ResponseSerialize(_) => "response_serialize_error",
            Self::EmptyCandidateContent { .. } => "empty_candidate_content",
            Self::Upstream { .. } => "upstream_error",
            Self::Config { .. } | Self::Io(_) | Self::Toml(_) => "internal_error",
        }
    }

    fn error_type(&self) -> &'static str {
        match self.status().as_u16() {
            401 => "authentication_error",
            400..=499 => "invalid_request_error",
            _ => "api_error",
        }
    }

    pub fn to_error_response(&self) -> ChatErrorResponse {
        ChatErrorResponse::new(self.error_type(), self.code(), self.to_string())
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.to_error_response())).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;
