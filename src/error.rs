//! Error types for the LLM emulator

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for emulator operations
pub type EmulatorResult<T> = Result<T, EmulatorError>;

/// Main error type for emulator operations
#[derive(Error, Debug, Clone)]
pub enum EmulatorError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        param: Option<String>,
    },

    // Handler registry
    #[error("Handler not registered: {0}")]
    HandlerNotFound(String),

    #[error("Handler '{id}' failed: {message}")]
    Handler { id: String, message: String },

    // Contract validation (strict mode only)
    #[error("Schema violation {name}: {message}")]
    Contract { name: String, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    // Faults selected by the injector that surface as HTTP errors
    #[error("Injected fault: HTTP {status}")]
    Injected {
        status: u16,
        body: serde_json::Value,
        retry_after_secs: Option<u64>,
    },
}

/// OpenAI-compatible error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: &str) -> Self {
        Self {
            error: ErrorDetail {
                message: message.to_string(),
                error_type: error_type.to_string(),
                param: None,
            },
        }
    }

    pub fn with_param(mut self, param: &str) -> Self {
        self.error.param = Some(param.to_string());
        self
    }
}

impl EmulatorError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::HandlerNotFound(_) | Self::Handler { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Contract { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Injected { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    pub fn error_type(&self) -> &str {
        match self {
            Self::Config(_) => "configuration_error",
            Self::Validation { .. } => "invalid_request_error",
            Self::HandlerNotFound(_) | Self::Handler { .. } => "handler_error",
            Self::Contract { .. } => "contract_violation",
            Self::NotFound(_) => "not_found_error",
            Self::Internal(_) => "internal_error",
            Self::Injected { .. } => "api_error",
        }
    }

    pub fn to_error_response(&self) -> ErrorResponse {
        let mut response = ErrorResponse::new(self.error_type(), &self.to_string());

        if let Self::Validation { param: Some(p), .. } = self {
            response = response.with_param(p);
        }

        response
    }
}

impl IntoResponse for EmulatorError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Injected faults carry their own body verbatim
        if let Self::Injected {
            body,
            retry_after_secs,
            ..
        } = self
        {
            let mut response = (status, Json(body)).into_response();
            if let Some(secs) = retry_after_secs {
                if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                    response.headers_mut().insert("retry-after", value);
                }
            }
            return response;
        }

        (status, Json(self.to_error_response())).into_response()
    }
}

impl From<std::io::Error> for EmulatorError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for EmulatorError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation {
            message: err.to_string(),
            param: None,
        }
    }
}
