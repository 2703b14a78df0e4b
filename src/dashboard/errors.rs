//! Error classification for calls against the grid service

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use super::lock::Operation;

/// Message shown when the service answers with a body we cannot interpret
pub const MALFORMED_RESPONSE_MESSAGE: &str = "Unexpected response from the grid service";

/// Message shown when the service cannot be reached at all
pub const NETWORK_ERROR_MESSAGE: &str = "Cannot reach the grid service";

/// Classified failure of a single REST call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// Transport-level failure (connection refused, timeout, reset)
    #[error("Network error: {0}")]
    Network(String),

    /// The service answered with a structured `{detail}` error body
    #[error("{message}")]
    Application { status: u16, message: String },

    /// The body could not be parsed into the expected shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl ApiError {
    /// Network failures are transient and suppressed on routine polls
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Network(_))
    }

    /// Message to surface when the error is treated as an application error.
    ///
    /// Malformed bodies count as application errors with a generic message.
    pub fn application_message(&self) -> Option<String> {
        match self {
            ApiError::Network(_) => None,
            ApiError::Application { message, .. } => Some(message.clone()),
            ApiError::MalformedResponse(_) => Some(MALFORMED_RESPONSE_MESSAGE.to_string()),
        }
    }

    /// Text for the operator, whatever the kind
    pub fn user_message(&self) -> String {
        self.application_message()
            .unwrap_or_else(|| NETWORK_ERROR_MESSAGE.to_string())
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

/// Classify a transport error raised before any response arrived
pub fn classify_transport(err: &reqwest::Error) -> ApiError {
    if err.is_decode() {
        return ApiError::MalformedResponse(err.to_string());
    }
    ApiError::Network(err.to_string())
}

/// Classify a non-success response from its status and raw body
pub fn classify_response(status: StatusCode, body: &str) -> ApiError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => ApiError::Application {
            status: status.as_u16(),
            message: parsed.detail,
        },
        Err(_) => ApiError::MalformedResponse(format!(
            "HTTP {} with unparseable body: {}",
            status.as_u16(),
            truncate(body, 200)
        )),
    }
}

/// Classify a success body that failed to deserialize
pub fn classify_decode(err: &serde_json::Error) -> ApiError {
    ApiError::MalformedResponse(err.to_string())
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Result of a single REST call
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Errors returned by dashboard operations
#[derive(Error, Debug, Clone)]
pub enum DashboardError {
    #[error("Another operation is in progress: {current}")]
    Busy { current: Operation },

    #[error("Invalid grid parameters: {0}")]
    InvalidParams(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Server error: {0}")]
    Server(String),
}

impl From<config::ConfigError> for DashboardError {
    fn from(err: config::ConfigError) -> Self {
        DashboardError::Config(err.to_string())
    }
}

impl From<std::io::Error> for DashboardError {
    fn from(err: std::io::Error) -> Self {
        DashboardError::Server(err.to_string())
    }
}

/// Result type for dashboard operations
pub type DashboardResult<T> = std::result::Result<T, DashboardError>;
