//! Classification of failed SEMP requests

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// SEMP v2 error code reported (with HTTP 400) when an object does not exist
const SEMP_NOT_FOUND_CODE: i64 = 6;

/// A request that did not produce a success payload.
///
/// `detail` is the broker's response body, kept verbatim (parsed as JSON when
/// possible, otherwise the raw text).
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The addressed object does not exist
    #[error("not found (HTTP {status}): {detail}")]
    NotFound { status: u16, detail: Value },

    /// The broker rejected the request (4xx other than not-found)
    #[error("client error (HTTP {status}): {detail}")]
    Client { status: u16, detail: Value },

    /// The broker failed to handle the request (5xx or unusable response)
    #[error("server error (HTTP {status}): {detail}")]
    Server { status: u16, detail: Value },

    /// No HTTP response was received
    #[error("transport error: {0}")]
    Transport(String),
}

impl ApiError {
    /// Classify a non-success HTTP response
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let detail = parse_detail(body);
        let code = status.as_u16();

        let semp_not_found = semp_error_code(&detail) == Some(SEMP_NOT_FOUND_CODE);
        if status == StatusCode::NOT_FOUND || semp_not_found {
            return ApiError::NotFound { status: code, detail };
        }
        if status.is_server_error() {
            return ApiError::Server { status: code, detail };
        }
        ApiError::Client { status: code, detail }
    }

    /// Whether a caller may reasonably retry the same request
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Server { .. } | ApiError::Transport(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }

    /// HTTP status, if a response was received
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::NotFound { status, .. }
            | ApiError::Client { status, .. }
            | ApiError::Server { status, .. } => Some(*status),
            ApiError::Transport(_) => None,
        }
    }

    /// The broker's original error payload
    pub fn detail(&self) -> Value {
        match self {
            ApiError::NotFound { detail, .. }
            | ApiError::Client { detail, .. }
            | ApiError::Server { detail, .. } => detail.clone(),
            ApiError::Transport(msg) => Value::String(msg.clone()),
        }
    }

    /// `meta.error.code` of a SEMP error body
    pub fn broker_error_code(&self) -> Option<i64> {
        match self {
            ApiError::Transport(_) => None,
            _ => semp_error_code(&self.detail()),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Transport(err.to_string())
    }
}

fn parse_detail(body: &str) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}

fn semp_error_code(detail: &Value) -> Option<i64> {
    detail.pointer("/meta/error/code").and_then(|v| v.as_i64())
}
