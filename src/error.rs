//! Error types and handling for the aturi resolver

use crate::atproto::uri::ClassificationError;
use serde::Serialize;
use std::fmt;

/// Application error types
#[derive(Debug, Serialize)]
pub enum AppError {
    InvalidInput(String),
    DidResolveFailed(String),
    UnsupportedDidMethod(String),
    RecordFetchFailed(String),
    NotFound(String),
    NetworkError(String),
    UpstreamStatus(String),
    Timeout(String),
    ParseError(String),
    ConfigError(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            AppError::DidResolveFailed(msg) => write!(f, "Could not resolve identifier: {}", msg),
            AppError::UnsupportedDidMethod(method) => {
                write!(f, "Unsupported DID method: {}", method)
            }
            AppError::RecordFetchFailed(msg) => write!(f, "Record fetch failed: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            AppError::UpstreamStatus(msg) => write!(f, "Upstream error: {}", msg),
            AppError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            AppError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// Get the error code used in JSON responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "invalid_input",
            AppError::DidResolveFailed(_) => "did_resolve_failed",
            AppError::UnsupportedDidMethod(_) => "unsupported_did_method",
            AppError::RecordFetchFailed(_) => "record_fetch_failed",
            AppError::NotFound(_) => "not_found",
            AppError::NetworkError(_) => "network_error",
            AppError::UpstreamStatus(_) => "upstream_error",
            AppError::Timeout(_) => "timeout",
            AppError::ParseError(_) => "parse_error",
            AppError::ConfigError(_) => "config_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// Process exit code for CLI mode
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::InvalidInput(_) | AppError::ConfigError(_) => 1,
            AppError::NetworkError(_)
            | AppError::UpstreamStatus(_)
            | AppError::RecordFetchFailed(_)
            | AppError::ParseError(_) => 2,
            AppError::NotFound(_)
            | AppError::DidResolveFailed(_)
            | AppError::UnsupportedDidMethod(_) => 3,
            AppError::Timeout(_) => 4,
            AppError::Internal(_) => 5,
        }
    }

    /// Whether a failed call is worth a second attempt.
    ///
    /// Only transport failures qualify; HTTP status failures are final.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::NetworkError(_) | AppError::Timeout(_))
    }

    /// Get the error message
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::Timeout(err.to_string())
        } else if err.is_connect() || err.is_request() {
            AppError::NetworkError(err.to_string())
        } else if err.is_decode() {
            AppError::ParseError(err.to_string())
        } else {
            AppError::Internal(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::ParseError(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<ClassificationError> for AppError {
    fn from(err: ClassificationError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}
