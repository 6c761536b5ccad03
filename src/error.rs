//! Error types for the Z.AI search client
//!
//! Every pipeline failure is classified into one of the variants below; the
//! classification decides retry eligibility and is surfaced unchanged to the
//! caller.

use serde_json::Value;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Classified client error
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Invalid settings, or use of a closed client handle
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Credential rejected (HTTP 401) or malformed; never retried
    #[error("authentication failed: {message}")]
    Authentication {
        message: String,
        status: Option<u16>,
        body: Option<Value>,
    },

    /// Upstream admission rejection (HTTP 429); retryable
    #[error("rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        status: Option<u16>,
        body: Option<Value>,
        /// Server-provided hint in seconds, when present
        retry_after: Option<f64>,
    },

    /// Caller-fixable request problem (local validation, 4xx, or a
    /// malformed upstream payload); never retried
    #[error("invalid request: {message}")]
    InvalidRequest {
        message: String,
        status: Option<u16>,
        body: Option<Value>,
    },

    /// Upstream failure (HTTP 5xx); retryable
    #[error("server error: {message}")]
    Server {
        message: String,
        status: Option<u16>,
        body: Option<Value>,
    },

    /// Transport-level failure (connect, timeout); retryable
    #[error("network error: {message}")]
    Network { message: String },
}

impl Error {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an authentication error without response context
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
            status: None,
            body: None,
        }
    }

    /// Create an invalid-request error without response context
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
            status: None,
            body: None,
        }
    }

    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Whether the pipeline may retry after this error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimit { .. } | Self::Server { .. } | Self::Network { .. }
        )
    }

    /// HTTP status code attached during classification, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication { status, .. }
            | Self::RateLimit { status, .. }
            | Self::InvalidRequest { status, .. }
            | Self::Server { status, .. } => *status,
            Self::Configuration { .. } | Self::Network { .. } => None,
        }
    }

    /// Raw response payload captured during classification, if any
    pub fn body(&self) -> Option<&Value> {
        match self {
            Self::Authentication { body, .. }
            | Self::RateLimit { body, .. }
            | Self::InvalidRequest { body, .. }
            | Self::Server { body, .. } => body.as_ref(),
            Self::Configuration { .. } | Self::Network { .. } => None,
        }
    }

    /// Retry-after hint in seconds, for rate-limit errors that carried one
    pub fn retry_after(&self) -> Option<f64> {
        match self {
            Self::RateLimit { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Short tag naming the error kind, used for metrics keys
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration",
            Self::Authentication { .. } => "authentication",
            Self::RateLimit { .. } => "rate_limit",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::Server { .. } => "server",
            Self::Network { .. } => "network",
        }
    }
}
