//! Error types for the analytics API client.
//!
//! # Design
//! Failures split into two families. Input, configuration and serialization
//! errors are raised before anything touches the network and are never
//! retried. Request errors (`RequestError`, `Unauthorized`, `RateLimited`)
//! come back from the API itself; `RateLimited` carries the parsed rate-limit
//! windows so a `RetryPolicy` can decide whether waiting is worthwhile.
//!
//! Per-item business errors (`api_code > 0`) are *not* errors at this level:
//! they live inside a successful response and are exposed through
//! `ApiResponse::get_object_errors`.

use thiserror::Error;

use crate::ratelimit::RateLimit;

/// Errors returned by the client, the normalizer and the deserializer.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Caller-supplied identifier input is structurally wrong.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Credentials or client settings are missing or malformed.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// The API reported a non-success status with a message.
    #[error("{message} (HTTP Status: {status})")]
    RequestError { status: u16, message: String },

    /// The API returned 403: bad or expired credentials.
    #[error("{message} (HTTP Status: 403)")]
    Unauthorized { message: String },

    /// The API returned 429. Windows are in header order.
    #[error("{message} (HTTP Status: 429)")]
    RateLimited {
        message: String,
        rate_limits: Vec<RateLimit>,
    },

    /// The transport failed before any response was received.
    #[error("transport failed: {0}")]
    TransportError(String),

    /// The response body could not be deserialized into the expected shape.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),
}

impl ApiError {
    /// HTTP status carried by request-family errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::RequestError { status, .. } => Some(*status),
            ApiError::Unauthorized { .. } => Some(403),
            ApiError::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    /// True for errors reported by the remote API (including 403 and 429).
    pub fn is_request_error(&self) -> bool {
        self.status().is_some()
    }

    /// Rate-limit windows attached to a `RateLimited` error, empty otherwise.
    pub fn rate_limits(&self) -> &[RateLimit] {
        match self {
            ApiError::RateLimited { rate_limits, .. } => rate_limits,
            _ => &[],
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(error: serde_json::Error) -> Self {
        ApiError::DeserializationError(error.to_string())
    }
}

impl From<url::ParseError> for ApiError {
    fn from(error: url::ParseError) -> Self {
        ApiError::ConfigError(format!("invalid url: {error}"))
    }
}

impl From<ureq::Error> for ApiError {
    fn from(error: ureq::Error) -> Self {
        ApiError::TransportError(error.to_string())
    }
}
