//! Client construction errors
//!
//! Runtime socket failures never surface as errors to callers; they show up as
//! status changes and drive the reconnect loop.

use thiserror::Error;

/// Errors raised while building a client from configuration
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("No realtime endpoint configured (set REALTIME_WS_URL or REALTIME_ORIGIN)")]
    MissingEndpoint,

    #[error("Invalid endpoint URL '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("Unsupported endpoint scheme '{0}' (expected ws, wss, http or https)")]
    UnsupportedScheme(String),

    #[error("Invalid client option: {0}")]
    InvalidOption(String),
}

impl ClientError {
    pub(crate) fn invalid_endpoint(url: &str, reason: impl std::fmt::Display) -> Self {
        Self::InvalidEndpoint {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn invalid_option(msg: impl Into<String>) -> Self {
        Self::InvalidOption(msg.into())
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
