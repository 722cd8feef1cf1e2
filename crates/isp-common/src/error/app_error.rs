//! Application error types
//!
//! Top-level error for binaries and embedding applications. Library crates keep
//! their own error enums and convert into this one at the edge.

use crate::config::ConfigError;
use crate::telemetry::TracingError;
use std::fmt;

/// Application-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    // Telemetry errors
    #[error(transparent)]
    Telemetry(#[from] TracingError),

    // Realtime channel setup errors (endpoint resolution, invalid options)
    #[error("Realtime client error: {0}")]
    Realtime(String),

    // Internal errors
    #[error("Internal error")]
    Internal(#[source] anyhow::Error),
}

impl AppError {
    /// Process exit code for this error (sysexits.h conventions)
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            // EX_CONFIG
            Self::Config(_) | Self::Realtime(_) => 78,
            // EX_SOFTWARE
            Self::Telemetry(_) | Self::Internal(_) => 70,
        }
    }

    /// Get a stable error code for structured logs
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Telemetry(_) => "TELEMETRY_ERROR",
            Self::Realtime(_) => "REALTIME_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Create a realtime setup error
    #[must_use]
    pub fn realtime(msg: impl fmt::Display) -> Self {
        Self::Realtime(msg.to_string())
    }

    /// Create an internal error from any error
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
