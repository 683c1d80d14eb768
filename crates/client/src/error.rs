//! Error types for the remote data layer.
//!
//! Everything that can make a `RemoteData` terminal-with-failure funnels
//! into [`RemoteDataError`]. The variants are `Clone` because terminal
//! states are broadcast to every observer over watch channels.

use thiserror::Error;

/// A failure surfaced through a `RemoteData::Error` state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteDataError {
    /// Network/transport failure with no HTTP response. Not retried
    /// automatically.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server answered with a 4xx/5xx status. 401/403 are propagated
    /// unchanged for an external auth collaborator to react to.
    #[error("HTTP {status}: {message}")]
    HttpStatus {
        /// Response status code.
        status: u16,
        /// Response body or status text.
        message: String,
    },

    /// The cached payload could not be decoded into the requested type.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The server rejected a flushed patch batch. The batch is discarded;
    /// the caller must re-diff against fresh data.
    #[error("Patch rejected: {0}")]
    PatchRejected(String),

    /// A lookup against configured endpoints found nothing.
    #[error("{0}")]
    NotConfigured(String),
}

impl RemoteDataError {
    /// The HTTP status code, when the error came from a response.
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}
