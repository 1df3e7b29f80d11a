//! Error types for the Kindle server.

use std::io;

use kindle_config::ConfigError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that stop the server from starting or serving.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration could not be loaded or provisioned.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The listen address could not be parsed.
    #[error("Invalid listen address \"{addr}\": {reason}")]
    InvalidAddress {
        /// The rejected address.
        addr: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The listener could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// The address that was requested.
        addr: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// I/O error while serving.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ServerError {
    /// Creates an invalid-address error.
    pub fn invalid_address(addr: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidAddress {
            addr: addr.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a bind error.
    pub fn bind(addr: impl Into<String>, source: io::Error) -> Self {
        Self::Bind {
            addr: addr.into(),
            source,
        }
    }

    /// Returns a short category string for logs.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Config(_) | Self::InvalidAddress { .. } => "config",
            Self::Bind { .. } => "bind",
            Self::Io(_) => "io",
        }
    }
}
