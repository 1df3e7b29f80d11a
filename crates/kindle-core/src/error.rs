//! Error types for the transpilation gate.
//!
//! [`GateError`] is the only error a gate ever reports. Its variants follow
//! the recovery policy of the gate:
//!
//! | Variant | Recovered locally | Status |
//! |---|---|---|
//! | `Upstream` | never, propagated verbatim | the upstream's own status |
//! | `TranspileWarning` | when not strict | 502 |
//! | `TranspileFatal` | never | 502 |
//! | `Resource` | never | 500 |
//!
//! Ineligible responses never produce a `GateError`.

use crate::transpile::TranspileError;
use http::StatusCode;
use thiserror::Error;

/// A boxed error usable as an error source.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias using [`GateError`].
pub type GateResult<T> = Result<T, GateError>;

/// Failure reported by an upstream handler.
///
/// The gate never inspects or rewrites it; it only carries it to the host's
/// error reporting.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct UpstreamError {
    status: StatusCode,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl UpstreamError {
    /// Creates an upstream error with the status the host should answer with.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a 500 upstream error wrapping `source`.
    pub fn internal(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the status the host should answer with.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<std::io::Error> for UpstreamError {
    fn from(err: std::io::Error) -> Self {
        Self::internal("upstream I/O failure", err)
    }
}

/// Errors surfaced by the transpilation gate.
#[derive(Debug, Error)]
pub enum GateError {
    /// The wrapped handler failed.
    #[error("upstream handler failed: {0}")]
    Upstream(#[source] UpstreamError),

    /// The document produced warnings and the gate runs in strict mode.
    #[error("transpilation rejected in strict mode: {0}")]
    TranspileWarning(#[source] TranspileError),

    /// The document could not be transpiled.
    #[error("transpilation failed: {0}")]
    TranspileFatal(#[source] TranspileError),

    /// The response could not be buffered.
    #[error("resource exhausted: {message}")]
    Resource {
        /// Human-readable error message.
        message: String,
    },
}

impl GateError {
    /// Creates a resource error.
    pub fn resource(message: impl Into<String>) -> Self {
        Self::Resource {
            message: message.into(),
        }
    }

    /// Classifies a transpiler failure that was not recovered.
    #[must_use]
    pub fn from_transpile(err: TranspileError) -> Self {
        if err.is_warning() {
            Self::TranspileWarning(err)
        } else {
            Self::TranspileFatal(err)
        }
    }

    /// Returns the HTTP status code the host should answer with.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Upstream(err) => err.status(),
            Self::TranspileWarning(_) | Self::TranspileFatal(_) => StatusCode::BAD_GATEWAY,
            Self::Resource { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error category for logs.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Upstream(_) => "upstream",
            Self::TranspileWarning(_) => "transpile_warning",
            Self::TranspileFatal(_) => "transpile_fatal",
            Self::Resource { .. } => "resource",
        }
    }
}

impl From<UpstreamError> for GateError {
    fn from(err: UpstreamError) -> Self {
        Self::Upstream(err)
    }
}
