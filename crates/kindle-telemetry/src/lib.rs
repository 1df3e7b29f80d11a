//! # Kindle Telemetry
//!
//! Structured logging for Kindle, built on `tracing-subscriber`.
//!
//! Production output is one JSON object per line; development output is
//! the pretty formatter with span events and source locations. Field names
//! shared by every crate live in [`fields`].
//!
//! ```rust,ignore
//! use kindle_telemetry::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::default())?;
//! tracing::info!(request_id = %id, "transpiled");
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{create_env_filter, fields, init_logging, LogConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
