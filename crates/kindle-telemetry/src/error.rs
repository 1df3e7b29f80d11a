//! Telemetry error types.

use thiserror::Error;

/// Errors that can occur while setting up telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The filter directive could not be parsed.
    #[error("invalid log filter \"{filter}\": {reason}")]
    InvalidFilter {
        /// The rejected directive.
        filter: String,
        /// Parser message.
        reason: String,
    },

    /// A global subscriber is already installed.
    #[error("failed to initialize logging: {0}")]
    LoggingInit(String),
}

impl TelemetryError {
    /// Creates an invalid filter error.
    pub fn invalid_filter(filter: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidFilter {
            filter: filter.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TelemetryError::invalid_filter("info,[", "unbalanced bracket");
        assert_eq!(
            err.to_string(),
            "invalid log filter \"info,[\": unbalanced bracket"
        );
    }
}
