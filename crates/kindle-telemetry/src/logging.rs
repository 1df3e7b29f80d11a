//! Log subscriber setup and shared field names.

use crate::error::TelemetryError;
use crate::TelemetryResult;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Whether logging is enabled.
    pub enabled: bool,

    /// Filter directive, e.g. `info` or `info,kindle_middleware=debug`.
    pub level: String,

    /// JSON lines instead of pretty output.
    pub json_format: bool,

    /// Log span creation and close.
    pub span_events: bool,

    /// Include file and line of the call site.
    pub file_line_info: bool,

    /// Include the module path.
    pub include_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            json_format: true,
            span_events: false,
            file_line_info: false,
            include_target: true,
        }
    }
}

impl LogConfig {
    /// Creates a configuration with the given filter and output format.
    #[must_use]
    pub fn new(level: impl Into<String>, json_format: bool) -> Self {
        Self {
            level: level.into(),
            json_format,
            ..Self::default()
        }
    }

    /// Human-readable output with span events and source locations.
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            json_format: false,
            span_events: true,
            file_line_info: true,
            ..Self::default()
        }
    }
}

/// Installs the global subscriber.
///
/// Fails when the filter does not parse or a subscriber is already set.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = create_env_filter(&config.level)?;

    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let result = if config.json_format {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_span_events(span_events)
            .with_file(config.file_line_info)
            .with_line_number(config.file_line_info)
            .with_target(config.include_target)
            .with_filter(filter);
        tracing_subscriber::registry().with(fmt_layer).try_init()
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_span_events(span_events)
            .with_file(config.file_line_info)
            .with_line_number(config.file_line_info)
            .with_target(config.include_target)
            .with_filter(filter);
        tracing_subscriber::registry().with(fmt_layer).try_init()
    };

    result.map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}

/// Parses a filter directive.
pub fn create_env_filter(filter: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(filter).map_err(|e| TelemetryError::invalid_filter(filter, e))
}

/// Field names used across Kindle logs.
pub mod fields {
    /// Request ID.
    pub const REQUEST_ID: &str = "request_id";

    /// HTTP method.
    pub const HTTP_METHOD: &str = "http.method";

    /// HTTP path.
    pub const HTTP_PATH: &str = "http.path";

    /// HTTP status code.
    pub const HTTP_STATUS: &str = "http.status_code";

    /// Duration in milliseconds.
    pub const DURATION_MS: &str = "duration_ms";

    /// Declared content type of the upstream response.
    pub const CONTENT_TYPE: &str = "content_type";

    /// Error category from `GateError::category`.
    pub const ERROR_CATEGORY: &str = "error.category";

    /// Error message.
    pub const ERROR: &str = "error";
}

/// Logs a finished request.
#[macro_export]
macro_rules! log_request_complete {
    ($request_id:expr, $status:expr, $duration_ms:expr) => {
        tracing::info!(
            request_id = %$request_id,
            http.status_code = $status,
            duration_ms = $duration_ms,
            "request completed"
        );
    };
}

/// Logs a request that ended in an error.
#[macro_export]
macro_rules! log_request_error {
    ($request_id:expr, $category:expr, $error:expr) => {
        tracing::error!(
            request_id = %$request_id,
            error.category = $category,
            error = %$error,
            "request failed"
        );
    };
}
