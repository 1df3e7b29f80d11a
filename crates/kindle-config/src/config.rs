//! Host configuration types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{ConfigError, ConfigResult, GateConfig};

/// Default address the host listens on.
pub const DEFAULT_LISTEN: &str = "127.0.0.1:8080";

/// Default limit on a buffered upstream response, 16 MiB.
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Complete configuration of the Kindle host.
///
/// # Example
///
/// ```
/// use kindle_config::KindleConfig;
///
/// let config = KindleConfig::default();
/// assert_eq!(config.server.listen, "127.0.0.1:8080");
/// assert!(!config.gate.strict);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KindleConfig {
    /// Listener and document root.
    #[serde(default)]
    pub server: ServerConfig,

    /// Transpilation gate.
    #[serde(default)]
    pub gate: GateConfig,

    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl KindleConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.server.listen.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::invalid_value(
                "server.listen",
                format!("invalid socket address: {}", self.server.listen),
            ));
        }

        if self.server.max_body_bytes == Some(0) {
            return Err(ConfigError::invalid_value(
                "server.max_body_bytes",
                "must be greater than zero",
            ));
        }

        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::invalid_value("logging.level", "must not be empty"));
        }

        self.gate.validate()
    }
}

/// Listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address to listen on.
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Directory the served documents live in.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Largest upstream response the gate buffers; `None` is unbounded.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: Option<usize>,

    /// Reuse a valid incoming `X-Request-ID` instead of minting one.
    #[serde(default)]
    pub trust_request_id: bool,
}

fn default_listen() -> String {
    DEFAULT_LISTEN.to_string()
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

#[allow(clippy::unnecessary_wraps)]
fn default_max_body_bytes() -> Option<usize> {
    Some(DEFAULT_MAX_BODY_BYTES)
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            root: default_root(),
            max_body_bytes: default_max_body_bytes(),
            trust_request_id: false,
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `kindle_middleware=debug`.
    #[serde(default = "default_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default = "default_json")]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

const fn default_json() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: default_json(),
        }
    }
}
