//! Typed configuration for Kindle.
//!
//! - [`GateConfig`] - settings of the transpilation gate, buildable from a
//!   directive block, a file section or builder methods
//! - [`KindleConfig`] - everything the host binary needs
//! - [`ConfigLoader`] - layered loading: defaults, file, environment
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:8080"
//! root = "/srv/configs"
//! max_body_bytes = 1048576
//!
//! [gate]
//! strict = true
//! mime_types = ["application/x-yaml"]
//! platform = "ec2"
//!
//! [logging]
//! level = "info"
//! json = true
//! ```
//!
//! # Environment Variable Overrides
//!
//! Values can be overridden with `PREFIX__SECTION__KEY`, e.g.
//! `KINDLE__GATE__PLATFORM=gce` or `KINDLE__SERVER__MAX_BODY_BYTES=none`.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod gate;
mod loader;

pub use config::{
    KindleConfig, LoggingConfig, ServerConfig, DEFAULT_LISTEN, DEFAULT_MAX_BODY_BYTES,
};
pub use error::{ConfigError, ConfigResult};
pub use gate::{GateConfig, DIRECTIVE_NAME};
pub use loader::ConfigLoader;
