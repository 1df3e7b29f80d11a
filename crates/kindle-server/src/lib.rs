//! # Kindle Server
//!
//! A static file server for machine provisioning configs. Container Linux
//! Configs (`.yaml`) are transpiled to Ignition JSON as they are served;
//! everything else passes through untouched.
//!
//! ```text
//! client ──▶ hyper ──▶ TranspileGate ──▶ StaticFiles
//!                          │
//!                          └──▶ ContainerLinuxTranspiler
//! ```
//!
//! # Example Usage
//!
//! ```bash
//! # Serve ./configs strictly for EC2 machines
//! $ KINDLE__GATE__STRICT=true KINDLE__GATE__PLATFORM=ec2 kindle --root ./configs
//! ```

#![doc(html_root_url = "https://docs.rs/kindle-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod server;
pub mod static_files;

pub use error::{ServerError, ServerResult};
pub use server::Server;
pub use static_files::{StaticFileError, StaticFiles};

/// Server version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
