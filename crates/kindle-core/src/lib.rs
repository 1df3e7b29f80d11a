//! # Kindle Core
//!
//! Core types and traits shared by every Kindle crate.
//!
//! This crate provides the foundational types used throughout Kindle:
//!
//! - [`Transpile`] - Capability boundary for document transpilers
//! - [`TranspileOptions`] / [`Transpiled`] / [`TranspileError`] - Transpiler inputs and outcomes
//! - [`Report`] - Diagnostics produced while transpiling
//! - [`GateError`] - Error taxonomy of the transpilation gate
//! - [`Platform`] - Known provisioning platforms
//! - [`RequestId`] - UUID v7 request identifier

#![doc(html_root_url = "https://docs.rs/kindle-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
mod error;
mod platform;
mod report;
mod transpile;

pub use context::RequestId;
pub use error::{BoxError, GateError, GateResult, UpstreamError};
pub use platform::{Platform, UnknownPlatform};
pub use report::{Entry, Report, Severity};
pub use transpile::{Transpile, TranspileError, TranspileOptions, TranspileResult, Transpiled};

/// Media type of a Container Linux Config served by an upstream.
///
/// Used as the eligibility allow-list when none is configured.
pub const DEFAULT_SOURCE_MEDIA_TYPE: &str = "application/x-yaml";

/// Media type of a transpiled Ignition config.
pub const IGNITION_MEDIA_TYPE: &str = "application/vnd.coreos.ignition+json";
