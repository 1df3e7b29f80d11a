//! # Kindle Transpiler
//!
//! Turns Container Linux Configs into Ignition configs.
//!
//! A Container Linux Config is a YAML document written by people; Ignition
//! is the JSON format the boot-time provisioning agent consumes. The
//! transpiler walks the YAML tree, records a diagnostic for anything it does
//! not understand, and renders an Ignition 2.3.0 document.
//!
//! ## Diagnostics
//!
//! - Warnings (unrecognized keys, unset permissions) still produce output,
//!   which is returned as the `partial` value of the error.
//! - Fatal problems (malformed YAML, wrong types, invalid paths, dynamic
//!   data the platform cannot provide) produce no output at all.
//!
//! ## Example
//!
//! ```rust
//! use kindle_core::{Transpile, TranspileOptions};
//! use kindle_transpiler::ContainerLinuxTranspiler;
//!
//! let doc = b"passwd:\n  users:\n    - name: core\n";
//! let out = ContainerLinuxTranspiler::new()
//!     .transpile(doc, &TranspileOptions::default())
//!     .unwrap();
//! assert!(out.body.starts_with(b"{\"ignition\""));
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod convert;
pub mod dynamic;
pub mod ignition;
mod walker;

use kindle_core::{
    Platform, Report, Transpile, TranspileError, TranspileOptions, TranspileResult, Transpiled,
};
use serde_yaml::Value;
use walker::Walker;

pub use ignition::{Config, IGNITION_VERSION};

/// Container Linux Config to Ignition transpiler.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerLinuxTranspiler;

impl ContainerLinuxTranspiler {
    /// Creates a transpiler.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Converts a document into an Ignition config and its diagnostics.
    ///
    /// The config is only meaningful when the report is not fatal.
    pub fn convert(&self, input: &[u8], platform: Option<Platform>) -> (Config, Report) {
        let mut walker = Walker::new();

        if input.iter().all(u8::is_ascii_whitespace) {
            walker.fatal("not a config (empty)", "");
            return (Config::new(), walker.into_report());
        }

        let config = match serde_yaml::from_slice::<Value>(input) {
            Ok(root) => convert::convert(&root, platform, &mut walker),
            Err(err) => {
                walker.fatal(format!("invalid YAML: {err}"), "");
                Config::new()
            }
        };

        (config, walker.into_report())
    }
}

impl Transpile for ContainerLinuxTranspiler {
    fn transpile(&self, input: &[u8], options: &TranspileOptions) -> TranspileResult {
        let platform = match options.platform.as_deref() {
            Some(name) => Some(
                name.parse::<Platform>()
                    .map_err(|err| TranspileError::fatal_message(err.to_string()))?,
            ),
            None => None,
        };

        let (config, report) = self.convert(input, platform);

        if report.is_fatal() {
            tracing::debug!(
                diagnostics = report.entries().len(),
                "config rejected"
            );
            return Err(TranspileError::fatal(report));
        }

        let body = serde_json::to_vec(&config)
            .map_err(|err| TranspileError::fatal_message(format!("rendering Ignition: {err}")))?;
        let output = Transpiled::ignition(body);

        if report.is_empty() {
            tracing::trace!(bytes = output.body.len(), "config transpiled");
            Ok(output)
        } else {
            tracing::debug!(
                warnings = report.entries().len(),
                "config transpiled with warnings"
            );
            Err(TranspileError::warning(report, Some(output)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kindle_core::Severity;

    fn run(doc: &str, platform: Option<&str>) -> TranspileResult {
        let options = TranspileOptions::new(platform.map(str::to_string), false);
        ContainerLinuxTranspiler::new().transpile(doc.as_bytes(), &options)
    }

    fn json(out: &Transpiled) -> serde_json::Value {
        serde_json::from_slice(&out.body).unwrap()
    }

    #[test]
    fn test_user_with_key() {
        let doc = "passwd:\n  users:\n    - name: core\n      ssh_authorized_keys:\n        - ssh-ed25519 AAAA\n";
        let out = run(doc, None).unwrap();

        assert_eq!(out.content_type, kindle_core::IGNITION_MEDIA_TYPE);
        let value = json(&out);
        assert_eq!(value["passwd"]["users"][0]["name"], "core");
        assert_eq!(value["passwd"]["users"][0]["sshAuthorizedKeys"][0], "ssh-ed25519 AAAA");
        assert_eq!(value["ignition"]["version"], IGNITION_VERSION);
    }

    #[test]
    fn test_empty_document_is_fatal() {
        let err = run("  \n", None).unwrap_err();
        assert_eq!(err.severity, Severity::Fatal);
        assert!(err.partial.is_none());
    }

    #[test]
    fn test_invalid_yaml_is_fatal() {
        let err = run("passwd: [unclosed\n", None).unwrap_err();
        assert_eq!(err.severity, Severity::Fatal);
        assert!(err.report.entries()[0].message.starts_with("invalid YAML"));
    }

    #[test]
    fn test_scalar_document_is_fatal() {
        let err = run("just a string\n", None).unwrap_err();
        assert_eq!(err.severity, Severity::Fatal);
    }

    #[test]
    fn test_unknown_key_is_warning_with_output() {
        let err = run("passwd:\n  users:\n    - name: core\nextra: 1\n", None).unwrap_err();

        assert!(err.is_warning());
        let partial = err.partial.expect("warnings carry output");
        assert_eq!(json(&partial)["passwd"]["users"][0]["name"], "core");
        assert_eq!(err.report.entries()[0].path.as_deref(), Some("extra"));
    }

    #[test]
    fn test_unknown_platform_is_fatal() {
        let err = run("passwd: {}\n", Some("mainframe")).unwrap_err();
        assert_eq!(err.severity, Severity::Fatal);
        assert!(err.to_string().contains("mainframe"));
    }

    #[test]
    fn test_platform_resolves_dynamic_data() {
        let doc = "systemd:\n  units:\n    - name: etcd.service\n      enabled: true\n      contents: \"ExecStart=/bin/etcd --name {HOSTNAME}\"\n";
        let out = run(doc, Some("ec2")).unwrap();

        let unit = &json(&out)["systemd"]["units"][0];
        assert_eq!(unit["contents"], "ExecStart=/bin/etcd --name ${COREOS_EC2_HOSTNAME}");
        assert_eq!(unit["dropins"][0]["name"], dynamic::METADATA_DROPIN);
        assert_eq!(unit["enabled"], true);
    }
}
