//! The transpiler capability boundary.
//!
//! The gate never knows the grammar of the documents it rewrites. It only
//! calls a [`Transpile`] implementation with the captured body and the
//! configured [`TranspileOptions`]. Tests substitute closures for the real
//! transpiler:
//!
//! ```
//! use kindle_core::{Transpile, TranspileOptions, TranspileResult, Transpiled};
//!
//! let always_ok = |_input: &[u8], _opts: &TranspileOptions| -> TranspileResult {
//!     Ok(Transpiled::ignition("{}"))
//! };
//! let out = always_ok.transpile(b"passwd: {}", &TranspileOptions::default()).unwrap();
//! assert_eq!(&out.body[..], b"{}");
//! ```

use crate::report::{Report, Severity};
use crate::IGNITION_MEDIA_TYPE;
use bytes::Bytes;
use thiserror::Error;

/// Options forwarded to the transpiler on every call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranspileOptions {
    /// Target platform hint; `None` means unspecified.
    pub platform: Option<String>,
    /// Whether warnings are fatal.
    pub strict: bool,
}

impl TranspileOptions {
    /// Creates options for the given platform and strictness.
    #[must_use]
    pub fn new(platform: Option<String>, strict: bool) -> Self {
        Self { platform, strict }
    }
}

/// A successfully transpiled document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transpiled {
    /// Output bytes.
    pub body: Bytes,
    /// Media type of the output.
    pub content_type: &'static str,
}

impl Transpiled {
    /// Creates an Ignition output from raw JSON bytes.
    #[must_use]
    pub fn ignition(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            content_type: IGNITION_MEDIA_TYPE,
        }
    }
}

/// A transpilation that did not cleanly succeed.
///
/// Warning-class errors may carry the output produced despite the
/// warnings in `partial`; fatal errors never do.
#[derive(Debug, Clone, Error)]
#[error("transpilation {severity}: {report}")]
pub struct TranspileError {
    /// Classification of the failure.
    pub severity: Severity,
    /// Diagnostics that caused the failure.
    pub report: Report,
    /// Output produced despite warnings.
    pub partial: Option<Transpiled>,
}

impl TranspileError {
    /// Creates a warning-class error, optionally carrying output.
    #[must_use]
    pub fn warning(report: Report, partial: Option<Transpiled>) -> Self {
        Self {
            severity: Severity::Warning,
            report,
            partial,
        }
    }

    /// Creates a fatal error.
    #[must_use]
    pub fn fatal(report: Report) -> Self {
        Self {
            severity: Severity::Fatal,
            report,
            partial: None,
        }
    }

    /// Creates a fatal error from a single message.
    #[must_use]
    pub fn fatal_message(message: impl Into<String>) -> Self {
        let mut report = Report::new();
        report.fatal(message, None);
        Self::fatal(report)
    }

    /// Returns `true` for warning-class errors.
    #[must_use]
    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

/// Result of a transpiler call.
pub type TranspileResult = Result<Transpiled, TranspileError>;

/// A pure, synchronous document transpiler.
///
/// Implementations must not block on I/O; the gate calls them inline on
/// the request's task.
pub trait Transpile: Send + Sync + 'static {
    /// Transpiles `input` according to `options`.
    fn transpile(&self, input: &[u8], options: &TranspileOptions) -> TranspileResult;
}

impl<F> Transpile for F
where
    F: Fn(&[u8], &TranspileOptions) -> TranspileResult + Send + Sync + 'static,
{
    fn transpile(&self, input: &[u8], options: &TranspileOptions) -> TranspileResult {
        self(input, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_implements_transpile() {
        let echo = |input: &[u8], _: &TranspileOptions| -> TranspileResult {
            Ok(Transpiled::ignition(input.to_vec()))
        };
        let out = echo
            .transpile(b"abc", &TranspileOptions::new(None, true))
            .unwrap();
        assert_eq!(&out.body[..], b"abc");
        assert_eq!(out.content_type, IGNITION_MEDIA_TYPE);
    }

    #[test]
    fn test_warning_keeps_partial_output() {
        let mut report = Report::new();
        report.warn("unused key", Some("foo"));
        let err = TranspileError::warning(report, Some(Transpiled::ignition("{}")));

        assert!(err.is_warning());
        assert!(err.partial.is_some());
        assert!(err.to_string().contains("unused key"));
    }

    #[test]
    fn test_fatal_has_no_partial_output() {
        let err = TranspileError::fatal_message("invalid YAML");
        assert!(!err.is_warning());
        assert!(err.partial.is_none());
        assert_eq!(err.to_string(), "transpilation error: error: invalid YAML");
    }
}
