//! The transpilation gate.
//!
//! For every request the gate runs the upstream into a
//! [`ResponseInterceptor`], looks at the declared content type of the
//! capture and settles it in one of four ways:
//!
//! | Eligible | Transpiler result | Strict | Decision |
//! |---|---|---|---|
//! | no | not called | any | [`Decision::PassThrough`] |
//! | yes | success | any | [`Decision::Replace`] |
//! | yes | warning with output | no | [`Decision::Degrade`] |
//! | yes | warning without output | no | [`Decision::KeepOriginal`] |
//! | yes | warning | yes | [`Decision::Abort`] |
//! | yes | fatal | any | [`Decision::Abort`] |
//!
//! An aborted request writes nothing to the real writer; the host answers
//! with [`GateError::status_code`] and an empty body.

use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue};
use kindle_config::GateConfig;
use kindle_core::{
    GateError, GateResult, Report, Transpile, TranspileError, TranspileOptions, TranspileResult,
    Transpiled,
};
use std::fmt;
use std::io;
use std::sync::Arc;

use crate::interceptor::{CapturedResponse, ResponseInterceptor};
use crate::types::Request;
use crate::upstream::Upstream;
use crate::writer::ResponseWriter;

/// What the gate does with a captured response.
#[derive(Debug)]
pub enum Decision {
    /// Not eligible; commit the capture unchanged.
    PassThrough,
    /// Commit the transpiled output.
    Replace(Transpiled),
    /// Warnings in non-strict mode; commit the output anyway.
    Degrade {
        /// Output produced despite the warnings.
        output: Transpiled,
        /// The warnings.
        report: Report,
    },
    /// Warnings in non-strict mode but no output; commit the capture
    /// unchanged.
    KeepOriginal {
        /// The warnings.
        report: Report,
    },
    /// Fail the request without writing anything.
    Abort(GateError),
}

/// Maps a transpiler result to a [`Decision`].
///
/// `outcome` is `None` when the response was not eligible and the
/// transpiler was not called.
///
/// # Example
///
/// ```
/// use kindle_core::{Report, TranspileError};
/// use kindle_middleware::gate::{decide, Decision};
///
/// let mut report = Report::new();
/// report.warn("permissions unset, defaulting to 0644", Some("storage.files[0]"));
///
/// let strict = decide(Some(Err(TranspileError::warning(report.clone(), None))), true);
/// assert!(matches!(strict, Decision::Abort(_)));
///
/// let lenient = decide(Some(Err(TranspileError::warning(report, None))), false);
/// assert!(matches!(lenient, Decision::KeepOriginal { .. }));
/// ```
#[must_use]
pub fn decide(outcome: Option<TranspileResult>, strict: bool) -> Decision {
    match outcome {
        None => Decision::PassThrough,
        Some(Ok(output)) => Decision::Replace(output),
        Some(Err(err)) if err.is_warning() && !strict => match err.partial {
            Some(output) => Decision::Degrade {
                output,
                report: err.report,
            },
            None => Decision::KeepOriginal { report: err.report },
        },
        Some(Err(err)) => Decision::Abort(GateError::from_transpile(err)),
    }
}

/// The declared media type: the `Content-Type` value up to the first `;`,
/// trimmed.
#[must_use]
pub fn declared_content_type(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    let media_type = value.split(';').next().unwrap_or(value).trim();
    (!media_type.is_empty()).then_some(media_type)
}

/// How a request was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The capture was committed unchanged because it was not eligible.
    PassedThrough,
    /// The transpiled output was committed.
    Transpiled,
    /// The transpiled output was committed despite warnings.
    Degraded,
    /// The capture was committed unchanged after warnings without output.
    KeptOriginal,
}

impl Outcome {
    /// Returns the outcome as a log-friendly string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PassedThrough => "passed_through",
            Self::Transpiled => "transpiled",
            Self::Degraded => "degraded",
            Self::KeptOriginal => "kept_original",
        }
    }
}

/// Intercepts upstream responses and transpiles eligible ones.
///
/// Cheap to clone; the configuration and transpiler are shared.
///
/// # Example
///
/// ```
/// use kindle_config::GateConfig;
/// use kindle_middleware::TranspileGate;
/// use kindle_transpiler::ContainerLinuxTranspiler;
///
/// let config = GateConfig::new().strict().provision().unwrap();
/// let gate = TranspileGate::new(config, ContainerLinuxTranspiler::new());
/// assert!(gate.config().strict);
/// ```
#[derive(Clone)]
pub struct TranspileGate {
    config: Arc<GateConfig>,
    options: TranspileOptions,
    transpiler: Arc<dyn Transpile>,
    body_limit: Option<usize>,
}

impl fmt::Debug for TranspileGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranspileGate")
            .field("config", &self.config)
            .field("body_limit", &self.body_limit)
            .finish_non_exhaustive()
    }
}

impl TranspileGate {
    /// Creates a gate from a provisioned configuration.
    pub fn new(config: Arc<GateConfig>, transpiler: impl Transpile) -> Self {
        let options = TranspileOptions::new(config.platform.clone(), config.strict);
        Self {
            config,
            options,
            transpiler: Arc::new(transpiler),
            body_limit: None,
        }
    }

    /// Limits how many bytes of an eligible upstream response are buffered.
    ///
    /// Responses outside the allow-list are never refused.
    #[must_use]
    pub fn with_body_limit(mut self, limit: Option<usize>) -> Self {
        self.body_limit = limit;
        self
    }

    /// Returns the gate configuration.
    #[must_use]
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Returns the configured buffer limit.
    #[must_use]
    pub fn body_limit(&self) -> Option<usize> {
        self.body_limit
    }

    /// Creates an interceptor honoring the buffer limit for eligible responses.
    #[must_use]
    pub fn interceptor(&self) -> ResponseInterceptor {
        let Some(limit) = self.body_limit else {
            return ResponseInterceptor::new();
        };
        let config = Arc::clone(&self.config);
        ResponseInterceptor::with_limit(limit).scoped(move |headers| {
            declared_content_type(headers).is_some_and(|media_type| config.allows(media_type))
        })
    }

    /// Whether a response with these headers would be transpiled.
    #[must_use]
    pub fn is_eligible(&self, headers: &HeaderMap) -> bool {
        declared_content_type(headers).is_some_and(|media_type| self.config.allows(media_type))
    }

    /// Runs `upstream` once and settles its response into `sink`.
    pub async fn handle(
        &self,
        sink: &mut dyn ResponseWriter,
        request: &Request,
        upstream: &dyn Upstream,
    ) -> GateResult<Outcome> {
        let mut interceptor = self.interceptor();

        if let Err(err) = upstream.serve(&mut interceptor, request).await {
            if interceptor.is_overflowed() {
                return Err(self.overflow());
            }
            tracing::warn!(status = %err.status(), error = %err, "upstream handler failed");
            return Err(GateError::Upstream(err));
        }

        self.settle(interceptor, sink)
    }

    /// Settles a finished capture into `sink`.
    pub fn settle(
        &self,
        interceptor: ResponseInterceptor,
        sink: &mut dyn ResponseWriter,
    ) -> GateResult<Outcome> {
        if interceptor.is_overflowed() {
            return Err(self.overflow());
        }

        let captured = interceptor.discard();
        let declared = declared_content_type(&captured.headers).map(str::to_owned);
        let eligible = declared
            .as_deref()
            .is_some_and(|media_type| self.config.allows(media_type));

        let outcome = eligible.then(|| self.transpiler.transpile(&captured.body, &self.options));

        match decide(outcome, self.config.strict) {
            Decision::PassThrough => {
                tracing::debug!(
                    content_type = declared.as_deref().unwrap_or(""),
                    "response not eligible for transpilation"
                );
                commit(captured, sink)?;
                Ok(Outcome::PassedThrough)
            }
            Decision::Replace(output) => {
                tracing::info!(
                    bytes_in = captured.body.len(),
                    bytes_out = output.body.len(),
                    "config transpiled"
                );
                replace(captured, output, sink)?;
                Ok(Outcome::Transpiled)
            }
            Decision::Degrade { output, report } => {
                log_warnings(&report);
                tracing::warn!(
                    warnings = report.entries().len(),
                    bytes_out = output.body.len(),
                    "config transpiled with warnings"
                );
                replace(captured, output, sink)?;
                Ok(Outcome::Degraded)
            }
            Decision::KeepOriginal { report } => {
                log_warnings(&report);
                tracing::warn!(
                    warnings = report.entries().len(),
                    "transpiler returned no output, serving original document"
                );
                commit(captured, sink)?;
                Ok(Outcome::KeptOriginal)
            }
            Decision::Abort(err) => {
                if let GateError::TranspileWarning(inner) = &err {
                    log_warnings(&inner.report);
                }
                tracing::error!(category = err.category(), error = %err, "transpilation aborted");
                Err(err)
            }
        }
    }

    fn overflow(&self) -> GateError {
        let err = GateError::resource(format!(
            "upstream response exceeds the {} byte buffer limit",
            self.body_limit.unwrap_or_default()
        ));
        tracing::error!(category = err.category(), error = %err, "transpilation aborted");
        err
    }
}

fn log_warnings(report: &Report) {
    for entry in report.entries() {
        tracing::warn!(
            path = entry.path.as_deref().unwrap_or(""),
            "{}",
            entry.message
        );
    }
}

fn commit(captured: CapturedResponse, sink: &mut dyn ResponseWriter) -> GateResult<()> {
    captured.commit(sink).map_err(write_failed)
}

fn replace(
    captured: CapturedResponse,
    output: Transpiled,
    sink: &mut dyn ResponseWriter,
) -> GateResult<()> {
    let content_type = HeaderValue::from_str(output.content_type).map_err(|_| {
        GateError::TranspileFatal(TranspileError::fatal_message(format!(
            "transpiler produced an invalid content type: {:?}",
            output.content_type
        )))
    })?;

    let CapturedResponse {
        status,
        mut headers,
        body: _,
    } = captured;
    headers.insert(CONTENT_TYPE, content_type);
    headers.insert(CONTENT_LENGTH, HeaderValue::from(output.body.len()));

    commit(
        CapturedResponse {
            status,
            headers,
            body: output.body,
        },
        sink,
    )
}

fn write_failed(err: io::Error) -> GateError {
    GateError::resource(format!("writing response failed: {err}"))
}
