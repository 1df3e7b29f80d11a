//! Transpile middleware.
//!
//! Adapts the [`TranspileGate`] to the pipeline: the handler's response is
//! captured, settled by the gate and rebuilt. A gate failure becomes an
//! empty response with the error's status code. The settled
//! [`Outcome`](crate::gate::Outcome) is left in the context for earlier
//! stages to read once the chain unwinds.

use crate::context::MiddlewareContext;
use crate::gate::TranspileGate;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response, ResponseExt};
use crate::writer::ResponseRecorder;

/// Middleware that transpiles eligible handler responses.
///
/// # Example
///
/// ```
/// use kindle_config::GateConfig;
/// use kindle_middleware::stages::TranspileMiddleware;
/// use kindle_middleware::{Pipeline, TranspileGate};
/// use kindle_transpiler::ContainerLinuxTranspiler;
///
/// let gate = TranspileGate::new(
///     GateConfig::new().provision().unwrap(),
///     ContainerLinuxTranspiler::new(),
/// );
/// let pipeline = Pipeline::builder()
///     .add_post_handler_stage(TranspileMiddleware::new(gate))
///     .build();
/// assert_eq!(pipeline.stage_names(), ["transpile"]);
/// ```
#[derive(Debug, Clone)]
pub struct TranspileMiddleware {
    gate: TranspileGate,
}

impl TranspileMiddleware {
    /// Wraps a gate.
    #[must_use]
    pub fn new(gate: TranspileGate) -> Self {
        Self { gate }
    }

    /// Returns the wrapped gate.
    #[must_use]
    pub fn gate(&self) -> &TranspileGate {
        &self.gate
    }
}

impl Middleware for TranspileMiddleware {
    fn name(&self) -> &'static str {
        "transpile"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let response = next.run(ctx, request).await;
            let interceptor = self.gate.interceptor().capture(response).await;

            let mut recorder = ResponseRecorder::new();
            match self.gate.settle(interceptor, &mut recorder) {
                Ok(outcome) => {
                    ctx.record_outcome(outcome);
                    recorder.into_response()
                }
                Err(err) => {
                    tracing::debug!(
                        request_id = %ctx.request_id(),
                        status = %err.status_code(),
                        "replacing response after gate failure"
                    );
                    Response::empty(err.status_code())
                }
            }
        })
    }
}
