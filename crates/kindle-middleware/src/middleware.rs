//! Core middleware trait and types.
//!
//! Every stage implements [`Middleware`]. A stage receives the mutable
//! context, the request and a [`Next`] that runs the rest of the chain.
//!
//! # Example
//!
//! ```
//! use kindle_middleware::context::MiddlewareContext;
//! use kindle_middleware::{BoxFuture, Middleware, Next, Request, Response};
//!
//! struct Timing;
//!
//! impl Middleware for Timing {
//!     fn name(&self) -> &'static str {
//!         "timing"
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         ctx: &'a mut MiddlewareContext,
//!         request: Request,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, Response> {
//!         Box::pin(async move {
//!             let response = next.run(ctx, request).await;
//!             tracing::debug!(elapsed = ?ctx.elapsed(), "request handled");
//!             response
//!         })
//!     }
//! }
//! ```

use crate::context::MiddlewareContext;
use crate::types::{Request, Response};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A shared, type-erased stage.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// One step of request processing.
///
/// A stage calls `next.run()` at most once; not calling it short-circuits
/// the chain.
pub trait Middleware: Send + Sync + 'static {
    /// Stage name, used in logs.
    fn name(&self) -> &'static str;

    /// Handles `request`, usually by delegating to `next`.
    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response>;
}

type Handler<'a> =
    Box<dyn FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, Response> + Send + 'a>;

/// The remaining stages of a chain and the handler at its end.
pub struct Next<'a> {
    stages: &'a [BoxedMiddleware],
    handler: Handler<'a>,
}

impl<'a> Next<'a> {
    /// Starts a chain that runs `stages` in order, then `handler`.
    pub fn new<F>(stages: &'a [BoxedMiddleware], handler: F) -> Self
    where
        F: FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, Response> + Send + 'a,
    {
        Self {
            stages,
            handler: Box::new(handler),
        }
    }

    /// Runs the first remaining stage, or the handler once none are left.
    pub async fn run(self, ctx: &mut MiddlewareContext, request: Request) -> Response {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                let next = Next {
                    stages: rest,
                    handler: self.handler,
                };
                stage.process(ctx, request, next).await
            }
            None => (self.handler)(ctx, request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{Request as HttpRequest, Response as HttpResponse, StatusCode};
    use http_body_util::{BodyExt, Full};

    /// Stamps its name on the request on the way in.
    struct Stamp(&'static str);

    impl Middleware for Stamp {
        fn name(&self) -> &'static str {
            self.0
        }

        fn process<'a>(
            &'a self,
            ctx: &'a mut MiddlewareContext,
            mut request: Request,
            next: Next<'a>,
        ) -> BoxFuture<'a, Response> {
            Box::pin(async move {
                request.headers_mut().append("x-stamp", self.0.parse().unwrap());
                next.run(ctx, request).await
            })
        }
    }

    /// Answers without calling the rest of the chain.
    struct Refuse;

    impl Middleware for Refuse {
        fn name(&self) -> &'static str {
            "refuse"
        }

        fn process<'a>(
            &'a self,
            _ctx: &'a mut MiddlewareContext,
            _request: Request,
            _next: Next<'a>,
        ) -> BoxFuture<'a, Response> {
            Box::pin(async {
                HttpResponse::builder()
                    .status(StatusCode::FORBIDDEN)
                    .body(Full::new(Bytes::new()))
                    .unwrap()
            })
        }
    }

    fn request() -> Request {
        HttpRequest::builder()
            .uri("/config.yaml")
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    /// Echoes the stamps it received as the body.
    fn echo(_ctx: &mut MiddlewareContext, request: Request) -> BoxFuture<'static, Response> {
        let stamps: Vec<_> = request
            .headers()
            .get_all("x-stamp")
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect();
        let body = stamps.join(",");
        Box::pin(async move { HttpResponse::new(Full::new(Bytes::from(body))) })
    }

    async fn body(response: Response) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn test_empty_chain_runs_handler() {
        let mut ctx = MiddlewareContext::new();
        let response = Next::new(&[], echo).run(&mut ctx, request()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_stages_run_in_order() {
        let stages: Vec<BoxedMiddleware> =
            vec![Arc::new(Stamp("first")), Arc::new(Stamp("second"))];

        let mut ctx = MiddlewareContext::new();
        let response = Next::new(&stages, echo).run(&mut ctx, request()).await;

        assert_eq!(&body(response).await[..], b"first,second");
    }

    #[tokio::test]
    async fn test_short_circuit_skips_handler() {
        let stages: Vec<BoxedMiddleware> = vec![Arc::new(Refuse), Arc::new(Stamp("unreached"))];

        let mut ctx = MiddlewareContext::new();
        let response = Next::new(&stages, |_ctx, _req| -> BoxFuture<'static, Response> {
            panic!("handler must not run")
        })
        .run(&mut ctx, request())
        .await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
