//! Ordered middleware pipeline.
//!
//! Pre-handler stages run first, then post-handler stages, then the
//! handler. Responses unwind in reverse, so a post-handler stage sees the
//! handler's response before any pre-handler stage does. The transpile
//! stage belongs there, so that request-ID headers are added to the final
//! response rather than buffered with the upstream's.

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, BoxedMiddleware, Middleware, Next};
use crate::types::{Request, Response};
use std::fmt;
use std::sync::Arc;

/// An immutable, cheaply cloned list of stages.
///
/// # Example
///
/// ```
/// use kindle_middleware::stages::RequestIdMiddleware;
/// use kindle_middleware::Pipeline;
///
/// let pipeline = Pipeline::builder()
///     .add_pre_handler_stage(RequestIdMiddleware::new())
///     .build();
/// assert_eq!(pipeline.stage_names(), ["request_id"]);
/// ```
#[derive(Clone)]
pub struct Pipeline {
    stages: Arc<[BoxedMiddleware]>,
}

impl Pipeline {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Runs a request through every stage and the handler.
    pub async fn process<H>(
        &self,
        mut ctx: MiddlewareContext,
        request: Request,
        handler: H,
    ) -> Response
    where
        H: FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, Response> + Send + 'static,
    {
        self.process_with(&mut ctx, request, handler).await
    }

    /// Like [`process`](Self::process), but the caller keeps the context
    /// and can read what the stages recorded.
    pub async fn process_with<H>(
        &self,
        ctx: &mut MiddlewareContext,
        request: Request,
        handler: H,
    ) -> Response
    where
        H: FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, Response> + Send + 'static,
    {
        Next::new(&self.stages, handler).run(ctx, request).await
    }

    /// Stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

/// Collects stages for a [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    pre: Vec<BoxedMiddleware>,
    post: Vec<BoxedMiddleware>,
}

impl PipelineBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage that runs before every post-handler stage.
    #[must_use]
    pub fn add_pre_handler_stage<M: Middleware>(mut self, middleware: M) -> Self {
        self.pre.push(Arc::new(middleware));
        self
    }

    /// Appends a stage that runs closest to the handler.
    #[must_use]
    pub fn add_post_handler_stage<M: Middleware>(mut self, middleware: M) -> Self {
        self.post.push(Arc::new(middleware));
        self
    }

    /// Freezes the stage order.
    #[must_use]
    pub fn build(self) -> Pipeline {
        let mut stages = self.pre;
        stages.extend(self.post);
        Pipeline {
            stages: stages.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::RequestIdMiddleware;
    use bytes::Bytes;
    use http::{Request as HttpRequest, Response as HttpResponse, StatusCode};
    use http_body_util::Full;

    /// Appends its name to the response on the way out.
    struct Tag(&'static str);

    impl Middleware for Tag {
        fn name(&self) -> &'static str {
            self.0
        }

        fn process<'a>(
            &'a self,
            ctx: &'a mut MiddlewareContext,
            request: Request,
            next: Next<'a>,
        ) -> BoxFuture<'a, Response> {
            Box::pin(async move {
                let mut response = next.run(ctx, request).await;
                response.headers_mut().append("x-stage", self.0.parse().unwrap());
                response
            })
        }
    }

    fn request() -> Request {
        HttpRequest::builder()
            .uri("/")
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    #[test]
    fn test_empty_pipeline() {
        let pipeline = Pipeline::builder().build();
        assert_eq!(pipeline.stage_count(), 0);
        assert!(pipeline.stage_names().is_empty());
    }

    #[test]
    fn test_pre_handler_stages_come_first() {
        let pipeline = Pipeline::builder()
            .add_post_handler_stage(Tag("inner"))
            .add_pre_handler_stage(RequestIdMiddleware::new())
            .build();
        assert_eq!(pipeline.stage_names(), ["request_id", "inner"]);
        assert_eq!(format!("{pipeline:?}"), r#"Pipeline { stages: ["request_id", "inner"] }"#);
    }

    #[tokio::test]
    async fn test_post_handler_stages_see_response_first() {
        let pipeline = Pipeline::builder()
            .add_pre_handler_stage(Tag("outer"))
            .add_post_handler_stage(Tag("inner"))
            .build();

        let response = pipeline
            .process(MiddlewareContext::new(), request(), |_ctx, _req| {
                Box::pin(async {
                    HttpResponse::builder()
                        .status(StatusCode::OK)
                        .body(Full::new(Bytes::new()))
                        .unwrap()
                })
            })
            .await;

        let stages: Vec<_> = response.headers().get_all("x-stage").iter().collect();
        assert_eq!(stages, ["inner", "outer"]);
    }
}
