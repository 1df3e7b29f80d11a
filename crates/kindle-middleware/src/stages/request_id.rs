//! Request ID stage.
//!
//! Assigns each request a UUID v7 and echoes it in `X-Request-ID`. With
//! [`RequestIdPolicy::TrustIncoming`] a well-formed incoming ID is kept so
//! a provisioning client can match its own logs against ours.

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response};
use http::HeaderValue;
use kindle_core::RequestId;

/// Header carrying the request ID in both directions.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Where a request's ID comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestIdPolicy {
    /// Always mint a fresh ID.
    #[default]
    Generate,
    /// Keep a valid incoming ID; mint one otherwise.
    TrustIncoming,
}

/// Stage that assigns request IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdMiddleware {
    policy: RequestIdPolicy,
}

impl RequestIdMiddleware {
    /// A stage that always mints a fresh ID.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A stage that keeps valid incoming IDs.
    #[must_use]
    pub fn trust_incoming() -> Self {
        Self::with_policy(RequestIdPolicy::TrustIncoming)
    }

    /// A stage following `policy`.
    #[must_use]
    pub fn with_policy(policy: RequestIdPolicy) -> Self {
        Self { policy }
    }

    /// Returns the policy.
    #[must_use]
    pub fn policy(&self) -> RequestIdPolicy {
        self.policy
    }

    fn assign(&self, request: &Request) -> RequestId {
        let incoming = match self.policy {
            RequestIdPolicy::Generate => None,
            RequestIdPolicy::TrustIncoming => request
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|value| value.to_str().ok())
                .and_then(RequestId::parse),
        };
        incoming.unwrap_or_else(RequestId::new)
    }
}

impl Middleware for RequestIdMiddleware {
    fn name(&self) -> &'static str {
        "request_id"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        let request_id = self.assign(&request);
        ctx.set_request_id(request_id);

        Box::pin(async move {
            let mut response = next.run(ctx, request).await;
            // a UUID always renders as a valid header value
            if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
                response.headers_mut().insert(REQUEST_ID_HEADER, value);
            }
            response
        })
    }
}
