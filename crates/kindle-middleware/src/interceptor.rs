//! Buffering stand-in for the real response writer.
//!
//! A [`ResponseInterceptor`] accepts everything an upstream writes and keeps
//! it in memory. Nothing reaches the network until the gate either commits
//! the capture unchanged or replaces it.
//!
//! Commit and discard both take `self`, so a capture is settled exactly
//! once.

use bytes::{Bytes, BytesMut};
use http::header::CONTENT_TYPE;
use http::{HeaderMap, StatusCode};
use http_body_util::{BodyExt, Full};
use std::fmt;
use std::io;
use std::sync::Arc;

use crate::types::Response;
use crate::writer::ResponseWriter;

/// Status, headers and body captured from an upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedResponse {
    /// Last status the upstream set, `200` if it set none.
    pub status: StatusCode,
    /// Headers as the upstream left them.
    pub headers: HeaderMap,
    /// Everything the upstream wrote.
    pub body: Bytes,
}

impl CapturedResponse {
    /// The `Content-Type` header value, if present and valid text.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE)?.to_str().ok()
    }

    /// Writes status, headers and body into `real`, in that order.
    pub fn commit(self, real: &mut dyn ResponseWriter) -> io::Result<()> {
        {
            let target = real.headers_mut();
            let mut last = None;
            for (name, value) in self.headers {
                // `None` names continue the previous header's values
                let name = match name {
                    Some(name) => {
                        target.remove(&name);
                        last = Some(name.clone());
                        name
                    }
                    None => match &last {
                        Some(name) => name.clone(),
                        None => continue,
                    },
                };
                target.append(name, value);
            }
        }
        real.write_header(self.status);
        real.write_all(&self.body)
    }

    /// Converts the capture into a pipeline response.
    #[must_use]
    pub fn into_response(self) -> Response {
        let mut response = Response::new(Full::new(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Decides from the captured headers whether the buffer limit applies.
pub type LimitScope = Arc<dyn Fn(&HeaderMap) -> bool + Send + Sync>;

/// A [`ResponseWriter`] that buffers the whole response.
///
/// # Example
///
/// ```
/// use http::StatusCode;
/// use kindle_middleware::{ResponseInterceptor, ResponseRecorder, ResponseWriter};
///
/// let mut interceptor = ResponseInterceptor::new();
/// interceptor.write_header(StatusCode::ACCEPTED);
/// interceptor.write_all(b"queued").unwrap();
///
/// let mut real = ResponseRecorder::new();
/// interceptor.commit(&mut real).unwrap();
/// assert_eq!(real.status(), StatusCode::ACCEPTED);
/// assert_eq!(real.body(), b"queued");
/// ```
#[derive(Default)]
pub struct ResponseInterceptor {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
    limit: Option<usize>,
    scope: Option<LimitScope>,
    overflowed: bool,
}

impl fmt::Debug for ResponseInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseInterceptor")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("len", &self.body.len())
            .field("limit", &self.limit)
            .field("scoped", &self.scope.is_some())
            .field("overflowed", &self.overflowed)
            .finish()
    }
}

impl ResponseInterceptor {
    /// Creates an interceptor with no size limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an interceptor that refuses to buffer more than `limit` bytes.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    /// Applies the limit only to responses whose headers satisfy `scope`.
    ///
    /// The scope is consulted when a write would cross the limit, so the
    /// headers an upstream set before writing decide the outcome.
    #[must_use]
    pub fn scoped(mut self, scope: impl Fn(&HeaderMap) -> bool + Send + Sync + 'static) -> Self {
        self.scope = Some(Arc::new(scope));
        self
    }

    /// Captures an already built response into this interceptor.
    ///
    /// The body is run through [`write`](ResponseWriter::write), so a
    /// limit in scope applies; an oversized body leaves the interceptor
    /// overflowed.
    pub async fn capture(mut self, response: Response) -> Self {
        let (parts, body) = response.into_parts();
        let bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(never) => match never {},
        };

        self.status = Some(parts.status);
        self.headers = parts.headers;
        // an overflow is recorded on the interceptor itself
        let _ = self.write(&bytes);
        self
    }

    fn limit_applies(&self) -> bool {
        match &self.scope {
            Some(scope) => scope(&self.headers),
            None => true,
        }
    }

    /// Whether a write was refused for exceeding the limit.
    #[must_use]
    pub fn is_overflowed(&self) -> bool {
        self.overflowed
    }

    /// Bytes buffered so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.body.len()
    }

    /// Whether nothing has been buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Replays the capture into `real` and consumes the interceptor.
    pub fn commit(self, real: &mut dyn ResponseWriter) -> io::Result<()> {
        self.discard().commit(real)
    }

    /// Returns the capture without writing anything.
    #[must_use]
    pub fn discard(self) -> CapturedResponse {
        CapturedResponse {
            status: self.status.unwrap_or(StatusCode::OK),
            headers: self.headers,
            body: self.body.freeze(),
        }
    }
}

impl ResponseWriter for ResponseInterceptor {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if let Some(limit) = self.limit {
            let exceeds = self.overflowed || self.body.len() + data.len() > limit;
            if exceeds && self.limit_applies() {
                self.overflowed = true;
                return Err(io::Error::new(
                    io::ErrorKind::OutOfMemory,
                    format!("response exceeds the {limit} byte buffer limit"),
                ));
            }
        }
        self.body.extend_from_slice(data);
        Ok(data.len())
    }
}
