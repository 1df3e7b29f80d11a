//! The response-writer contract.
//!
//! Upstream handlers produce their response by calling into a
//! [`ResponseWriter`]: set headers, choose a status, write body bytes. The
//! gate hands them a [`ResponseInterceptor`](crate::ResponseInterceptor)
//! instead of the real writer, and later replays the result into the real
//! one.

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;
use std::io;

use crate::types::Response;

/// Sink for a single HTTP response.
pub trait ResponseWriter: Send {
    /// Headers that will be sent with the response.
    fn headers(&self) -> &HeaderMap;

    /// Mutable access to the response headers.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Sets the response status.
    fn write_header(&mut self, status: StatusCode);

    /// Writes body bytes, returning how many were accepted.
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Writes all of `data`.
    fn write_all(&mut self, mut data: &[u8]) -> io::Result<()> {
        while !data.is_empty() {
            match self.write(data)? {
                0 => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "response writer accepted no bytes",
                    ))
                }
                n => data = &data[n..],
            }
        }
        Ok(())
    }
}

/// A [`ResponseWriter`] that records the response in memory.
///
/// The status is fixed by the first `write_header` or `write` call, the way
/// a network writer behaves once the status line is on the wire.
///
/// # Example
///
/// ```
/// use http::StatusCode;
/// use kindle_middleware::{ResponseRecorder, ResponseWriter};
///
/// let mut recorder = ResponseRecorder::new();
/// recorder.write_header(StatusCode::CREATED);
/// recorder.write_all(b"done").unwrap();
///
/// let response = recorder.into_response();
/// assert_eq!(response.status(), StatusCode::CREATED);
/// ```
#[derive(Debug, Default)]
pub struct ResponseRecorder {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
}

impl ResponseRecorder {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Status written so far, `200` if none was.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    /// Body written so far.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Converts the recording into a response.
    #[must_use]
    pub fn into_response(self) -> Response {
        let mut response = Response::new(Full::new(self.body.freeze()));
        *response.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = self.headers;
        response
    }

    /// Converts the recording into its parts.
    #[must_use]
    pub fn into_parts(self) -> (StatusCode, HeaderMap, Bytes) {
        (
            self.status.unwrap_or(StatusCode::OK),
            self.headers,
            self.body.freeze(),
        )
    }
}

impl ResponseWriter for ResponseRecorder {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, status: StatusCode) {
        match self.status {
            Some(current) => {
                tracing::debug!(%current, ignored = %status, "superfluous write_header call");
            }
            None => self.status = Some(status),
        }
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.body.extend_from_slice(data);
        Ok(data.len())
    }
}
