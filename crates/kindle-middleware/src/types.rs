//! Common types used throughout the middleware pipeline.

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;

/// The HTTP request type used in the middleware pipeline.
///
/// This is a standard `http::Request` with a `Full<Bytes>` body.
pub type Request = http::Request<Full<Bytes>>;

/// The HTTP response type used in the middleware pipeline.
///
/// This is a standard `http::Response` with a `Full<Bytes>` body.
pub type Response = http::Response<Full<Bytes>>;

/// Extension trait for building error responses.
pub trait ResponseExt {
    /// Creates a plain-text error response.
    fn error(status: StatusCode, message: &str) -> Response;

    /// Creates a response with no body and `Content-Length: 0`.
    fn empty(status: StatusCode) -> Response;
}

impl ResponseExt for Response {
    fn error(status: StatusCode, message: &str) -> Response {
        http::Response::builder()
            .status(status)
            .header(http::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(Full::new(Bytes::from(message.to_string())))
            .expect("failed to build error response")
    }

    fn empty(status: StatusCode) -> Response {
        http::Response::builder()
            .status(status)
            .header(http::header::CONTENT_LENGTH, 0)
            .body(Full::new(Bytes::new()))
            .expect("failed to build empty response")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response() {
        let response = Response::error(StatusCode::NOT_FOUND, "no such config");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(http::header::CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
    }

    #[test]
    fn test_empty_response() {
        let response = Response::empty(StatusCode::BAD_GATEWAY);
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            response.headers().get(http::header::CONTENT_LENGTH).unwrap(),
            "0"
        );
    }
}
