//! The handler the gate wraps.

use kindle_core::UpstreamError;

use crate::middleware::BoxFuture;
use crate::types::Request;
use crate::writer::ResponseWriter;

/// A handler that produces a response by writing into a [`ResponseWriter`].
///
/// The gate calls [`serve`](Upstream::serve) exactly once per request and
/// never retries it.
///
/// # Example
///
/// ```
/// use kindle_core::UpstreamError;
/// use kindle_middleware::{BoxFuture, Request, ResponseWriter, Upstream};
///
/// struct Hello;
///
/// impl Upstream for Hello {
///     fn serve<'a>(
///         &'a self,
///         sink: &'a mut dyn ResponseWriter,
///         _request: &'a Request,
///     ) -> BoxFuture<'a, Result<(), UpstreamError>> {
///         Box::pin(async move {
///             sink.write_all(b"hello")?;
///             Ok(())
///         })
///     }
/// }
/// ```
pub trait Upstream: Send + Sync {
    /// Writes the response for `request` into `sink`.
    fn serve<'a>(
        &'a self,
        sink: &'a mut dyn ResponseWriter,
        request: &'a Request,
    ) -> BoxFuture<'a, Result<(), UpstreamError>>;
}

impl<U: Upstream + ?Sized> Upstream for std::sync::Arc<U> {
    fn serve<'a>(
        &'a self,
        sink: &'a mut dyn ResponseWriter,
        request: &'a Request,
    ) -> BoxFuture<'a, Result<(), UpstreamError>> {
        (**self).serve(sink, request)
    }
}
