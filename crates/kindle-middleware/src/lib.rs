//! # Kindle Middleware
//!
//! Response-transpiling middleware.
//!
//! The crate has two layers:
//!
//! - A writer layer: the [`ResponseWriter`] contract, the buffering
//!   [`ResponseInterceptor`] and the [`TranspileGate`] that settles a
//!   captured response. Hosts that hand handlers a writer use
//!   [`TranspileGate::handle`] with an [`Upstream`].
//! - A pipeline layer: [`Middleware`] stages chained by a [`Pipeline`],
//!   where [`stages::TranspileMiddleware`] runs the same gate over a
//!   handler's finished response.
//!
//! ```text
//! request ─▶ upstream ─▶ interceptor ─▶ gate ─┬─▶ pass through
//!                                             ├─▶ transpiled body
//!                                             └─▶ empty 502
//! ```
//!
//! ## Example
//!
//! ```
//! use http::header::CONTENT_TYPE;
//! use http::HeaderValue;
//! use kindle_config::GateConfig;
//! use kindle_middleware::{
//!     Outcome, ResponseInterceptor, ResponseRecorder, ResponseWriter, TranspileGate,
//! };
//! use kindle_transpiler::ContainerLinuxTranspiler;
//!
//! let gate = TranspileGate::new(
//!     GateConfig::new().provision().unwrap(),
//!     ContainerLinuxTranspiler::new(),
//! );
//!
//! let mut interceptor = ResponseInterceptor::new();
//! interceptor
//!     .headers_mut()
//!     .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
//! interceptor.write_all(b"hello").unwrap();
//!
//! let mut sink = ResponseRecorder::new();
//! assert_eq!(gate.settle(interceptor, &mut sink).unwrap(), Outcome::PassedThrough);
//! assert_eq!(sink.body(), b"hello");
//! ```

#![doc(html_root_url = "https://docs.rs/kindle-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod context;
pub mod gate;
pub mod interceptor;
pub mod middleware;
pub mod pipeline;
pub mod stages;
pub mod types;
pub mod upstream;
pub mod writer;

pub use context::MiddlewareContext;
pub use gate::{decide, declared_content_type, Decision, Outcome, TranspileGate};
pub use interceptor::{CapturedResponse, LimitScope, ResponseInterceptor};
pub use middleware::{BoxFuture, BoxedMiddleware, Middleware, Next};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use types::{Request, Response, ResponseExt};
pub use upstream::Upstream;
pub use writer::{ResponseRecorder, ResponseWriter};
