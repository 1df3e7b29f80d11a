//! Middleware stages.
//!
//! - [`request_id`] assigns each request a UUID v7 and echoes it back.
//! - [`transpile`] runs the transpilation gate over the handler's response.

pub mod request_id;
pub mod transpile;

pub use request_id::{RequestIdMiddleware, RequestIdPolicy};
pub use transpile::TranspileMiddleware;
