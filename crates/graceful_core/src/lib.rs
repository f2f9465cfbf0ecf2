//! Deadline shrinking for handlers that run under a hard host deadline.
//!
//! This crate owns the invocation context, the uniform handler shape, and the
//! grace-period decision. It intentionally excludes Lambda runtime concerns.
//! See `crates/graceful_lambda` for the host binding.

pub mod context;
pub mod error;
pub mod graceful;
pub mod handler;

pub use context::{DoneReason, InvocationContext};
pub use error::{BoxError, InvokeError, Rejection, NULL_RESULT};
pub use graceful::{with_graceful_shutdown, Graceful};
pub use handler::{handler_fn, json_handler, AdapterError, Handler, HandlerFn, JsonHandler};
