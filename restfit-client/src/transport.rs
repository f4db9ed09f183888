//! The transport boundary.
//!
//! restfit does not speak HTTP itself; an embedding supplies a
//! [`Transport`] that turns bound requests into transport calls. The
//! contract mirrors a callback-style HTTP engine: a call can be executed
//! synchronously or enqueued with a completion callback, canceled
//! idempotently, and queried for its effective timeout.

use std::sync::Arc;
use std::time::Duration;

use restfit_core::{Error, RawResponse, Request};

/// Completion callback for [`TransportCall::enqueue`].
pub type TransportCallback = Box<dyn FnOnce(Result<RawResponse, Error>) + Send>;

/// Creates transport calls from bound requests.
pub trait Transport: Send + Sync {
    /// Create a new call for the request. Creating a call performs no
    /// network activity by itself.
    fn new_call(&self, request: Request) -> Result<Arc<dyn TransportCall>, Error>;
}

/// One in-flight (or not-yet-started) HTTP exchange.
pub trait TransportCall: Send + Sync {
    /// Run the exchange to completion on the current thread.
    fn execute(&self) -> Result<RawResponse, Error>;

    /// Run the exchange in the background, invoking `on_complete` exactly
    /// once with the raw response or a transport fault.
    fn enqueue(&self, on_complete: TransportCallback);

    /// Cancel the exchange. Idempotent; may race with completion.
    fn cancel(&self);

    fn is_canceled(&self) -> bool;

    /// The effective call-spanning timeout, if the transport enforces one.
    fn timeout(&self) -> Option<Duration> {
        None
    }
}
