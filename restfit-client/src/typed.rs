//! The typed facade over a call object, and its async bridge.
//!
//! [`TypedCall`] pins the decoded body type and exposes the three async
//! wait-points: [`TypedCall::body`] (HTTP fault on non-2xx, null-body
//! fault on an absent body), [`TypedCall::optional_body`] (absent body is
//! `None`), and [`TypedCall::response`] (always resumes with the
//! envelope). All three share one oneshot wait-point; dropping the future
//! mid-await cancels the call, so cooperative cancellation of the
//! surrounding task reaches the transport.

use std::any::Any;
use std::marker::PhantomData;
use std::time::Duration;

use restfit_core::{Error, Request, Response};
use tokio::sync::oneshot;

use crate::call::{Call, Callback};

/// A call whose decoded body type is known statically.
pub struct TypedCall<T> {
    inner: Box<dyn Call>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> std::fmt::Debug for TypedCall<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedCall").finish_non_exhaustive()
    }
}

impl<T: Any + Send> TypedCall<T> {
    pub(crate) fn new(inner: Box<dyn Call>) -> Self {
        TypedCall {
            inner,
            _marker: PhantomData,
        }
    }

    /// Run the exchange on the current thread.
    pub fn execute(self) -> Result<Response<T>, Error> {
        self.inner.execute()?.downcast::<T>()
    }

    /// Deliver the outcome through an untyped callback.
    pub fn enqueue(&self, callback: Box<dyn Callback>) {
        self.inner.enqueue(callback);
    }

    /// Await the decoded body of a successful response.
    pub async fn body(self) -> Result<T, Error> {
        let response = await_response(self.inner.as_ref()).await?;
        if !response.is_success() {
            let (status, message, headers, _, error_body) = response.into_parts();
            return Err(Error::status(
                status,
                message,
                headers,
                error_body.unwrap_or_default(),
            ));
        }
        match response.into_body() {
            Some(value) => match value.downcast::<T>() {
                Ok(body) => Ok(*body),
                Err(_) => Err(Error::decode(format!(
                    "response body is not a {}",
                    std::any::type_name::<T>()
                ))),
            },
            None => Err(Error::null_body(
                "response body was absent; use optional_body to allow it",
            )),
        }
    }

    /// Await the decoded body, mapping an absent body to `None` instead of
    /// a fault.
    pub async fn optional_body(self) -> Result<Option<T>, Error> {
        let response = await_response(self.inner.as_ref()).await?;
        if !response.is_success() {
            let (status, message, headers, _, error_body) = response.into_parts();
            return Err(Error::status(
                status,
                message,
                headers,
                error_body.unwrap_or_default(),
            ));
        }
        match response.into_body() {
            Some(value) => match value.downcast::<T>() {
                Ok(body) => Ok(Some(*body)),
                Err(_) => Err(Error::decode(format!(
                    "response body is not a {}",
                    std::any::type_name::<T>()
                ))),
            },
            None => Ok(None),
        }
    }

    /// Await the full envelope; an HTTP error status resumes normally.
    pub async fn response(self) -> Result<Response<T>, Error> {
        await_response(self.inner.as_ref()).await?.downcast::<T>()
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_canceled(&self) -> bool {
        self.inner.is_canceled()
    }

    pub fn is_executed(&self) -> bool {
        self.inner.is_executed()
    }

    pub fn request(&self) -> &Request {
        self.inner.request()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.inner.timeout()
    }

    /// A fresh, unexecuted call over the identical bound request.
    pub fn clone_call(&self) -> TypedCall<T> {
        TypedCall::new(self.inner.clone_call())
    }
}

/// Enqueue the call and await its single completion. Dropping the future
/// mid-await cancels the call.
async fn await_response(call: &dyn Call) -> Result<Response, Error> {
    let (tx, rx) = oneshot::channel();
    call.enqueue(Box::new(OneshotCallback { tx }));
    let mut guard = CancelGuard { call, armed: true };
    let outcome = rx.await;
    guard.armed = false;
    match outcome {
        Ok(result) => result,
        // The sender side can only vanish without sending if callback
        // delivery was abandoned, which a cancellation causes.
        Err(_) => Err(Error::Canceled),
    }
}

struct OneshotCallback {
    tx: oneshot::Sender<Result<Response, Error>>,
}

impl Callback for OneshotCallback {
    fn on_response(self: Box<Self>, response: Response) {
        let _ = self.tx.send(Ok(response));
    }

    fn on_failure(self: Box<Self>, error: Error) {
        let _ = self.tx.send(Err(error));
    }
}

struct CancelGuard<'a> {
    call: &'a dyn Call,
    armed: bool,
}

impl Drop for CancelGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.call.cancel();
        }
    }
}
