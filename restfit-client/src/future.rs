//! The future call adapter: one invocation as a single-resolution promise.
//!
//! Endpoints declared with [`restfit_core::FutureShape`] adapt into a
//! [`CallFuture`]: the call is enqueued immediately and the outcome is
//! delivered through a oneshot channel, at most once. Dropping the future
//! before it resolves cancels the underlying call.

use std::any::{Any, TypeId};
use std::sync::Arc;

use restfit_core::{
    BoxedValue, EndpointDescriptor, Error, FutureShape, Response, TypeDescriptor,
};
use tokio::sync::oneshot;

use crate::adapter::{Adapted, AdapterCursor, CallAdapter, CallAdapterFactory};
use crate::call::{Call, Callback};

/// Serves [`FutureShape`] returns. Installed by the builder ahead of the
/// default factory.
pub struct FutureCallAdapterFactory;

impl CallAdapterFactory for FutureCallAdapterFactory {
    fn name(&self) -> &'static str {
        "FutureCallAdapterFactory"
    }

    fn get(
        &self,
        endpoint: &EndpointDescriptor,
        _cursor: &AdapterCursor<'_>,
    ) -> Result<Option<Arc<dyn CallAdapter>>, Error> {
        let returns = endpoint.return_type();
        if returns.shape() != TypeId::of::<FutureShape>() {
            return Ok(None);
        }
        Ok(Some(Arc::new(FutureCallAdapter {
            body: returns.body().clone(),
        })))
    }
}

struct FutureCallAdapter {
    body: TypeDescriptor,
}

impl CallAdapter for FutureCallAdapter {
    fn response_type(&self) -> TypeDescriptor {
        self.body.clone()
    }

    fn adapt(&self, call: Box<dyn Call>) -> Adapted {
        Adapted::Value(Box::new(CallFuture::spawn(Arc::from(call))))
    }
}

/// The promised body of one enqueued invocation.
///
/// Resolves with the decoded body, an HTTP fault for non-2xx responses, a
/// null-body fault for body-less successes, or the call's failure.
/// Dropping an unresolved future cancels the call.
pub struct CallFuture {
    rx: oneshot::Receiver<Result<BoxedValue, Error>>,
    call: Arc<dyn Call>,
    resolved: bool,
}

impl CallFuture {
    fn spawn(call: Arc<dyn Call>) -> Self {
        let (tx, rx) = oneshot::channel();
        call.enqueue(Box::new(PromiseCallback { tx }));
        CallFuture {
            rx,
            call,
            resolved: false,
        }
    }

    /// Await the decoded body at its concrete type.
    pub async fn body<T: Any>(mut self) -> Result<T, Error> {
        let outcome = (&mut self.rx).await;
        self.resolved = true;
        let value = outcome.map_err(|_| Error::Canceled)??;
        match value.downcast::<T>() {
            Ok(body) => Ok(*body),
            Err(_) => Err(Error::decode(format!(
                "response body is not a {}",
                std::any::type_name::<T>()
            ))),
        }
    }

    /// Cancel the underlying call.
    pub fn cancel(&self) {
        self.call.cancel();
    }

    pub fn is_canceled(&self) -> bool {
        self.call.is_canceled()
    }
}

impl Drop for CallFuture {
    fn drop(&mut self) {
        if !self.resolved {
            self.call.cancel();
        }
    }
}

struct PromiseCallback {
    tx: oneshot::Sender<Result<BoxedValue, Error>>,
}

impl Callback for PromiseCallback {
    fn on_response(self: Box<Self>, response: Response) {
        let outcome = if response.is_success() {
            match response.into_body() {
                Some(value) => Ok(value),
                None => Err(Error::null_body(
                    "response body was absent; declare an optional body type to allow it",
                )),
            }
        } else {
            let (status, message, headers, _, error_body) = response.into_parts();
            Err(Error::status(
                status,
                message,
                headers,
                error_body.unwrap_or_default(),
            ))
        };
        // The receiver may already be gone; the call was canceled then.
        let _ = self.tx.send(outcome);
    }

    fn on_failure(self: Box<Self>, error: Error) {
        let _ = self.tx.send(Err(error));
    }
}
