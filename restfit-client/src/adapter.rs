//! Call adapters: from the canonical call object to the declared return
//! shape.
//!
//! An adapter is resolved once per endpoint from an ordered factory chain,
//! the same way converters are. The default factory handles the canonical
//! call shape and is always consulted last; it optionally re-routes
//! completion callbacks through the configured [`CallbackExecutor`].

use std::sync::Arc;

use restfit_core::{BoxedValue, CallShape, EndpointDescriptor, Error, Response, TypeDescriptor};

use crate::call::{Call, Callback};
use crate::client::RestClient;
use crate::executor::CallbackExecutor;

/// What an adapter produced: either a (possibly decorated) call object, or
/// some other value entirely (a future, a stream handle, ...).
pub enum Adapted {
    Call(Box<dyn Call>),
    Value(BoxedValue),
}

impl Adapted {
    pub fn into_call(self) -> Result<Box<dyn Call>, Error> {
        match self {
            Adapted::Call(call) => Ok(call),
            Adapted::Value(_) => Err(Error::config("adapter produced a value, not a call")),
        }
    }

    /// Recover an adapted value at its concrete type.
    pub fn into_value<T: std::any::Any>(self) -> Result<T, Error> {
        match self {
            Adapted::Value(value) => match value.downcast::<T>() {
                Ok(value) => Ok(*value),
                Err(_) => Err(Error::config(format!(
                    "adapted value is not a {}",
                    std::any::type_name::<T>()
                ))),
            },
            Adapted::Call(_) => Err(Error::config("adapter produced a call, not a value")),
        }
    }
}

/// Adapts the canonical call into the endpoint's declared return shape.
pub trait CallAdapter: Send + Sync {
    /// The response body type the endpoint needs a converter for.
    fn response_type(&self) -> TypeDescriptor;

    fn adapt(&self, call: Box<dyn Call>) -> Adapted;
}

/// A source of call adapters for the return shapes it recognizes.
pub trait CallAdapterFactory: Send + Sync {
    /// Factory name used in resolution diagnostics.
    fn name(&self) -> &'static str;

    fn get(
        &self,
        endpoint: &EndpointDescriptor,
        cursor: &AdapterCursor<'_>,
    ) -> Result<Option<Arc<dyn CallAdapter>>, Error>;
}

/// Resolution cursor for delegating adapter factories; `next_call_adapter`
/// resumes the chain strictly past the consulting factory.
pub struct AdapterCursor<'a> {
    client: &'a RestClient,
    index: usize,
}

impl<'a> AdapterCursor<'a> {
    pub(crate) fn new(client: &'a RestClient, index: usize) -> Self {
        AdapterCursor { client, index }
    }

    pub fn next_call_adapter(
        &self,
        endpoint: &EndpointDescriptor,
    ) -> Result<Arc<dyn CallAdapter>, Error> {
        self.client.next_call_adapter(Some(self.index), endpoint)
    }
}

/// Terminal factory for the canonical call shape. Appended last by the
/// builder.
pub struct DefaultCallAdapterFactory {
    executor: Option<Arc<dyn CallbackExecutor>>,
}

impl DefaultCallAdapterFactory {
    pub fn new(executor: Option<Arc<dyn CallbackExecutor>>) -> Self {
        DefaultCallAdapterFactory { executor }
    }
}

impl CallAdapterFactory for DefaultCallAdapterFactory {
    fn name(&self) -> &'static str {
        "DefaultCallAdapterFactory"
    }

    fn get(
        &self,
        endpoint: &EndpointDescriptor,
        _cursor: &AdapterCursor<'_>,
    ) -> Result<Option<Arc<dyn CallAdapter>>, Error> {
        let returns = endpoint.return_type();
        if returns.shape() != std::any::TypeId::of::<CallShape>() {
            return Ok(None);
        }
        let executor = if endpoint.skips_callback_executor() {
            None
        } else {
            self.executor.clone()
        };
        Ok(Some(Arc::new(DefaultCallAdapter {
            body: returns.body().clone(),
            executor,
        })))
    }
}

struct DefaultCallAdapter {
    body: TypeDescriptor,
    executor: Option<Arc<dyn CallbackExecutor>>,
}

impl CallAdapter for DefaultCallAdapter {
    fn response_type(&self) -> TypeDescriptor {
        self.body.clone()
    }

    fn adapt(&self, call: Box<dyn Call>) -> Adapted {
        match &self.executor {
            Some(executor) => Adapted::Call(Box::new(ExecutorCallbackCall {
                executor: executor.clone(),
                delegate: Arc::from(call),
            })),
            None => Adapted::Call(call),
        }
    }
}

/// Decorates a call so completion callbacks run on the configured
/// executor. A cancellation that lands while the callback is queued is
/// delivered as a canceled failure rather than a stale response.
pub struct ExecutorCallbackCall {
    executor: Arc<dyn CallbackExecutor>,
    delegate: Arc<dyn Call>,
}

impl Call for ExecutorCallbackCall {
    fn execute(&self) -> Result<Response, Error> {
        self.delegate.execute()
    }

    fn enqueue(&self, callback: Box<dyn Callback>) {
        self.delegate.enqueue(Box::new(RoutedCallback {
            executor: self.executor.clone(),
            call: self.delegate.clone(),
            inner: callback,
        }));
    }

    fn is_executed(&self) -> bool {
        self.delegate.is_executed()
    }

    fn cancel(&self) {
        self.delegate.cancel();
    }

    fn is_canceled(&self) -> bool {
        self.delegate.is_canceled()
    }

    fn request(&self) -> &restfit_core::Request {
        self.delegate.request()
    }

    fn timeout(&self) -> Option<std::time::Duration> {
        self.delegate.timeout()
    }

    fn clone_call(&self) -> Box<dyn Call> {
        Box::new(ExecutorCallbackCall {
            executor: self.executor.clone(),
            delegate: Arc::from(self.delegate.clone_call()),
        })
    }
}

struct RoutedCallback {
    executor: Arc<dyn CallbackExecutor>,
    call: Arc<dyn Call>,
    inner: Box<dyn Callback>,
}

impl Callback for RoutedCallback {
    fn on_response(self: Box<Self>, response: Response) {
        let RoutedCallback {
            executor,
            call,
            inner,
        } = *self;
        executor.execute(Box::new(move || {
            if call.is_canceled() {
                inner.on_failure(Error::Canceled);
            } else {
                inner.on_response(response);
            }
        }));
    }

    fn on_failure(self: Box<Self>, error: Error) {
        let RoutedCallback {
            executor, inner, ..
        } = *self;
        executor.execute(Box::new(move || inner.on_failure(error)));
    }
}
