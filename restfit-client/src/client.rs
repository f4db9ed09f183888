//! The client: factory chains, the compiled-method cache, and the public
//! invocation operations.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use restfit_core::{
    Argument, EndpointDescriptor, EndpointId, Error, Request, TypeDescriptor,
};
use tracing::{debug, trace};
use url::Url;

use crate::adapter::{Adapted, AdapterCursor, CallAdapter, CallAdapterFactory};
use crate::builder::ClientBuilder;
use crate::builtin::ToStringConverter;
use crate::call::{Call, HttpCall};
use crate::converter::{
    ConverterCursor, ConverterFactory, RequestConverter, ResponseConverter, StringConverter,
};
use crate::method::CompiledMethod;
use crate::transport::Transport;
use crate::typed::TypedCall;

/// A configured client over some transport. Cheap to clone; all state is
/// shared.
///
/// Endpoints are registered up front with the [`ClientBuilder`] and
/// compiled lazily (or eagerly, see
/// [`ClientBuilder::validate_eagerly`]) into cached [`CompiledMethod`]s.
#[derive(Clone)]
pub struct RestClient {
    inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) base_url: Url,
    pub(crate) converter_factories: Vec<Arc<dyn ConverterFactory>>,
    pub(crate) call_adapter_factories: Vec<Arc<dyn CallAdapterFactory>>,
    pub(crate) endpoints: HashMap<EndpointId, Arc<EndpointDescriptor>>,
    cache: RwLock<HashMap<EndpointId, Arc<CompiledMethod>>>,
    // Serializes compilation so concurrent first calls to the same
    // endpoint compile it once; reads stay lock-free on the RwLock fast
    // path. Failures are returned, never cached.
    compile_lock: Mutex<()>,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient").finish_non_exhaustive()
    }
}

impl RestClient {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub(crate) fn from_parts(
        transport: Arc<dyn Transport>,
        base_url: Url,
        converter_factories: Vec<Arc<dyn ConverterFactory>>,
        call_adapter_factories: Vec<Arc<dyn CallAdapterFactory>>,
        endpoints: HashMap<EndpointId, Arc<EndpointDescriptor>>,
    ) -> Self {
        RestClient {
            inner: Arc::new(ClientInner {
                transport,
                base_url,
                converter_factories,
                call_adapter_factories,
                endpoints,
                cache: RwLock::new(HashMap::new()),
                compile_lock: Mutex::new(()),
            }),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    pub(crate) fn inner_endpoint_ids(&self) -> Vec<EndpointId> {
        self.inner.endpoints.keys().copied().collect()
    }

    /// Get the compiled form of a registered endpoint, compiling it on
    /// first use. Concurrent first uses compile once; a failed compile is
    /// reported to every waiter and retried on the next use.
    pub fn compile_or_get(&self, id: EndpointId) -> Result<Arc<CompiledMethod>, Error> {
        if let Some(compiled) = self.inner.cache.read().get(&id) {
            return Ok(compiled.clone());
        }
        let _guard = self.inner.compile_lock.lock();
        if let Some(compiled) = self.inner.cache.read().get(&id) {
            return Ok(compiled.clone());
        }
        let descriptor = self
            .inner
            .endpoints
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::config(format!("no endpoint registered as {id}")))?;
        debug!(endpoint = %id, "compiling endpoint");
        let compiled = Arc::new(CompiledMethod::compile(self, descriptor)?);
        self.inner.cache.write().insert(id, compiled.clone());
        Ok(compiled)
    }

    /// Bind call-site arguments into the immutable request an invocation
    /// of `id` would send. No transport interaction.
    pub fn bind(&self, id: EndpointId, args: &[Argument]) -> Result<Request, Error> {
        let compiled = self.compile_or_get(id)?;
        let request = compiled.template().bind(args)?;
        trace!(endpoint = %id, url = %request.url(), "bound request");
        Ok(request)
    }

    /// Create the canonical, un-adapted call for an invocation of `id`.
    pub fn new_call(&self, id: EndpointId, args: &[Argument]) -> Result<Box<dyn Call>, Error> {
        let compiled = self.compile_or_get(id)?;
        let request = compiled.template().bind(args)?;
        Ok(Box::new(HttpCall::new(
            self.inner.transport.clone(),
            request,
            compiled.response_converter(),
        )))
    }

    /// Invoke `id`: create the canonical call and run it through the
    /// endpoint's resolved call adapter.
    pub fn invoke(&self, id: EndpointId, args: &[Argument]) -> Result<Adapted, Error> {
        let compiled = self.compile_or_get(id)?;
        let call = self.new_call(id, args)?;
        Ok(compiled.adapter().adapt(call))
    }

    /// Invoke `id` and return the adapted call with its decoded body type
    /// pinned to `T`.
    ///
    /// Fails with a configuration error when `T` is not the body type the
    /// endpoint decodes, or when the endpoint's adapter does not produce a
    /// call object.
    pub fn call<T: Any + Send>(
        &self,
        id: EndpointId,
        args: &[Argument],
    ) -> Result<TypedCall<T>, Error> {
        let compiled = self.compile_or_get(id)?;
        let decoded = compiled.adapter().response_type();
        if decoded.id() != TypeId::of::<T>() {
            return Err(Error::config(format!(
                "endpoint {id} decodes {} but {} was requested",
                decoded.name(),
                std::any::type_name::<T>()
            )));
        }
        match self.invoke(id, args)? {
            Adapted::Call(call) => Ok(TypedCall::new(call)),
            Adapted::Value(_) => Err(Error::config(format!(
                "endpoint {id} does not adapt to a call object"
            ))),
        }
    }

    // Chain resolution. `skip_past` is the index of the factory asking
    // for a delegate; resolution resumes strictly after it.

    pub(crate) fn request_converter(
        &self,
        ty: &TypeDescriptor,
    ) -> Result<Arc<dyn RequestConverter>, Error> {
        self.next_request_converter(None, ty)
    }

    pub(crate) fn next_request_converter(
        &self,
        skip_past: Option<usize>,
        ty: &TypeDescriptor,
    ) -> Result<Arc<dyn RequestConverter>, Error> {
        let start = skip_past.map_or(0, |i| i + 1);
        for (i, factory) in self
            .inner
            .converter_factories
            .iter()
            .enumerate()
            .skip(start)
        {
            let cursor = ConverterCursor::new(self, i);
            if let Some(converter) = factory.request_converter(ty, &cursor)? {
                return Ok(converter);
            }
        }
        Err(self.converter_resolution_error("request body converter", ty.name(), start))
    }

    pub(crate) fn response_converter(
        &self,
        ty: &TypeDescriptor,
    ) -> Result<Arc<dyn ResponseConverter>, Error> {
        self.next_response_converter(None, ty)
    }

    pub(crate) fn next_response_converter(
        &self,
        skip_past: Option<usize>,
        ty: &TypeDescriptor,
    ) -> Result<Arc<dyn ResponseConverter>, Error> {
        let start = skip_past.map_or(0, |i| i + 1);
        for (i, factory) in self
            .inner
            .converter_factories
            .iter()
            .enumerate()
            .skip(start)
        {
            let cursor = ConverterCursor::new(self, i);
            if let Some(converter) = factory.response_converter(ty, &cursor)? {
                return Ok(converter);
            }
        }
        Err(self.converter_resolution_error("response body converter", ty.name(), start))
    }

    /// String conversion never fails to resolve: any factory may serve the
    /// type, and the render-function fallback takes it otherwise.
    pub(crate) fn string_converter(&self, ty: &TypeDescriptor) -> Arc<dyn StringConverter> {
        for (i, factory) in self.inner.converter_factories.iter().enumerate() {
            let cursor = ConverterCursor::new(self, i);
            if let Ok(Some(converter)) = factory.string_converter(ty, &cursor) {
                return converter;
            }
        }
        Arc::new(ToStringConverter)
    }

    pub(crate) fn call_adapter(
        &self,
        endpoint: &EndpointDescriptor,
    ) -> Result<Arc<dyn CallAdapter>, Error> {
        self.next_call_adapter(None, endpoint)
    }

    pub(crate) fn next_call_adapter(
        &self,
        skip_past: Option<usize>,
        endpoint: &EndpointDescriptor,
    ) -> Result<Arc<dyn CallAdapter>, Error> {
        let start = skip_past.map_or(0, |i| i + 1);
        for (i, factory) in self
            .inner
            .call_adapter_factories
            .iter()
            .enumerate()
            .skip(start)
        {
            let cursor = AdapterCursor::new(self, i);
            if let Some(adapter) = factory.get(endpoint, &cursor)? {
                return Ok(adapter);
            }
        }
        let mut message = format!(
            "could not locate call adapter for return shape {}.",
            endpoint.return_type().shape_name()
        );
        append_factory_lists(
            &mut message,
            self.inner.call_adapter_factories.iter().map(|f| f.name()),
            start,
        );
        Err(Error::Configuration(message))
    }

    fn converter_resolution_error(&self, what: &str, ty: &str, start: usize) -> Error {
        let mut message = format!("could not locate {what} for {ty}.");
        append_factory_lists(
            &mut message,
            self.inner.converter_factories.iter().map(|f| f.name()),
            start,
        );
        Error::Configuration(message)
    }
}

/// Append the Skipped/Tried factory name lists to a resolution diagnostic.
fn append_factory_lists<'a>(
    message: &mut String,
    names: impl Iterator<Item = &'a str>,
    start: usize,
) {
    let names: Vec<&str> = names.collect();
    if start > 0 {
        message.push_str("\n  Skipped:");
        for name in &names[..start.min(names.len())] {
            message.push_str("\n  * ");
            message.push_str(name);
        }
    }
    message.push_str("\n  Tried:");
    for name in &names[start.min(names.len())..] {
        message.push_str("\n  * ");
        message.push_str(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_lists_mark_skipped_and_tried() {
        let mut message = String::from("could not locate response body converter for Foo.");
        append_factory_lists(&mut message, ["A", "B", "C"].into_iter(), 1);
        assert_eq!(
            message,
            "could not locate response body converter for Foo.\n  Skipped:\n  * A\n  Tried:\n  * B\n  * C"
        );
    }

    #[test]
    fn test_factory_lists_without_skip() {
        let mut message = String::new();
        append_factory_lists(&mut message, ["A"].into_iter(), 0);
        assert_eq!(message, "\n  Tried:\n  * A");
    }
}
