//! Client configuration.

use std::collections::HashMap;
use std::sync::Arc;

use restfit_core::{EndpointDescriptor, EndpointId, Error};
use url::Url;

use crate::adapter::{CallAdapterFactory, DefaultCallAdapterFactory};
use crate::builtin::{BuiltInConverterFactory, OptionalConverterFactory};
use crate::client::RestClient;
use crate::converter::ConverterFactory;
use crate::executor::CallbackExecutor;
use crate::future::FutureCallAdapterFactory;
use crate::transport::Transport;

/// Builds a [`RestClient`].
///
/// Factory ordering is fixed where it matters for correctness: built-in
/// converters run before user factories so the raw pass-through types
/// cannot be shadowed, and the optional-wrapper factory runs after them so
/// a user factory that handles the optional type directly wins. Call
/// adapter factories are consulted user-first, with the future and default
/// adapters appended last.
#[derive(Default)]
pub struct ClientBuilder {
    transport: Option<Arc<dyn Transport>>,
    base_url: Option<String>,
    converter_factories: Vec<Arc<dyn ConverterFactory>>,
    call_adapter_factories: Vec<Arc<dyn CallAdapterFactory>>,
    callback_executor: Option<Arc<dyn CallbackExecutor>>,
    validate_eagerly: bool,
    endpoints: Vec<(EndpointId, EndpointDescriptor)>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// The base URL all path templates resolve against. Its path must end
    /// in `/` so relative templates extend it instead of replacing its
    /// last segment.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn converter_factory(mut self, factory: impl ConverterFactory + 'static) -> Self {
        self.converter_factories.push(Arc::new(factory));
        self
    }

    pub fn call_adapter_factory(mut self, factory: impl CallAdapterFactory + 'static) -> Self {
        self.call_adapter_factories.push(Arc::new(factory));
        self
    }

    /// The executor that completion callbacks are re-routed through,
    /// unless an endpoint opts out with
    /// [`EndpointDescriptor::skip_callback_executor`].
    pub fn callback_executor(mut self, executor: impl CallbackExecutor + 'static) -> Self {
        self.callback_executor = Some(Arc::new(executor));
        self
    }

    /// Compile every registered endpoint during [`ClientBuilder::build`],
    /// surfacing the first broken descriptor immediately instead of on
    /// first use.
    pub fn validate_eagerly(mut self, validate: bool) -> Self {
        self.validate_eagerly = validate;
        self
    }

    /// Register an endpoint under its cache key.
    pub fn endpoint(mut self, id: EndpointId, descriptor: EndpointDescriptor) -> Self {
        self.endpoints.push((id, descriptor));
        self
    }

    pub fn build(self) -> Result<RestClient, Error> {
        let transport = self
            .transport
            .ok_or_else(|| Error::config("transport is required"))?;

        let base_url = self
            .base_url
            .ok_or_else(|| Error::config("base url is required"))?;
        let base_url = Url::parse(&base_url)
            .map_err(|e| Error::config(format!("invalid base url {base_url:?}: {e}")))?;
        if !base_url.path().ends_with('/') {
            return Err(Error::config(format!(
                "base url must end in /: {base_url}"
            )));
        }

        let mut converter_factories: Vec<Arc<dyn ConverterFactory>> =
            vec![Arc::new(BuiltInConverterFactory)];
        converter_factories.extend(self.converter_factories);
        converter_factories.push(Arc::new(OptionalConverterFactory));

        let mut call_adapter_factories = self.call_adapter_factories;
        call_adapter_factories.push(Arc::new(FutureCallAdapterFactory));
        call_adapter_factories.push(Arc::new(DefaultCallAdapterFactory::new(
            self.callback_executor,
        )));

        let mut endpoints = HashMap::with_capacity(self.endpoints.len());
        for (id, descriptor) in self.endpoints {
            if endpoints.insert(id, Arc::new(descriptor)).is_some() {
                return Err(Error::config(format!(
                    "endpoint {id} registered more than once"
                )));
            }
        }

        let client = RestClient::from_parts(
            transport,
            base_url,
            converter_factories,
            call_adapter_factories,
            endpoints,
        );

        if self.validate_eagerly {
            let mut ids: Vec<EndpointId> = client.inner_endpoint_ids();
            ids.sort_by_key(|id| id.0);
            for id in ids {
                client.compile_or_get(id)?;
            }
        }

        Ok(client)
    }
}
