//! Declarative HTTP client pipeline over a pluggable transport.
//!
//! Endpoints are described once as data ([`EndpointDescriptor`]) and
//! registered with a [`RestClient`]; every other concern is an ordered,
//! extensible chain: converter factories turn typed values into request
//! bodies and response bodies back into typed values, call adapter
//! factories turn the canonical [`Call`] object into the declared return
//! shape. Descriptors compile once, with fail-fast validation, into cached
//! [`CompiledMethod`]s.
//!
//! The crate speaks no HTTP itself: an embedding supplies a [`Transport`].
//!
//! ```no_run
//! use restfit_client::{Argument, EndpointDescriptor, EndpointId, RestClient, ReturnType};
//! # fn transport() -> std::sync::Arc<dyn restfit_client::Transport> { unimplemented!() }
//!
//! # async fn run() -> Result<(), restfit_client::Error> {
//! const GET_USER: EndpointId = EndpointId("get_user");
//!
//! let client = RestClient::builder()
//!     .shared_transport(transport())
//!     .base_url("https://api.example.com/v1/")
//!     .endpoint(
//!         GET_USER,
//!         EndpointDescriptor::get("users/{id}")
//!             .path_param::<u64>("id")
//!             .returns(ReturnType::call_of::<String>()),
//!     )
//!     .build()?;
//!
//! let name: String = client
//!     .call::<String>(GET_USER, &[Argument::scalar(42u64)])?
//!     .body()
//!     .await?;
//! # let _ = name;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod builder;
pub mod builtin;
pub mod call;
pub mod client;
pub mod converter;
pub mod executor;
pub mod future;
pub mod method;
pub mod request;
pub mod transport;
pub mod typed;

pub use adapter::{Adapted, AdapterCursor, CallAdapter, CallAdapterFactory};
pub use builder::ClientBuilder;
pub use builtin::{
    BuiltInConverterFactory, JsonConverterFactory, OptionalConverterFactory, ToStringConverter,
};
pub use call::{Call, Callback, HttpCall};
pub use client::RestClient;
pub use converter::{
    ConverterCursor, ConverterFactory, RequestConverter, ResponseConverter, StringConverter,
};
pub use executor::{CallbackExecutor, InlineExecutor, TokioExecutor};
pub use future::{CallFuture, FutureCallAdapterFactory};
pub use method::{CompiledMethod, RequestTemplate};
pub use request::RequestBuilder;
pub use transport::{Transport, TransportCall, TransportCallback};
pub use typed::TypedCall;

// Re-export the core data model so most users need a single import.
pub use restfit_core::{
    Argument, BodyKind, BoxedValue, CallShape, EndpointDescriptor, EndpointId, Error, FutureShape,
    Parameter, ParameterRole, RawResponse, Request, RequestBody, Response, ResponseBody,
    ReturnType, StatusContext, TypeDescriptor,
};
