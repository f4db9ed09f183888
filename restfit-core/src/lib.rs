//! Core types for restfit, shared between the client pipeline and
//! transport implementations.
//!
//! This crate carries the data model only: the error taxonomy, the
//! type-erased value and descriptor machinery, endpoint descriptors, and
//! the request/response types that cross the transport boundary. The
//! invocation pipeline itself (converters, call adapters, the method cache,
//! call objects) lives in `restfit-client`.

pub mod descriptor;
pub mod error;
pub mod request;
pub mod response;
pub mod value;

pub use descriptor::{
    BodyKind, CallShape, EndpointDescriptor, EndpointId, FutureShape, Parameter, ParameterRole,
    ReturnType,
};
pub use error::{Error, StatusContext};
pub use request::{Request, RequestBody};
pub use response::{RawResponse, Response, ResponseBody};
pub use value::{Argument, BoxedValue, TypeDescriptor};
