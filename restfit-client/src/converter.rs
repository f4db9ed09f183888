//! Converter traits and the skip-past resolution cursor.
//!
//! Converters turn typed argument values into serialized request bodies and
//! response bodies back into typed values. They are produced by
//! [`ConverterFactory`] instances consulted in registration order; a factory
//! that does not recognize a type answers `Ok(None)` and the chain moves on.
//!
//! A delegating factory (one that handles a wrapper type and needs the
//! chain to serve the inner type) resumes resolution through the
//! [`ConverterCursor`] it is handed, which skips past the factory itself so
//! delegation can never loop.

use std::sync::Arc;

use restfit_core::{Argument, BoxedValue, Error, RequestBody, ResponseBody, TypeDescriptor};

use crate::client::RestClient;

/// Serializes one typed argument into a request body.
pub trait RequestConverter: Send + Sync {
    fn convert(&self, value: &Argument) -> Result<RequestBody, Error>;
}

/// Deserializes a response body into a type-erased value.
///
/// Returning `Ok(None)` means the converter consumed the body and decoded
/// "nothing" (an absent optional); the classification layer maps it to a
/// body-less success envelope.
pub trait ResponseConverter: Send + Sync {
    fn convert(&self, body: ResponseBody) -> Result<Option<BoxedValue>, Error>;
}

/// Renders one typed argument into a string for path, query, header, and
/// form-field positions.
pub trait StringConverter: Send + Sync {
    fn convert(&self, value: &Argument) -> Result<String, Error>;
}

/// A source of converters for the types it recognizes.
///
/// All three entry points default to "not mine". Methods return
/// `Result<Option<…>>` so a delegating factory can surface a failure from
/// its inner resolution instead of silently dropping out of the chain.
pub trait ConverterFactory: Send + Sync {
    /// Factory name used in resolution diagnostics.
    fn name(&self) -> &'static str;

    fn request_converter(
        &self,
        ty: &TypeDescriptor,
        cursor: &ConverterCursor<'_>,
    ) -> Result<Option<Arc<dyn RequestConverter>>, Error> {
        let _ = (ty, cursor);
        Ok(None)
    }

    fn response_converter(
        &self,
        ty: &TypeDescriptor,
        cursor: &ConverterCursor<'_>,
    ) -> Result<Option<Arc<dyn ResponseConverter>>, Error> {
        let _ = (ty, cursor);
        Ok(None)
    }

    fn string_converter(
        &self,
        ty: &TypeDescriptor,
        cursor: &ConverterCursor<'_>,
    ) -> Result<Option<Arc<dyn StringConverter>>, Error> {
        let _ = (ty, cursor);
        Ok(None)
    }
}

/// The position of the factory currently being consulted.
///
/// Its `next_*` methods re-enter the chain strictly after that position, so
/// a factory can delegate the inner portion of a wrapper type without ever
/// being asked again itself.
pub struct ConverterCursor<'a> {
    client: &'a RestClient,
    index: usize,
}

impl<'a> ConverterCursor<'a> {
    pub(crate) fn new(client: &'a RestClient, index: usize) -> Self {
        ConverterCursor { client, index }
    }

    /// Resolve a request converter from the full chain. Meant for looking
    /// up a different type (a wrapper's inner type); delegating the same
    /// type through the full chain would loop, use the `next_` variant.
    pub fn request_converter(
        &self,
        ty: &TypeDescriptor,
    ) -> Result<Arc<dyn RequestConverter>, Error> {
        self.client.request_converter(ty)
    }

    /// Resolve a response converter from the full chain.
    pub fn response_converter(
        &self,
        ty: &TypeDescriptor,
    ) -> Result<Arc<dyn ResponseConverter>, Error> {
        self.client.response_converter(ty)
    }

    /// Resolve a request converter from the factories after this one.
    pub fn next_request_converter(
        &self,
        ty: &TypeDescriptor,
    ) -> Result<Arc<dyn RequestConverter>, Error> {
        self.client.next_request_converter(Some(self.index), ty)
    }

    /// Resolve a response converter from the factories after this one.
    pub fn next_response_converter(
        &self,
        ty: &TypeDescriptor,
    ) -> Result<Arc<dyn ResponseConverter>, Error> {
        self.client.next_response_converter(Some(self.index), ty)
    }
}
