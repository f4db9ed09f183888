//! Shipped converter factories.
//!
//! [`BuiltInConverterFactory`] covers the raw types every client
//! understands without help (pass-through bodies, buffered bytes, body
//! discard). [`OptionalConverterFactory`] unwraps optional body types by
//! delegating the inner type back to the chain. [`JsonConverterFactory`]
//! serves serde codecs for explicitly registered types.
//! [`ToStringConverter`] is the fallback rendering for string positions.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use bytes::Bytes;
use restfit_core::{Argument, BoxedValue, Error, RequestBody, ResponseBody, TypeDescriptor};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::converter::{
    ConverterCursor, ConverterFactory, RequestConverter, ResponseConverter, StringConverter,
};

const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";
const OCTET_STREAM: &str = "application/octet-stream";

/// Converters for the types the pipeline understands natively. Installed
/// first in the chain so user factories cannot accidentally shadow them.
#[derive(Default)]
pub struct BuiltInConverterFactory;

impl ConverterFactory for BuiltInConverterFactory {
    fn name(&self) -> &'static str {
        "BuiltInConverterFactory"
    }

    fn request_converter(
        &self,
        ty: &TypeDescriptor,
        _cursor: &ConverterCursor<'_>,
    ) -> Result<Option<Arc<dyn RequestConverter>>, Error> {
        if ty.is::<RequestBody>() {
            return Ok(Some(Arc::new(PassThroughRequestConverter)));
        }
        if ty.is::<Bytes>() {
            return Ok(Some(Arc::new(BytesRequestConverter)));
        }
        Ok(None)
    }

    fn response_converter(
        &self,
        ty: &TypeDescriptor,
        _cursor: &ConverterCursor<'_>,
    ) -> Result<Option<Arc<dyn ResponseConverter>>, Error> {
        if ty.is::<ResponseBody>() {
            return Ok(Some(Arc::new(StreamingResponseConverter)));
        }
        if ty.is::<Bytes>() {
            return Ok(Some(Arc::new(BufferingResponseConverter)));
        }
        if ty.is::<String>() {
            return Ok(Some(Arc::new(TextResponseConverter)));
        }
        if ty.is::<()>() {
            return Ok(Some(Arc::new(DiscardingResponseConverter)));
        }
        Ok(None)
    }
}

struct PassThroughRequestConverter;

impl RequestConverter for PassThroughRequestConverter {
    fn convert(&self, value: &Argument) -> Result<RequestBody, Error> {
        value
            .downcast_ref::<RequestBody>()
            .cloned()
            .ok_or_else(|| Error::encode("body argument is not a RequestBody"))
    }
}

struct BytesRequestConverter;

impl RequestConverter for BytesRequestConverter {
    fn convert(&self, value: &Argument) -> Result<RequestBody, Error> {
        let bytes = value
            .downcast_ref::<Bytes>()
            .cloned()
            .ok_or_else(|| Error::encode("body argument is not Bytes"))?;
        Ok(RequestBody::new(Some(OCTET_STREAM.to_string()), bytes))
    }
}

/// Hands the unread body straight to the caller for streaming consumption.
struct StreamingResponseConverter;

impl ResponseConverter for StreamingResponseConverter {
    fn convert(&self, body: ResponseBody) -> Result<Option<BoxedValue>, Error> {
        Ok(Some(Box::new(body)))
    }
}

struct BufferingResponseConverter;

impl ResponseConverter for BufferingResponseConverter {
    fn convert(&self, body: ResponseBody) -> Result<Option<BoxedValue>, Error> {
        Ok(Some(Box::new(body.read_all()?)))
    }
}

struct TextResponseConverter;

impl ResponseConverter for TextResponseConverter {
    fn convert(&self, body: ResponseBody) -> Result<Option<BoxedValue>, Error> {
        let bytes = body.read_all()?;
        let text = String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::decode(format!("response body is not valid utf-8: {e}")))?;
        Ok(Some(Box::new(text)))
    }
}

/// Drains and discards the body so the connection can be reused.
struct DiscardingResponseConverter;

impl ResponseConverter for DiscardingResponseConverter {
    fn convert(&self, mut body: ResponseBody) -> Result<Option<BoxedValue>, Error> {
        let mut sink = [0u8; 4096];
        loop {
            if body.read(&mut sink)? == 0 {
                break;
            }
        }
        Ok(Some(Box::new(())))
    }
}

/// The infallible string fallback: renders through the display function
/// captured at the call site. Resolution never fails; conversion fails
/// only for values built without one.
pub struct ToStringConverter;

impl StringConverter for ToStringConverter {
    fn convert(&self, value: &Argument) -> Result<String, Error> {
        value.render().ok_or_else(|| {
            Error::config(format!(
                "no string rendering for {}; build the argument with Argument::scalar \
                 or install a string converter factory for it",
                value.ty().name()
            ))
        })
    }
}

/// Unwraps optional body types by delegating the inner type to the rest of
/// the chain. Installed last so any user factory that handles the optional
/// type directly wins.
#[derive(Default)]
pub struct OptionalConverterFactory;

impl ConverterFactory for OptionalConverterFactory {
    fn name(&self) -> &'static str {
        "OptionalConverterFactory"
    }

    fn response_converter(
        &self,
        ty: &TypeDescriptor,
        cursor: &ConverterCursor<'_>,
    ) -> Result<Option<Arc<dyn ResponseConverter>>, Error> {
        let Some(inner) = ty.inner() else {
            return Ok(None);
        };
        // The inner type is a different lookup, so it goes through the
        // full chain; a user factory for it may sit anywhere.
        let delegate = cursor.response_converter(inner)?;
        Ok(Some(Arc::new(OptionalResponseConverter {
            ty: ty.clone(),
            delegate,
        })))
    }
}

struct OptionalResponseConverter {
    ty: TypeDescriptor,
    delegate: Arc<dyn ResponseConverter>,
}

impl ResponseConverter for OptionalResponseConverter {
    fn convert(&self, body: ResponseBody) -> Result<Option<BoxedValue>, Error> {
        let wrapped = match self.delegate.convert(body)? {
            Some(inner) => self.ty.wrap_some(inner),
            None => self.ty.wrap_none(),
        };
        match wrapped {
            Some(value) => Ok(Some(value)),
            None => Err(Error::config(format!(
                "{} has an inner type but no wrap functions; build its descriptor \
                 with TypeDescriptor::optional",
                self.ty.name()
            ))),
        }
    }
}

type EncodeFn = fn(&Argument) -> Result<Vec<u8>, Error>;
type DecodeFn = fn(&[u8]) -> Result<BoxedValue, Error>;

#[derive(Clone, Copy)]
struct JsonCodec {
    encode: EncodeFn,
    decode: DecodeFn,
}

/// JSON converters for an explicitly registered set of serde types.
///
/// There is no runtime type discovery: each body type an endpoint
/// serializes or deserializes as JSON is registered up front with
/// [`JsonConverterFactory::with`], which monomorphizes and stores the
/// codec for it.
#[derive(Default)]
pub struct JsonConverterFactory {
    codecs: HashMap<TypeId, JsonCodec>,
}

impl JsonConverterFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a codec for `T`.
    pub fn with<T>(mut self) -> Self
    where
        T: Serialize + DeserializeOwned + Any + Send + Sync,
    {
        fn encode<T: Serialize + Any>(value: &Argument) -> Result<Vec<u8>, Error> {
            let value = value.downcast_ref::<T>().ok_or_else(|| {
                Error::encode(format!(
                    "body argument is not a {}",
                    std::any::type_name::<T>()
                ))
            })?;
            serde_json::to_vec(value).map_err(|e| Error::encode(e.to_string()))
        }
        fn decode<T: DeserializeOwned + Any + Send>(bytes: &[u8]) -> Result<BoxedValue, Error> {
            let value: T =
                serde_json::from_slice(bytes).map_err(|e| Error::decode(e.to_string()))?;
            Ok(Box::new(value))
        }
        self.codecs.insert(
            TypeId::of::<T>(),
            JsonCodec {
                encode: encode::<T>,
                decode: decode::<T>,
            },
        );
        self
    }
}

impl ConverterFactory for JsonConverterFactory {
    fn name(&self) -> &'static str {
        "JsonConverterFactory"
    }

    fn request_converter(
        &self,
        ty: &TypeDescriptor,
        _cursor: &ConverterCursor<'_>,
    ) -> Result<Option<Arc<dyn RequestConverter>>, Error> {
        Ok(self
            .codecs
            .get(&ty.id())
            .map(|codec| Arc::new(JsonRequestConverter { codec: *codec }) as _))
    }

    fn response_converter(
        &self,
        ty: &TypeDescriptor,
        _cursor: &ConverterCursor<'_>,
    ) -> Result<Option<Arc<dyn ResponseConverter>>, Error> {
        Ok(self
            .codecs
            .get(&ty.id())
            .map(|codec| Arc::new(JsonResponseConverter { codec: *codec }) as _))
    }
}

struct JsonRequestConverter {
    codec: JsonCodec,
}

impl RequestConverter for JsonRequestConverter {
    fn convert(&self, value: &Argument) -> Result<RequestBody, Error> {
        let encoded = (self.codec.encode)(value)?;
        Ok(RequestBody::new(
            Some(JSON_CONTENT_TYPE.to_string()),
            Bytes::from(encoded),
        ))
    }
}

struct JsonResponseConverter {
    codec: JsonCodec,
}

impl ResponseConverter for JsonResponseConverter {
    fn convert(&self, body: ResponseBody) -> Result<Option<BoxedValue>, Error> {
        let bytes = body.read_all()?;
        Ok(Some((self.codec.decode)(&bytes)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_to_string_converter_requires_render() {
        let ok = ToStringConverter.convert(&Argument::scalar(7u16)).unwrap();
        assert_eq!(ok, "7");

        struct Opaque;
        let err = ToStringConverter
            .convert(&Argument::new(Opaque))
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_discarding_converter_yields_unit() {
        let body = ResponseBody::from_bytes(None, Bytes::from_static(b"ignored"));
        let value = DiscardingResponseConverter.convert(body).unwrap().unwrap();
        assert!(value.downcast::<()>().is_ok());
    }

    #[test]
    fn test_json_codec_round() {
        #[derive(Serialize, Deserialize, PartialEq, Debug)]
        struct User {
            id: u64,
            name: String,
        }

        let factory = JsonConverterFactory::new().with::<User>();
        let codec = factory.codecs[&TypeId::of::<User>()];

        let arg = Argument::new(User {
            id: 3,
            name: "ada".into(),
        });
        let encoded = (codec.encode)(&arg).unwrap();
        let decoded = (codec.decode)(&encoded).unwrap();
        let user = decoded.downcast::<User>().unwrap();
        assert_eq!(
            *user,
            User {
                id: 3,
                name: "ada".into()
            }
        );
    }

    #[test]
    fn test_json_decode_failure_is_decode_error() {
        #[derive(Serialize, Deserialize)]
        struct Point {
            x: i32,
        }
        let factory = JsonConverterFactory::new().with::<Point>();
        let codec = factory.codecs[&TypeId::of::<Point>()];
        let err = (codec.decode)(b"not json").unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }
}
