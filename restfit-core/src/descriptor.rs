//! Endpoint descriptors: the declarative description of one HTTP endpoint.
//!
//! A descriptor is what an annotated interface method compiles down to in
//! systems that read annotations at runtime; here it is built explicitly
//! through the fluent methods on [`EndpointDescriptor`] and registered with
//! the client builder under an [`EndpointId`].

use std::any::{Any, TypeId, type_name};
use std::fmt;

use http::{HeaderMap, HeaderName, HeaderValue, Method};

use crate::error::Error;
use crate::value::TypeDescriptor;

/// Stable identifier for a registered endpoint; the method cache key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct EndpointId(pub &'static str);

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// How the request body is assembled from the declared parameters.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum BodyKind {
    /// No request body.
    #[default]
    None,
    /// A single body parameter, serialized by a request converter.
    Single,
    /// Name/value field parameters, form-url-encoded.
    FormUrlEncoded,
    /// Part parameters framed into a multipart body.
    Multipart,
}

/// Where one declared parameter lands in the bound request.
#[derive(Clone, Debug)]
pub enum ParameterRole {
    /// Substituted into a `{name}` path placeholder.
    Path { name: String, encoded: bool },
    /// Appended to the query string; absent values are omitted.
    Query { name: String, encoded: bool },
    /// Appended to the headers; absent values are omitted.
    Header { name: String },
    /// A form field; only valid with [`BodyKind::FormUrlEncoded`].
    Field { name: String, encoded: bool },
    /// A multipart part; only valid with [`BodyKind::Multipart`].
    Part {
        name: String,
        filename: Option<String>,
    },
    /// The single request body; only valid with [`BodyKind::Single`].
    Body,
    /// A caller-supplied full or relative URL replacing the path template.
    Url,
}

impl ParameterRole {
    /// Short role name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            ParameterRole::Path { .. } => "path",
            ParameterRole::Query { .. } => "query",
            ParameterRole::Header { .. } => "header",
            ParameterRole::Field { .. } => "field",
            ParameterRole::Part { .. } => "part",
            ParameterRole::Body => "body",
            ParameterRole::Url => "url",
        }
    }
}

/// One declared parameter: its role plus the type of the call-site value.
#[derive(Clone, Debug)]
pub struct Parameter {
    pub role: ParameterRole,
    pub ty: TypeDescriptor,
}

/// Marker for the canonical call-object return shape.
pub struct CallShape;

/// Marker for the future return shape (single-resolution promise).
pub struct FutureShape;

/// The declared return type: an invocation shape marker (which call adapter
/// applies) paired with the response body type (which converter applies).
#[derive(Clone, Debug)]
pub struct ReturnType {
    shape: TypeId,
    shape_name: &'static str,
    body: TypeDescriptor,
}

impl ReturnType {
    /// A call-object return carrying the given body type.
    pub fn call_of<T: Any + Send>() -> Self {
        Self::shaped::<CallShape>(TypeDescriptor::of::<T>())
    }

    /// A future return carrying the given body type.
    pub fn future_of<T: Any + Send>() -> Self {
        Self::shaped::<FutureShape>(TypeDescriptor::of::<T>())
    }

    /// A return with a user-defined shape marker and an explicit body
    /// descriptor (use [`TypeDescriptor::optional`] for optional bodies).
    pub fn shaped<S: 'static>(body: TypeDescriptor) -> Self {
        ReturnType {
            shape: TypeId::of::<S>(),
            shape_name: type_name::<S>(),
            body,
        }
    }

    pub fn shape(&self) -> TypeId {
        self.shape
    }

    pub fn shape_name(&self) -> &'static str {
        self.shape_name
    }

    pub fn body(&self) -> &TypeDescriptor {
        &self.body
    }

    pub fn with_body(&self, body: TypeDescriptor) -> Self {
        ReturnType {
            shape: self.shape,
            shape_name: self.shape_name,
            body,
        }
    }
}

/// The already-parsed description of one endpoint.
///
/// Built fluently, validated when the owning client compiles it:
///
/// ```
/// use restfit_core::{EndpointDescriptor, ReturnType};
///
/// let descriptor = EndpointDescriptor::get("users/{id}")
///     .path_param::<u64>("id")
///     .query_param::<u32>("page")
///     .returns(ReturnType::call_of::<bytes::Bytes>());
/// assert_eq!(descriptor.parameters().len(), 2);
/// ```
#[derive(Clone, Debug)]
pub struct EndpointDescriptor {
    method: Method,
    relative_path: Option<String>,
    static_headers: HeaderMap,
    content_type: Option<String>,
    body_kind: BodyKind,
    disable_cache: bool,
    skip_callback_executor: bool,
    parameters: Vec<Parameter>,
    returns: ReturnType,
}

impl EndpointDescriptor {
    /// Start a descriptor with an explicit method and path template.
    pub fn new(method: Method, relative_path: impl Into<String>) -> Self {
        EndpointDescriptor {
            method,
            relative_path: Some(relative_path.into()),
            static_headers: HeaderMap::new(),
            content_type: None,
            body_kind: BodyKind::None,
            disable_cache: false,
            skip_callback_executor: false,
            parameters: Vec::new(),
            returns: ReturnType::call_of::<()>(),
        }
    }

    /// Start a descriptor whose URL is supplied per call via a `Url`
    /// parameter instead of a path template.
    pub fn dynamic(method: Method) -> Self {
        let mut d = Self::new(method, "");
        d.relative_path = None;
        d
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn head(path: impl Into<String>) -> Self {
        Self::new(Method::HEAD, path)
    }

    pub fn options(path: impl Into<String>) -> Self {
        Self::new(Method::OPTIONS, path)
    }

    /// Declare a path parameter substituted into `{name}`.
    pub fn path_param<T: Any + Send>(self, name: impl Into<String>) -> Self {
        self.param(
            ParameterRole::Path {
                name: name.into(),
                encoded: false,
            },
            TypeDescriptor::of::<T>(),
        )
    }

    /// Declare a pre-encoded path parameter (percent escapes pass through).
    pub fn path_param_encoded<T: Any + Send>(self, name: impl Into<String>) -> Self {
        self.param(
            ParameterRole::Path {
                name: name.into(),
                encoded: true,
            },
            TypeDescriptor::of::<T>(),
        )
    }

    /// Declare a query parameter; pass [`crate::Argument::absent`] to omit it.
    pub fn query_param<T: Any + Send>(self, name: impl Into<String>) -> Self {
        self.param(
            ParameterRole::Query {
                name: name.into(),
                encoded: false,
            },
            TypeDescriptor::of::<T>(),
        )
    }

    /// Declare a pre-encoded query parameter, appended verbatim.
    pub fn query_param_encoded<T: Any + Send>(self, name: impl Into<String>) -> Self {
        self.param(
            ParameterRole::Query {
                name: name.into(),
                encoded: true,
            },
            TypeDescriptor::of::<T>(),
        )
    }

    /// Declare a per-call header parameter.
    pub fn header_param<T: Any + Send>(self, name: impl Into<String>) -> Self {
        self.param(
            ParameterRole::Header { name: name.into() },
            TypeDescriptor::of::<T>(),
        )
    }

    /// Declare a form field parameter.
    pub fn field_param<T: Any + Send>(self, name: impl Into<String>) -> Self {
        self.param(
            ParameterRole::Field {
                name: name.into(),
                encoded: false,
            },
            TypeDescriptor::of::<T>(),
        )
    }

    /// Declare a pre-encoded form field parameter.
    pub fn field_param_encoded<T: Any + Send>(self, name: impl Into<String>) -> Self {
        self.param(
            ParameterRole::Field {
                name: name.into(),
                encoded: true,
            },
            TypeDescriptor::of::<T>(),
        )
    }

    /// Declare a multipart part parameter.
    pub fn part_param<T: Any + Send>(
        self,
        name: impl Into<String>,
        filename: Option<&str>,
    ) -> Self {
        self.param(
            ParameterRole::Part {
                name: name.into(),
                filename: filename.map(str::to_owned),
            },
            TypeDescriptor::of::<T>(),
        )
    }

    /// Declare the single request body parameter.
    pub fn body_param<T: Any + Send>(mut self) -> Self {
        self.body_kind = BodyKind::Single;
        self.param(ParameterRole::Body, TypeDescriptor::of::<T>())
    }

    /// Declare a per-call URL parameter (full or relative `String`).
    pub fn url_param(self) -> Self {
        self.param(ParameterRole::Url, TypeDescriptor::of::<String>())
    }

    fn param(mut self, role: ParameterRole, ty: TypeDescriptor) -> Self {
        self.parameters.push(Parameter { role, ty });
        self
    }

    /// Switch the body to form-url-encoded field assembly.
    pub fn form_url_encoded(mut self) -> Self {
        self.body_kind = BodyKind::FormUrlEncoded;
        self
    }

    /// Switch the body to multipart part assembly.
    pub fn multipart(mut self) -> Self {
        self.body_kind = BodyKind::Multipart;
        self
    }

    /// Attach a static header sent with every request.
    ///
    /// Returns a configuration error for names or values `http` rejects.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self, Error> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::config(format!("invalid header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::config(format!("invalid header value for {name}: {e}")))?;
        self.static_headers.append(name, value);
        Ok(self)
    }

    /// Override the request body content type.
    pub fn content_type(mut self, value: impl Into<String>) -> Self {
        self.content_type = Some(value.into());
        self
    }

    /// Ask the transport to bypass its response cache for this endpoint.
    pub fn disable_cache(mut self) -> Self {
        self.disable_cache = true;
        self
    }

    /// Deliver callbacks inline instead of through the configured callback
    /// executor.
    pub fn skip_callback_executor(mut self) -> Self {
        self.skip_callback_executor = true;
        self
    }

    /// Set the declared return type.
    pub fn returns(mut self, returns: ReturnType) -> Self {
        self.returns = returns;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn relative_path(&self) -> Option<&str> {
        self.relative_path.as_deref()
    }

    pub fn static_headers(&self) -> &HeaderMap {
        &self.static_headers
    }

    pub fn content_type_override(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn body_kind(&self) -> BodyKind {
        self.body_kind
    }

    pub fn cache_disabled(&self) -> bool {
        self.disable_cache
    }

    pub fn skips_callback_executor(&self) -> bool {
        self.skip_callback_executor
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn return_type(&self) -> &ReturnType {
        &self.returns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fluent_descriptor() {
        let d = EndpointDescriptor::post("users/{id}/notes")
            .path_param::<u64>("id")
            .query_param::<String>("tag")
            .body_param::<String>()
            .header("x-trace", "1")
            .unwrap()
            .disable_cache()
            .returns(ReturnType::call_of::<String>());

        assert_eq!(d.method(), &Method::POST);
        assert_eq!(d.relative_path(), Some("users/{id}/notes"));
        assert_eq!(d.body_kind(), BodyKind::Single);
        assert!(d.cache_disabled());
        assert_eq!(d.parameters().len(), 3);
        assert_eq!(d.static_headers().get("x-trace").unwrap(), "1");
        assert_eq!(d.return_type().shape(), TypeId::of::<CallShape>());
    }

    #[test]
    fn test_dynamic_descriptor_has_no_path() {
        let d = EndpointDescriptor::dynamic(Method::GET).url_param();
        assert!(d.relative_path().is_none());
        assert!(matches!(d.parameters()[0].role, ParameterRole::Url));
    }

    #[test]
    fn test_bad_static_header_is_config_error() {
        let err = EndpointDescriptor::get("ping")
            .header("bad\nname", "v")
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_return_shapes_differ() {
        let call = ReturnType::call_of::<String>();
        let fut = ReturnType::future_of::<String>();
        assert_ne!(call.shape(), fut.shape());
        assert_eq!(call.body(), fut.body());
    }
}
