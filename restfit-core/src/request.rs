//! Bound request types handed to the transport.

use bytes::Bytes;
use http::{HeaderMap, Method};
use url::Url;

/// A fully serialized request body with its content type.
#[derive(Clone, Debug)]
pub struct RequestBody {
    content_type: Option<String>,
    bytes: Bytes,
}

impl RequestBody {
    pub fn new(content_type: Option<String>, bytes: Bytes) -> Self {
        RequestBody {
            content_type,
            bytes,
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Replace the content type, keeping the bytes.
    pub fn with_content_type(self, content_type: impl Into<String>) -> Self {
        RequestBody {
            content_type: Some(content_type.into()),
            bytes: self.bytes,
        }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// The immutable product of binding an endpoint descriptor to call-site
/// arguments. Cloning is cheap and never re-runs any conversion.
#[derive(Clone, Debug)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<RequestBody>,
    disable_cache: bool,
}

impl Request {
    pub fn new(
        method: Method,
        url: Url,
        headers: HeaderMap,
        body: Option<RequestBody>,
        disable_cache: bool,
    ) -> Self {
        Request {
            method,
            url,
            headers,
            body,
            disable_cache,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    /// Whether the transport should bypass its response cache.
    pub fn cache_disabled(&self) -> bool {
        self.disable_cache
    }
}
