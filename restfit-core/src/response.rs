//! Raw transport responses and the classified response envelope.

use std::any::Any;
use std::fmt;
use std::io::{self, Read};

use bytes::Bytes;
use http::{HeaderMap, StatusCode};

use crate::error::Error;
use crate::value::BoxedValue;

/// A one-shot readable response body as produced by the transport.
///
/// The reader can be consumed exactly once; converters either stream from
/// it or buffer it with [`ResponseBody::read_all`].
pub struct ResponseBody {
    content_type: Option<String>,
    content_length: Option<u64>,
    reader: Box<dyn Read + Send>,
}

impl ResponseBody {
    pub fn new(
        content_type: Option<String>,
        content_length: Option<u64>,
        reader: Box<dyn Read + Send>,
    ) -> Self {
        ResponseBody {
            content_type,
            content_length,
            reader,
        }
    }

    /// A body backed by an in-memory buffer.
    pub fn from_bytes(content_type: Option<String>, bytes: Bytes) -> Self {
        let len = bytes.len() as u64;
        ResponseBody {
            content_type,
            content_length: Some(len),
            reader: Box::new(io::Cursor::new(bytes)),
        }
    }

    /// An empty body, used after stripping 204/205 responses.
    pub fn empty() -> Self {
        Self::from_bytes(None, Bytes::new())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Declared length, if the transport knew it up front.
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Drain the reader into memory. Pre-sizes from the declared length,
    /// capped so a lying header cannot force a huge allocation.
    pub fn read_all(mut self) -> io::Result<Bytes> {
        const PREALLOC_CAP: u64 = 1 << 20;
        let hint = self.content_length.unwrap_or(0).min(PREALLOC_CAP) as usize;
        let mut buf = Vec::with_capacity(hint);
        self.reader.read_to_end(&mut buf)?;
        Ok(Bytes::from(buf))
    }

    /// Swap in a different reader, keeping the metadata. Used to decorate
    /// the stream without reframing the body.
    pub fn map_reader(
        self,
        f: impl FnOnce(Box<dyn Read + Send>) -> Box<dyn Read + Send>,
    ) -> Self {
        ResponseBody {
            content_type: self.content_type,
            content_length: self.content_length,
            reader: f(self.reader),
        }
    }
}

impl Read for ResponseBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseBody")
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish()
    }
}

/// What the transport hands back: status line, headers, and the unread body.
#[derive(Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub message: String,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

/// The classified result of one HTTP exchange.
///
/// Exactly one of `body` (success) and `error_body` (HTTP error) is
/// populated; a success may still carry no body (204/205, or an empty
/// optional). The constructors enforce the status-class invariants.
pub struct Response<T = BoxedValue> {
    status: StatusCode,
    message: String,
    headers: HeaderMap,
    body: Option<T>,
    error_body: Option<Bytes>,
}

impl<T> Response<T> {
    /// A successful envelope. The status must be 2xx.
    pub fn success(
        status: StatusCode,
        message: String,
        headers: HeaderMap,
        body: Option<T>,
    ) -> Result<Self, Error> {
        if !status.is_success() {
            return Err(Error::config(format!(
                "success envelope requires a 2xx status, got {status}"
            )));
        }
        Ok(Response {
            status,
            message,
            headers,
            body,
            error_body: None,
        })
    }

    /// An HTTP-error envelope. The status must not be 2xx; the error body
    /// has already been buffered.
    pub fn error(
        status: StatusCode,
        message: String,
        headers: HeaderMap,
        error_body: Bytes,
    ) -> Result<Self, Error> {
        if status.is_success() {
            return Err(Error::config(format!(
                "error envelope requires a non-2xx status, got {status}"
            )));
        }
        Ok(Response {
            status,
            message,
            headers,
            body: None,
            error_body: Some(error_body),
        })
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The reason phrase reported by the transport.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn body(&self) -> Option<&T> {
        self.body.as_ref()
    }

    pub fn into_body(self) -> Option<T> {
        self.body
    }

    /// The buffered error body, for non-2xx envelopes.
    pub fn error_body(&self) -> Option<&Bytes> {
        self.error_body.as_ref()
    }

    /// Split into envelope parts, consuming the response.
    pub fn into_parts(self) -> (StatusCode, String, HeaderMap, Option<T>, Option<Bytes>) {
        (
            self.status,
            self.message,
            self.headers,
            self.body,
            self.error_body,
        )
    }
}

impl Response<BoxedValue> {
    /// Recover the decoded body at its concrete type.
    ///
    /// Fails with a decode error when the stored value is of a different
    /// type than requested.
    pub fn downcast<T: Any>(self) -> Result<Response<T>, Error> {
        let body = match self.body {
            Some(value) => match value.downcast::<T>() {
                Ok(body) => Some(*body),
                Err(_) => {
                    return Err(Error::decode(format!(
                        "response body is not a {}",
                        std::any::type_name::<T>()
                    )));
                }
            },
            None => None,
        };
        Ok(Response {
            status: self.status,
            message: self.message,
            headers: self.headers,
            body,
            error_body: self.error_body,
        })
    }
}

impl<T> fmt::Debug for Response<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("message", &self.message)
            .field("has_body", &self.body.is_some())
            .field("error_body_len", &self.error_body.as_ref().map(Bytes::len))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_requires_2xx() {
        let err = Response::success(
            StatusCode::NOT_FOUND,
            "Not Found".into(),
            HeaderMap::new(),
            Some("body".to_string()),
        )
        .unwrap_err();
        assert!(err.is_configuration());

        let ok = Response::success(
            StatusCode::OK,
            "OK".into(),
            HeaderMap::new(),
            Some("body".to_string()),
        )
        .unwrap();
        assert!(ok.is_success());
        assert_eq!(ok.body(), Some(&"body".to_string()));
    }

    #[test]
    fn test_error_requires_non_2xx() {
        let err = Response::<String>::error(
            StatusCode::OK,
            "OK".into(),
            HeaderMap::new(),
            Bytes::new(),
        )
        .unwrap_err();
        assert!(err.is_configuration());

        let resp = Response::<String>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error".into(),
            HeaderMap::new(),
            Bytes::from_static(b"boom"),
        )
        .unwrap();
        assert!(!resp.is_success());
        assert!(resp.body().is_none());
        assert_eq!(resp.error_body().unwrap().as_ref(), b"boom");
    }

    #[test]
    fn test_downcast_mismatch_is_decode_error() {
        let resp = Response::success(
            StatusCode::OK,
            "OK".into(),
            HeaderMap::new(),
            Some(Box::new(7u32) as BoxedValue),
        )
        .unwrap();
        let err = resp.downcast::<String>().unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_read_all_with_lying_length_hint() {
        let body = ResponseBody::new(
            None,
            Some(u64::MAX),
            Box::new(io::Cursor::new(b"tiny".to_vec())),
        );
        assert_eq!(body.read_all().unwrap().as_ref(), b"tiny");
    }
}
