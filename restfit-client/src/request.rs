//! Request assembly: from a path template plus converted argument values
//! to an immutable bound [`Request`].
//!
//! Path substitution canonicalizes each replacement into a single path
//! segment and rejects values that would introduce `.` or `..` segments,
//! encoded or not. Query, field, and header values arrive already
//! converted to strings; pre-encoded values are appended verbatim.

use bytes::{BufMut, Bytes, BytesMut};
use http::{HeaderMap, HeaderName, HeaderValue, Method, header};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use rand::Rng;
use rand::distr::Alphanumeric;
use restfit_core::{BodyKind, Error, Request, RequestBody};
use url::Url;
use url::form_urlencoded;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Characters that can never appear raw in a path segment.
const PATH_SEGMENT: AsciiSet = CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'|')
    .add(b'\\')
    .add(b'?')
    .add(b'#');

/// The stricter set for values that are not pre-encoded: `/` must not
/// split the segment and `%` must not smuggle an escape in.
const PATH_SEGMENT_STRICT: AsciiSet = PATH_SEGMENT.add(b'/').add(b'%');

/// Accumulates one request during binding.
pub struct RequestBuilder {
    method: Method,
    base_url: Url,
    relative_url: Option<String>,
    headers: HeaderMap,
    content_type: Option<String>,
    body_kind: BodyKind,
    queries: Vec<(String, String, bool)>,
    fields: Vec<(String, String, bool)>,
    parts: Vec<Part>,
    body: Option<RequestBody>,
    disable_cache: bool,
}

struct Part {
    name: String,
    filename: Option<String>,
    body: RequestBody,
}

impl RequestBuilder {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        method: Method,
        base_url: Url,
        relative_url: Option<String>,
        headers: HeaderMap,
        content_type: Option<String>,
        body_kind: BodyKind,
        disable_cache: bool,
    ) -> Self {
        RequestBuilder {
            method,
            base_url,
            relative_url,
            headers,
            content_type,
            body_kind,
            queries: Vec::new(),
            fields: Vec::new(),
            parts: Vec::new(),
            body: None,
            disable_cache,
        }
    }

    /// Supply the per-call URL (full or relative) for dynamic endpoints.
    pub fn set_url(&mut self, url: impl Into<String>) {
        self.relative_url = Some(url.into());
    }

    /// Substitute `{name}` with a canonicalized single path segment.
    pub fn add_path_param(&mut self, name: &str, value: &str, encoded: bool) -> Result<(), Error> {
        let Some(relative) = self.relative_url.as_mut() else {
            return Err(Error::config(format!(
                "path parameter {name:?} used with a dynamic url; path parameters \
                 require a path template"
            )));
        };
        let canonical = canonicalize_path_segment(value, encoded);
        if contains_path_traversal(&canonical) {
            return Err(Error::config(format!(
                "path parameter {name:?} value must not introduce . or .. segments: {value:?}"
            )));
        }
        let placeholder = format!("{{{name}}}");
        if !relative.contains(&placeholder) {
            return Err(Error::config(format!(
                "path template has no placeholder {placeholder:?}"
            )));
        }
        *relative = relative.replace(&placeholder, &canonical);
        Ok(())
    }

    pub fn add_query(&mut self, name: &str, value: &str, encoded: bool) {
        self.queries
            .push((name.to_string(), value.to_string(), encoded));
    }

    pub fn add_header(&mut self, name: &str, value: &str) -> Result<(), Error> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::config(format!("invalid header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::config(format!("invalid value for header {name}: {e}")))?;
        self.headers.append(name, value);
        Ok(())
    }

    pub fn add_field(&mut self, name: &str, value: &str, encoded: bool) {
        self.fields
            .push((name.to_string(), value.to_string(), encoded));
    }

    pub fn add_part(&mut self, name: &str, filename: Option<&str>, body: RequestBody) {
        self.parts.push(Part {
            name: name.to_string(),
            filename: filename.map(str::to_owned),
            body,
        });
    }

    pub fn set_body(&mut self, body: RequestBody) {
        self.body = Some(body);
    }

    pub fn build(self) -> Result<Request, Error> {
        let RequestBuilder {
            method,
            base_url,
            relative_url,
            mut headers,
            content_type,
            body_kind,
            queries,
            fields,
            parts,
            body,
            disable_cache,
        } = self;

        let relative = relative_url
            .ok_or_else(|| Error::config("no url supplied for dynamic endpoint"))?;
        let mut url = base_url
            .join(&relative)
            .map_err(|e| Error::config(format!("malformed url {relative:?}: {e}")))?;

        if !queries.is_empty() {
            let mut query = url.query().map(str::to_string);
            for (name, value, encoded) in &queries {
                let pair = if *encoded {
                    format!("{name}={value}")
                } else {
                    form_urlencoded::Serializer::new(String::new())
                        .append_pair(name, value)
                        .finish()
                };
                match &mut query {
                    Some(q) => {
                        q.push('&');
                        q.push_str(&pair);
                    }
                    None => query = Some(pair),
                }
            }
            url.set_query(query.as_deref());
        }

        let mut body = match body_kind {
            BodyKind::None => None,
            // An empty body stands in when the method requires one but no
            // body argument was bound.
            BodyKind::Single => body.or_else(|| Some(RequestBody::new(None, Bytes::new()))),
            BodyKind::FormUrlEncoded => Some(encode_form(&fields)),
            BodyKind::Multipart => Some(encode_multipart(parts)),
        };

        if let Some(ct) = content_type {
            match body.take() {
                Some(b) => body = Some(b.with_content_type(ct)),
                None => {
                    let value = HeaderValue::from_str(&ct).map_err(|e| {
                        Error::config(format!("invalid content type {ct:?}: {e}"))
                    })?;
                    headers.insert(header::CONTENT_TYPE, value);
                }
            }
        }

        Ok(Request::new(method, url, headers, body, disable_cache))
    }
}

fn canonicalize_path_segment(value: &str, encoded: bool) -> String {
    let set = if encoded {
        &PATH_SEGMENT
    } else {
        &PATH_SEGMENT_STRICT
    };
    utf8_percent_encode(value, set).to_string()
}

/// True when any `/`-separated piece of the value is a dot segment,
/// counting `%2e`-encoded dots.
fn contains_path_traversal(value: &str) -> bool {
    value.split('/').any(|segment| {
        let normalized = segment.replace("%2e", ".").replace("%2E", ".");
        normalized == "." || normalized == ".."
    })
}

fn encode_form(fields: &[(String, String, bool)]) -> RequestBody {
    let mut encoded = String::new();
    for (name, value, pre_encoded) in fields {
        let pair = if *pre_encoded {
            format!("{name}={value}")
        } else {
            form_urlencoded::Serializer::new(String::new())
                .append_pair(name, value)
                .finish()
        };
        if !encoded.is_empty() {
            encoded.push('&');
        }
        encoded.push_str(&pair);
    }
    RequestBody::new(Some(FORM_CONTENT_TYPE.to_string()), Bytes::from(encoded))
}

fn encode_multipart(parts: Vec<Part>) -> RequestBody {
    let boundary: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(30)
        .map(char::from)
        .collect();

    let mut framed = BytesMut::new();
    for part in parts {
        framed.put_slice(b"--");
        framed.put_slice(boundary.as_bytes());
        framed.put_slice(b"\r\n");
        framed.put_slice(b"Content-Disposition: form-data; name=\"");
        framed.put_slice(part.name.as_bytes());
        framed.put_slice(b"\"");
        if let Some(filename) = &part.filename {
            framed.put_slice(b"; filename=\"");
            framed.put_slice(filename.as_bytes());
            framed.put_slice(b"\"");
        }
        framed.put_slice(b"\r\n");
        if let Some(ct) = part.body.content_type() {
            framed.put_slice(b"Content-Type: ");
            framed.put_slice(ct.as_bytes());
            framed.put_slice(b"\r\n");
        }
        framed.put_slice(b"\r\n");
        framed.put_slice(part.body.bytes());
        framed.put_slice(b"\r\n");
    }
    framed.put_slice(b"--");
    framed.put_slice(boundary.as_bytes());
    framed.put_slice(b"--\r\n");

    RequestBody::new(
        Some(format!("multipart/form-data; boundary={boundary}")),
        framed.freeze(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder(method: Method, relative: &str) -> RequestBuilder {
        RequestBuilder::new(
            method,
            Url::parse("https://api.example.com/v1/").unwrap(),
            Some(relative.to_string()),
            HeaderMap::new(),
            None,
            BodyKind::None,
            false,
        )
    }

    #[test]
    fn test_path_and_query_binding() {
        let mut b = builder(Method::GET, "items/{id}");
        b.add_path_param("id", "42", false).unwrap();
        b.add_query("page", "2", false);
        let request = b.build().unwrap();
        assert_eq!(
            request.url().as_str(),
            "https://api.example.com/v1/items/42?page=2"
        );
    }

    #[test]
    fn test_path_value_is_single_segment() {
        let mut b = builder(Method::GET, "files/{name}");
        b.add_path_param("name", "a/b c", false).unwrap();
        let request = b.build().unwrap();
        assert_eq!(
            request.url().as_str(),
            "https://api.example.com/v1/files/a%2Fb%20c"
        );
    }

    #[test]
    fn test_encoded_path_value_keeps_escapes() {
        let mut b = builder(Method::GET, "files/{name}");
        b.add_path_param("name", "a%2Fb", true).unwrap();
        let request = b.build().unwrap();
        assert_eq!(
            request.url().as_str(),
            "https://api.example.com/v1/files/a%2Fb"
        );
    }

    #[test]
    fn test_path_traversal_rejected() {
        for value in ["..", ".", "%2E%2e", "a/../b"] {
            let mut b = builder(Method::GET, "files/{name}");
            let result = b.add_path_param("name", value, true);
            assert!(result.is_err(), "{value:?} should be rejected");
        }
    }

    #[test]
    fn test_absolute_path_overrides_base_path() {
        let b = builder(Method::GET, "/healthz");
        let request = b.build().unwrap();
        assert_eq!(request.url().as_str(), "https://api.example.com/healthz");
    }

    #[test]
    fn test_full_url_overrides_base() {
        let mut b = builder(Method::GET, "");
        b.set_url("https://cdn.example.org/blob/7");
        let request = b.build().unwrap();
        assert_eq!(request.url().as_str(), "https://cdn.example.org/blob/7");
    }

    #[test]
    fn test_preencoded_query_appended_verbatim() {
        let mut b = builder(Method::GET, "search");
        b.add_query("q", "a%20b", true);
        b.add_query("lang", "en us", false);
        let request = b.build().unwrap();
        assert_eq!(request.url().query(), Some("q=a%20b&lang=en+us"));
    }

    #[test]
    fn test_query_appends_to_template_query() {
        let mut b = builder(Method::GET, "search?sort=asc");
        b.add_query("page", "3", false);
        let request = b.build().unwrap();
        assert_eq!(request.url().query(), Some("sort=asc&page=3"));
    }

    #[test]
    fn test_form_body() {
        let mut b = RequestBuilder::new(
            Method::POST,
            Url::parse("https://api.example.com/").unwrap(),
            Some("login".to_string()),
            HeaderMap::new(),
            None,
            BodyKind::FormUrlEncoded,
            false,
        );
        b.add_field("user", "ada lovelace", false);
        b.add_field("token", "a%3Db", true);
        let request = b.build().unwrap();
        let body = request.body().unwrap();
        assert_eq!(body.content_type(), Some(FORM_CONTENT_TYPE));
        assert_eq!(body.bytes().as_ref(), b"user=ada+lovelace&token=a%3Db");
    }

    #[test]
    fn test_multipart_body_framing() {
        let mut b = RequestBuilder::new(
            Method::POST,
            Url::parse("https://api.example.com/").unwrap(),
            Some("upload".to_string()),
            HeaderMap::new(),
            None,
            BodyKind::Multipart,
            false,
        );
        b.add_part(
            "file",
            Some("notes.txt"),
            RequestBody::new(Some("text/plain".to_string()), Bytes::from_static(b"hi")),
        );
        let request = b.build().unwrap();
        let body = request.body().unwrap();
        let content_type = body.content_type().unwrap();
        let boundary = content_type
            .strip_prefix("multipart/form-data; boundary=")
            .unwrap();
        let text = String::from_utf8(body.bytes().to_vec()).unwrap();
        assert!(text.starts_with(&format!("--{boundary}\r\n")));
        assert!(text.contains("Content-Disposition: form-data; name=\"file\"; filename=\"notes.txt\"\r\n"));
        assert!(text.contains("Content-Type: text/plain\r\n\r\nhi\r\n"));
        assert!(text.ends_with(&format!("--{boundary}--\r\n")));
    }

    #[test]
    fn test_content_type_override_without_body_becomes_header() {
        let mut b = builder(Method::GET, "feed");
        b = RequestBuilder {
            content_type: Some("application/atom+xml".to_string()),
            ..b
        };
        let request = b.build().unwrap();
        assert_eq!(
            request.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/atom+xml"
        );
    }

    #[test]
    fn test_header_merge_preserves_multiple_values() {
        let mut b = builder(Method::GET, "ping");
        b.add_header("x-tag", "one").unwrap();
        b.add_header("x-tag", "two").unwrap();
        let request = b.build().unwrap();
        let values: Vec<_> = request.headers().get_all("x-tag").iter().collect();
        assert_eq!(values, vec!["one", "two"]);
    }
}
