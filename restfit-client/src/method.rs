//! Endpoint compilation: descriptor validation, converter and adapter
//! resolution, and the reusable binding plan.
//!
//! A [`CompiledMethod`] is produced once per endpoint and cached by the
//! client. Everything that can be wrong with a descriptor is reported
//! here, before any call is created: malformed or unbound placeholders,
//! body kinds that do not fit the HTTP method, parameter roles that do not
//! fit the body kind, and unresolvable converters or adapters.

use std::collections::HashSet;
use std::sync::Arc;

use http::Method;
use restfit_core::{
    Argument, BodyKind, EndpointDescriptor, Error, Parameter, ParameterRole, Request,
};
use url::Url;

use crate::adapter::CallAdapter;
use crate::client::RestClient;
use crate::converter::{RequestConverter, ResponseConverter, StringConverter};
use crate::request::RequestBuilder;

/// A fully validated, converter-resolved binding plan for one endpoint.
pub struct RequestTemplate {
    method: Method,
    base_url: Url,
    relative_path: Option<String>,
    static_headers: http::HeaderMap,
    content_type: Option<String>,
    body_kind: BodyKind,
    disable_cache: bool,
    handlers: Vec<ParamHandler>,
}

enum ParamHandler {
    Path {
        name: String,
        encoded: bool,
        conv: Arc<dyn StringConverter>,
    },
    Query {
        name: String,
        encoded: bool,
        conv: Arc<dyn StringConverter>,
    },
    Header {
        name: String,
        conv: Arc<dyn StringConverter>,
    },
    Field {
        name: String,
        encoded: bool,
        conv: Arc<dyn StringConverter>,
    },
    Part {
        name: String,
        filename: Option<String>,
        conv: Arc<dyn RequestConverter>,
    },
    Body {
        conv: Arc<dyn RequestConverter>,
    },
    Url,
}

impl RequestTemplate {
    /// Validate the descriptor and resolve a converter for every
    /// parameter position.
    pub(crate) fn compile(
        client: &RestClient,
        descriptor: &EndpointDescriptor,
    ) -> Result<Self, Error> {
        let placeholders = match descriptor.relative_path() {
            Some(path) => parse_placeholders(path)?,
            None => HashSet::new(),
        };

        let allows_body = matches!(
            *descriptor.method(),
            Method::POST | Method::PUT | Method::PATCH
        );
        if descriptor.body_kind() != BodyKind::None && !allows_body {
            return Err(Error::config(format!(
                "{} endpoints cannot carry a request body",
                descriptor.method()
            )));
        }

        let mut bound_placeholders = HashSet::new();
        let mut url_params = 0usize;
        let mut fields = 0usize;
        let mut parts = 0usize;
        let mut handlers = Vec::with_capacity(descriptor.parameters().len());

        for Parameter { role, ty } in descriptor.parameters() {
            let handler = match role {
                ParameterRole::Path { name, encoded } => {
                    if descriptor.relative_path().is_none() {
                        return Err(Error::config(format!(
                            "path parameter {name:?} declared on an endpoint without a \
                             path template"
                        )));
                    }
                    if !placeholders.contains(name.as_str()) {
                        return Err(Error::config(format!(
                            "path template has no placeholder for parameter {name:?}"
                        )));
                    }
                    if !bound_placeholders.insert(name.clone()) {
                        return Err(Error::config(format!(
                            "placeholder {name:?} bound by more than one parameter"
                        )));
                    }
                    ParamHandler::Path {
                        name: name.clone(),
                        encoded: *encoded,
                        conv: client.string_converter(ty),
                    }
                }
                ParameterRole::Query { name, encoded } => ParamHandler::Query {
                    name: name.clone(),
                    encoded: *encoded,
                    conv: client.string_converter(ty),
                },
                ParameterRole::Header { name } => ParamHandler::Header {
                    name: name.clone(),
                    conv: client.string_converter(ty),
                },
                ParameterRole::Field { name, encoded } => {
                    if descriptor.body_kind() != BodyKind::FormUrlEncoded {
                        return Err(Error::config(format!(
                            "field parameter {name:?} requires a form-url-encoded endpoint"
                        )));
                    }
                    fields += 1;
                    ParamHandler::Field {
                        name: name.clone(),
                        encoded: *encoded,
                        conv: client.string_converter(ty),
                    }
                }
                ParameterRole::Part { name, filename } => {
                    if descriptor.body_kind() != BodyKind::Multipart {
                        return Err(Error::config(format!(
                            "part parameter {name:?} requires a multipart endpoint"
                        )));
                    }
                    parts += 1;
                    ParamHandler::Part {
                        name: name.clone(),
                        filename: filename.clone(),
                        conv: client.request_converter(ty)?,
                    }
                }
                ParameterRole::Body => {
                    if descriptor.body_kind() != BodyKind::Single {
                        return Err(Error::config(
                            "body parameter requires a single-body endpoint",
                        ));
                    }
                    ParamHandler::Body {
                        conv: client.request_converter(ty)?,
                    }
                }
                ParameterRole::Url => {
                    if descriptor.relative_path().is_some() {
                        return Err(Error::config(
                            "url parameter cannot be combined with a path template",
                        ));
                    }
                    url_params += 1;
                    ParamHandler::Url
                }
            };
            handlers.push(handler);
        }

        if let Some(unbound) = placeholders
            .iter()
            .find(|name| !bound_placeholders.contains(*name))
        {
            return Err(Error::config(format!(
                "placeholder {unbound:?} has no path parameter"
            )));
        }
        if descriptor.relative_path().is_none() && url_params != 1 {
            return Err(Error::config(
                "an endpoint without a path template requires exactly one url parameter",
            ));
        }
        if descriptor.body_kind() == BodyKind::FormUrlEncoded && fields == 0 {
            return Err(Error::config(
                "form-url-encoded endpoint requires at least one field parameter",
            ));
        }
        if descriptor.body_kind() == BodyKind::Multipart && parts == 0 {
            return Err(Error::config(
                "multipart endpoint requires at least one part parameter",
            ));
        }

        Ok(RequestTemplate {
            method: descriptor.method().clone(),
            base_url: client.base_url().clone(),
            relative_path: descriptor.relative_path().map(str::to_owned),
            static_headers: descriptor.static_headers().clone(),
            content_type: descriptor.content_type_override().map(str::to_owned),
            body_kind: descriptor.body_kind(),
            disable_cache: descriptor.cache_disabled(),
            handlers,
        })
    }

    /// Bind call-site arguments into an immutable request. Pure: no I/O,
    /// no transport interaction, deterministic apart from the multipart
    /// boundary.
    pub fn bind(&self, args: &[Argument]) -> Result<Request, Error> {
        if args.len() != self.handlers.len() {
            return Err(Error::config(format!(
                "argument count mismatch: expected {}, got {}",
                self.handlers.len(),
                args.len()
            )));
        }

        let mut builder = RequestBuilder::new(
            self.method.clone(),
            self.base_url.clone(),
            self.relative_path.clone(),
            self.static_headers.clone(),
            self.content_type.clone(),
            self.body_kind,
            self.disable_cache,
        );

        for (handler, arg) in self.handlers.iter().zip(args) {
            match handler {
                ParamHandler::Path {
                    name,
                    encoded,
                    conv,
                } => {
                    if arg.is_absent() {
                        return Err(Error::config(format!(
                            "path parameter {name:?} must not be absent"
                        )));
                    }
                    builder.add_path_param(name, &conv.convert(arg)?, *encoded)?;
                }
                ParamHandler::Query {
                    name,
                    encoded,
                    conv,
                } => {
                    if !arg.is_absent() {
                        builder.add_query(name, &conv.convert(arg)?, *encoded);
                    }
                }
                ParamHandler::Header { name, conv } => {
                    if !arg.is_absent() {
                        builder.add_header(name, &conv.convert(arg)?)?;
                    }
                }
                ParamHandler::Field {
                    name,
                    encoded,
                    conv,
                } => {
                    if !arg.is_absent() {
                        builder.add_field(name, &conv.convert(arg)?, *encoded);
                    }
                }
                ParamHandler::Part {
                    name,
                    filename,
                    conv,
                } => {
                    if !arg.is_absent() {
                        builder.add_part(name, filename.as_deref(), conv.convert(arg)?);
                    }
                }
                ParamHandler::Body { conv } => {
                    if arg.is_absent() {
                        return Err(Error::config("body parameter must not be absent"));
                    }
                    builder.set_body(conv.convert(arg)?);
                }
                ParamHandler::Url => {
                    let url = arg
                        .downcast_ref::<String>()
                        .ok_or_else(|| Error::config("url parameter must be a String"))?;
                    builder.set_url(url.clone());
                }
            }
        }

        builder.build()
    }
}

/// One compiled endpoint: the binding plan plus the resolved response
/// converter and call adapter.
pub struct CompiledMethod {
    descriptor: Arc<EndpointDescriptor>,
    template: RequestTemplate,
    response_converter: Arc<dyn ResponseConverter>,
    adapter: Arc<dyn CallAdapter>,
}

impl std::fmt::Debug for CompiledMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledMethod").finish_non_exhaustive()
    }
}

impl CompiledMethod {
    pub(crate) fn compile(
        client: &RestClient,
        descriptor: Arc<EndpointDescriptor>,
    ) -> Result<Self, Error> {
        let adapter = client.call_adapter(&descriptor)?;
        let response_converter = client.response_converter(&adapter.response_type())?;
        let template = RequestTemplate::compile(client, &descriptor)?;
        Ok(CompiledMethod {
            descriptor,
            template,
            response_converter,
            adapter,
        })
    }

    pub fn descriptor(&self) -> &EndpointDescriptor {
        &self.descriptor
    }

    pub fn template(&self) -> &RequestTemplate {
        &self.template
    }

    pub(crate) fn response_converter(&self) -> Arc<dyn ResponseConverter> {
        self.response_converter.clone()
    }

    pub(crate) fn adapter(&self) -> Arc<dyn CallAdapter> {
        self.adapter.clone()
    }
}

/// Extract `{name}` placeholders, rejecting malformed ones.
fn parse_placeholders(path: &str) -> Result<HashSet<String>, Error> {
    let mut names = HashSet::new();
    let mut rest = path;
    while let Some(open) = rest.find('{') {
        let tail = &rest[open + 1..];
        let Some(close) = tail.find('}') else {
            return Err(Error::config(format!(
                "unterminated placeholder in path template {path:?}"
            )));
        };
        let name = &tail[..close];
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(Error::config(format!(
                "invalid placeholder name {name:?} in path template {path:?}"
            )));
        }
        names.insert(name.to_string());
        rest = &tail[close + 1..];
    }
    if rest.contains('}') {
        return Err(Error::config(format!(
            "stray '}}' in path template {path:?}"
        )));
    }
    Ok(names)
}
