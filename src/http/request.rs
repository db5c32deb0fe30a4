// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Request templates, per-call options and the merged request handed to a transport
//!
//! The effective request of a dispatch is built in three layers, later layers
//! winning field by field: context defaults, then the [`RequestTemplate`] (or
//! a bare URL), then the per-call [`RequestOptions`]. Header maps merge key by
//! key instead of replacing each other wholesale.

use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use url::Url;

use crate::error::{Error, Result};

/// Request body
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    /// No body
    #[default]
    Empty,
    /// Raw bytes, sent as-is
    Bytes(Bytes),
    /// JSON document, `content-type: application/json` unless set explicitly
    Json(serde_json::Value),
    /// URL-encoded form fields
    Form(Vec<(String, String)>),
    /// multipart/form-data parts
    Multipart(Vec<MultipartField>),
}

impl RequestBody {
    /// Check if there is no body
    pub fn is_empty(&self) -> bool {
        matches!(self, RequestBody::Empty)
    }
}

/// A multipart/form-data field
#[derive(Debug, Clone, PartialEq)]
pub struct MultipartField {
    /// Field name
    pub name: String,
    /// Field content
    pub value: MultipartValue,
}

/// Content of a multipart field
#[derive(Debug, Clone, PartialEq)]
pub enum MultipartValue {
    /// Plain text value
    Text(String),
    /// File upload
    File {
        file_name: String,
        mime_type: String,
        buffer: Bytes,
    },
}

impl MultipartField {
    /// Create a text field
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: MultipartValue::Text(value.into()),
        }
    }

    /// Create a file field
    pub fn file(
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        buffer: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            value: MultipartValue::File {
                file_name: file_name.into(),
                mime_type: mime_type.into(),
                buffer: buffer.into(),
            },
        }
    }
}

/// What to do with 3xx responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedirectPolicy {
    /// Follow redirects up to the configured maximum
    #[default]
    Follow,
    /// Return 3xx responses to the caller
    Manual,
}

/// Per-call overrides. Every field left unset falls through to the layer below.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Method override
    pub method: Option<Method>,
    /// Headers merged key by key over the lower layers
    pub headers: HeaderMap,
    /// Body override
    pub body: Option<RequestBody>,
    /// Query parameters appended to the URL
    pub params: Vec<(String, String)>,
    /// Request timeout
    pub timeout: Option<Duration>,
    /// Turn non-2xx/3xx statuses into [`Error::HttpStatus`]
    pub fail_on_status_code: Option<bool>,
    /// Redirect policy
    pub redirect: Option<RedirectPolicy>,
    /// Maximum redirects to follow; `0` disables following
    pub max_redirects: Option<usize>,
    /// Accept invalid TLS certificates for this request
    pub ignore_https_errors: Option<bool>,
    /// Proxy URL for this request
    pub proxy: Option<String>,
}

impl RequestOptions {
    /// Create empty options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the method
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Set a header, replacing earlier values of the same name
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        insert_header(&mut self.headers, name.as_ref(), value.as_ref());
        self
    }

    /// Set a raw body
    pub fn data(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(RequestBody::Bytes(body.into()));
        self
    }

    /// Set a JSON body
    pub fn json<T: serde::Serialize>(mut self, data: &T) -> Result<Self> {
        self.body = Some(RequestBody::Json(serde_json::to_value(data).map_err(|e| {
            Error::invalid(format!("request body is not serializable: {}", e))
        })?));
        Ok(self)
    }

    /// Set a URL-encoded form body
    pub fn form<K: Into<String>, V: Into<String>>(
        mut self,
        fields: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        self.body = Some(RequestBody::Form(
            fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        ));
        self
    }

    /// Set a multipart body
    pub fn multipart(mut self, fields: Vec<MultipartField>) -> Self {
        self.body = Some(RequestBody::Multipart(fields));
        self
    }

    /// Add a query parameter
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Set timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Fail on non-2xx/3xx statuses
    pub fn fail_on_status_code(mut self, fail: bool) -> Self {
        self.fail_on_status_code = Some(fail);
        self
    }

    /// Set redirect policy
    pub fn redirect(mut self, policy: RedirectPolicy) -> Self {
        self.redirect = Some(policy);
        self
    }

    /// Set max redirects
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = Some(max);
        self
    }

    /// Accept invalid TLS certificates
    pub fn ignore_https_errors(mut self, ignore: bool) -> Self {
        self.ignore_https_errors = Some(ignore);
        self
    }

    /// Route through a proxy
    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Right-biased merge: fields set in `other` win
    pub fn merged(mut self, other: &RequestOptions) -> Self {
        merge_headers(&mut self.headers, &other.headers);
        self.params.extend(other.params.iter().cloned());
        if other.method.is_some() {
            self.method = other.method.clone();
        }
        if other.body.is_some() {
            self.body = other.body.clone();
        }
        self.timeout = other.timeout.or(self.timeout);
        self.fail_on_status_code = other.fail_on_status_code.or(self.fail_on_status_code);
        self.redirect = other.redirect.or(self.redirect);
        self.max_redirects = other.max_redirects.or(self.max_redirects);
        self.ignore_https_errors = other.ignore_https_errors.or(self.ignore_https_errors);
        if other.proxy.is_some() {
            self.proxy = other.proxy.clone();
        }
        self
    }
}

/// A pre-built request: a method and URL plus the fields it overrides
#[derive(Debug, Clone)]
pub struct RequestTemplate {
    /// Request method
    pub method: Method,
    /// Absolute URL, or a URL relative to the context's base URL
    pub url: String,
    /// Everything else the template carries
    pub options: RequestOptions,
}

impl RequestTemplate {
    /// Create a new template
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            options: RequestOptions::default(),
        }
    }

    /// Create a GET template
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Create a POST template
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Set a header
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.options = self.options.header(name, value);
        self
    }

    /// Set the body
    pub fn body(mut self, body: RequestBody) -> Self {
        self.options.body = Some(body);
        self
    }

    /// Replace the template's options
    pub fn options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }
}

/// Target of a dispatch: a bare URL or a complete template
#[derive(Debug, Clone)]
pub enum RequestTarget {
    /// URL string, absolute or relative to the base URL
    Url(String),
    /// Pre-built request
    Template(RequestTemplate),
}

impl From<&str> for RequestTarget {
    fn from(url: &str) -> Self {
        RequestTarget::Url(url.to_string())
    }
}

impl From<String> for RequestTarget {
    fn from(url: String) -> Self {
        RequestTarget::Url(url)
    }
}

impl From<&String> for RequestTarget {
    fn from(url: &String) -> Self {
        RequestTarget::Url(url.clone())
    }
}

impl From<Url> for RequestTarget {
    fn from(url: Url) -> Self {
        RequestTarget::Url(url.into())
    }
}

impl From<RequestTemplate> for RequestTarget {
    fn from(template: RequestTemplate) -> Self {
        RequestTarget::Template(template)
    }
}

/// Fully resolved request for a single hop, as handed to a transport
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    /// Request method
    pub method: Method,
    /// Absolute URL including query parameters
    pub url: Url,
    /// Request headers, `cookie` included
    pub headers: HeaderMap,
    /// Request body
    pub body: RequestBody,
    /// Request timeout
    pub timeout: Duration,
    /// Accept invalid TLS certificates
    pub ignore_https_errors: bool,
    /// Proxy URL
    pub proxy: Option<String>,
}

impl PreparedRequest {
    /// Get the origin
    pub fn origin(&self) -> String {
        self.url.origin().ascii_serialization()
    }
}

/// Resolve a URL string against an optional base URL
pub fn resolve_url(input: &str, base: Option<&Url>) -> Result<Url> {
    match Url::parse(input) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => match base {
            Some(base) => base
                .join(input)
                .map_err(|e| Error::invalid(format!("invalid URL '{}': {}", input, e))),
            None => Err(Error::invalid(format!(
                "relative URL '{}' requires a base URL",
                input
            ))),
        },
        Err(e) => Err(Error::invalid(format!("invalid URL '{}': {}", input, e))),
    }
}

/// Insert a header from strings, replacing earlier values
pub(crate) fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) {
    match (
        HeaderName::try_from(name),
        HeaderValue::try_from(value),
    ) {
        (Ok(name), Ok(value)) => {
            headers.insert(name, value);
        }
        _ => tracing::warn!(name = %name, "Dropping invalid header"),
    }
}

/// Merge `upper` into `lower` key by key; every value of an upper key replaces the lower ones
pub(crate) fn merge_headers(lower: &mut HeaderMap, upper: &HeaderMap) {
    for name in upper.keys() {
        lower.remove(name);
        for value in upper.get_all(name) {
            lower.append(name.clone(), value.clone());
        }
    }
}
