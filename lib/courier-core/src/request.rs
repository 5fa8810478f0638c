//! Outgoing requests and their builder.
//!
//! A [`RequestBuilder`] is seeded by the client with its base URL and codec,
//! configured by the caller, then turned into an immutable [`Request`] by
//! [`RequestBuilder::build`].
//!
//! ```
//! use courier_core::{Method, Request};
//!
//! let request = Request::builder(Method::Get, "/users")
//!     .base_url("https://api.example.com")
//!     .query("page", "1")
//!     .query("page", "2")
//!     .header("Accept", "application/json")
//!     .build();
//!
//! assert_eq!(
//!     request.url().map(|url| url.as_str()),
//!     Some("https://api.example.com/users?page=2")
//! );
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use indexmap::IndexMap;
use serde::Serialize;
use url::Url;

use crate::{AuthProvider, Codec, CodecExt, ContentType, Error, Form, Headers, Method, Part, Result};

/// An HTTP request ready for dispatch.
///
/// `url` is `None` when the builder was given a blank or unparsable URL;
/// the transport rejects such requests with [`Error::MalformedRequest`].
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Option<Url>,
    headers: Headers,
    body: Option<Bytes>,
    timeout: Option<Duration>,
    log_headers: bool,
    auth_override: bool,
}

impl Request {
    /// Creates a builder for `method` on `url` (no base URL).
    #[must_use]
    pub fn builder(method: Method, url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new().method(method).url(url)
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Final URL, query included.
    #[must_use]
    pub const fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// Replaces the URL.
    pub fn set_url(&mut self, url: Url) {
        self.url = Some(url);
    }

    /// Request headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Mutable access to headers.
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// First value of a header.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Request body.
    #[must_use]
    pub const fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Overall deadline for this exchange, if set.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Whether this request asked for header-level logging.
    #[must_use]
    pub const fn log_headers(&self) -> bool {
        self.log_headers
    }

    /// Whether credentials came from a per-request provider.
    #[must_use]
    pub const fn has_auth_override(&self) -> bool {
        self.auth_override
    }

    /// Consume into (method, url, headers, body).
    #[must_use]
    pub fn into_parts(self) -> (Method, Option<Url>, Headers, Option<Bytes>) {
        (self.method, self.url, self.headers, self.body)
    }
}

/// Builder for a single [`Request`].
#[derive(Clone, Default)]
pub struct RequestBuilder {
    base_url: Option<String>,
    path: String,
    method: Method,
    headers: Headers,
    query: IndexMap<String, String>,
    body: Option<(Bytes, String)>,
    form: Option<Form>,
    timeout: Option<Duration>,
    log_headers: bool,
    auth: Option<Arc<dyn AuthProvider>>,
    codec: Option<Arc<dyn Codec>>,
}

impl RequestBuilder {
    /// Creates an empty `GET` builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL the path is appended to.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the path.
    ///
    /// The final URL is the base URL followed by this path, concatenated as
    /// is: no slash is added or removed.
    #[must_use]
    pub fn url(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Sets the method.
    #[must_use]
    pub const fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Adds a header, keeping earlier values with the same name.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Sets a header, replacing earlier values with the same name.
    #[must_use]
    pub fn set_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Adds several headers.
    #[must_use]
    pub fn headers<N, V>(mut self, headers: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        self.headers.extend(headers);
        self
    }

    /// Sets a query parameter. A later value for the same name wins.
    #[must_use]
    pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.insert(name.into(), value.to_string());
        self
    }

    /// Sets the body and its content type.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        self.body = Some((body.into(), content_type.into()));
        self
    }

    /// Sets a plain text body.
    #[must_use]
    pub fn text(self, text: impl Into<String>) -> Self {
        self.body(text.into(), ContentType::PlainText)
    }

    /// Encodes `value` with the bound codec and uses it as the body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CodecNotConfigured`] if no codec is bound, or the
    /// codec's encode error.
    pub fn encode_body<T: Serialize + ?Sized>(self, value: &T) -> Result<Self> {
        let codec = self.codec.clone().ok_or(Error::CodecNotConfigured)?;
        let text = codec.encode_as(value)?;
        Ok(self.body(text, codec.media_type()))
    }

    /// Adds a plain multipart field.
    #[must_use]
    pub fn multipart_field(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.multipart_part(Part::field(name, value))
    }

    /// Adds a multipart file.
    #[must_use]
    pub fn multipart_file(
        self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        data: impl Into<Bytes>,
        media_type: impl Into<String>,
    ) -> Self {
        self.multipart_part(Part::file(name, file_name, data).with_content_type(media_type))
    }

    /// Adds a multipart part.
    #[must_use]
    pub fn multipart_part(mut self, part: Part) -> Self {
        self.form.get_or_insert_with(Form::new).push(part);
        self
    }

    /// Sets an overall deadline for the exchange.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Logs this request's headers when the client logs at all.
    #[must_use]
    pub const fn log_headers(mut self, enable: bool) -> Self {
        self.log_headers = enable;
        self
    }

    /// Runs `provider` on this request's headers at build time.
    ///
    /// The client's default provider then skips its pre-dispatch pass, but
    /// its auth middleware still runs and wins for the headers it sets.
    #[must_use]
    pub fn auth(mut self, provider: Arc<dyn AuthProvider>) -> Self {
        self.auth = Some(provider);
        self
    }

    /// Binds the codec used by [`RequestBuilder::encode_body`].
    #[must_use]
    pub fn codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Whether [`RequestBuilder::auth`] was called.
    #[must_use]
    pub const fn has_auth_override(&self) -> bool {
        self.auth.is_some()
    }

    /// Finalizes the request.
    ///
    /// `POST`, `PUT` and `PATCH` without an explicit body get the multipart
    /// form (empty if no part was added). The per-request auth provider runs
    /// after the headers set on this builder.
    #[must_use]
    pub fn build(self) -> Request {
        let url = self.resolve_url();
        let mut headers = self.headers;

        let body = match self.body {
            Some((body, content_type)) => {
                if !headers.contains("Content-Type") {
                    headers.append("Content-Type", content_type);
                }
                Some(body)
            }
            None if self.method.requires_body() => {
                let (content_type, body) = self.form.unwrap_or_default().into_body();
                headers.insert("Content-Type", content_type);
                Some(body)
            }
            None => None,
        };

        let auth_override = self.auth.is_some();
        if let Some(provider) = &self.auth {
            provider.add_headers(&mut headers);
        }

        Request {
            method: self.method,
            url,
            headers,
            body,
            timeout: self.timeout,
            log_headers: self.log_headers,
            auth_override,
        }
    }

    fn resolve_url(&self) -> Option<Url> {
        let raw = match &self.base_url {
            Some(base) => format!("{base}{}", self.path),
            None => self.path.clone(),
        };
        if raw.trim().is_empty() {
            return None;
        }

        let mut url = Url::parse(&raw).ok()?;
        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &self.query {
                pairs.append_pair(name, value);
            }
        }
        Some(url)
    }
}

/// Return type of request configuration closures.
///
/// Lets a closure end with either a builder or a fallible builder step such
/// as [`RequestBuilder::encode_body`].
pub trait IntoRequestBuilder {
    /// Converts into a builder, or the error a configuration step produced.
    fn into_request_builder(self) -> Result<RequestBuilder>;
}

impl IntoRequestBuilder for RequestBuilder {
    fn into_request_builder(self) -> Result<RequestBuilder> {
        Ok(self)
    }
}

impl IntoRequestBuilder for Result<RequestBuilder> {
    fn into_request_builder(self) -> Result<RequestBuilder> {
        self
    }
}

impl fmt::Debug for RequestBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("base_url", &self.base_url)
            .field("path", &self.path)
            .field("method", &self.method)
            .field("headers", &self.headers)
            .field("query", &self.query)
            .field("body", &self.body.as_ref().map(|(body, _)| body.len()))
            .field("form", &self.form.as_ref().map(Form::len))
            .field("timeout", &self.timeout)
            .field("log_headers", &self.log_headers)
            .field("auth", &self.auth.is_some())
            .field("codec", &self.codec.as_ref().map(|codec| codec.media_type()))
            .finish()
    }
}
