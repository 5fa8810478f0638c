//! HTTP response handling.
//!
//! [`Response`] is the raw outcome of an exchange: status, headers and the
//! fully buffered body. Raw and result-wrapped dispatch hand it to the
//! caller whatever the status code; typed dispatch turns it into a value
//! with [`Response::decode`].

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::{Codec, Error, Headers, Result, TypeTag, codec::decode_tagged};

/// HTTP response with status, headers, and body.
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    headers: Headers,
    body: Bytes,
}

impl Response {
    /// Creates a new response.
    #[must_use]
    pub fn new(status: u16, headers: Headers, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Response headers.
    #[must_use]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Single header value by name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Response body.
    #[must_use]
    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    /// Consume into body.
    #[must_use]
    pub fn into_body(self) -> Bytes {
        self.body
    }

    /// Consume into (status, headers, body).
    #[must_use]
    pub fn into_parts(self) -> (u16, Headers, Bytes) {
        (self.status, self.headers, self.body)
    }

    /// Status is 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Status is 3xx.
    #[must_use]
    pub const fn is_redirection(&self) -> bool {
        self.status >= 300 && self.status < 400
    }

    /// Status is 4xx.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        self.status >= 400 && self.status < 500
    }

    /// Status is 5xx.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        self.status >= 500 && self.status < 600
    }

    /// Get the response body as text.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid UTF-8.
    pub fn text(&self) -> std::result::Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.body)
    }

    /// Decodes the body into `T`, the way typed dispatch does.
    ///
    /// Checks run in a fixed order: status, then body presence, then codec
    /// availability, then the decode itself.
    ///
    /// # Errors
    ///
    /// - [`Error::Http`] if the status is not 2xx (the body is kept on the error);
    /// - [`Error::EmptyBody`] if the body is empty;
    /// - [`Error::CodecNotConfigured`] if `codec` is `None`;
    /// - [`Error::Decode`] if the body is not valid UTF-8 or the codec rejects it.
    pub fn decode<T: DeserializeOwned>(self, codec: Option<&dyn Codec>) -> Result<T> {
        let tag = TypeTag::<T>::new();

        if !self.is_success() {
            let message = reason_phrase(self.status);
            return Err(if self.body.is_empty() {
                Error::http(self.status, message)
            } else {
                Error::http_with_body(self.status, message, self.body)
            });
        }

        if self.body.is_empty() {
            return Err(Error::EmptyBody);
        }

        let codec = codec.ok_or(Error::CodecNotConfigured)?;
        let text = std::str::from_utf8(&self.body)
            .map_err(|e| Error::decode(tag.descriptor().name(), "", e.to_string()))?;

        decode_tagged(codec, tag, text)
    }
}

fn reason_phrase(status: u16) -> String {
    http::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("Unknown Status")
        .to_string()
}
