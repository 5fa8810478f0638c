//! Error types for courier.
//!
//! Every dispatch path reports through the single [`Error`] enum. Which
//! variants a caller can observe depends on the dispatch flavour:
//!
//! - typed dispatch (`get_as::<T>` and friends) may return any variant;
//! - result-wrapped and raw dispatch only return transport-level variants
//!   (see [`Error::is_transport`]), an HTTP 404 is a successful exchange there;
//! - callback dispatch and WebSocket sessions hand the error to a callback.

use derive_more::{Display, Error, From};

/// Main error type for courier operations.
#[derive(Debug, Display, Error, From)]
pub enum Error {
    /// HTTP-level errors (non-2xx status codes on typed dispatch).
    #[display("HTTP error {status}: {message}")]
    #[from(skip)]
    Http {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
        /// Response body, if available.
        #[error(not(source))]
        body: Option<bytes::Bytes>,
    },

    /// Typed dispatch expected a body but the response had none.
    #[display("response body is empty")]
    #[from(skip)]
    EmptyBody,

    /// Typed dispatch or body encoding attempted without a bound codec.
    #[display("no codec configured on this client")]
    #[from(skip)]
    CodecNotConfigured,

    /// The codec could not turn the body into the requested type.
    #[display("cannot decode `{type_name}` at '{path}': {message}")]
    #[from(skip)]
    Decode {
        /// Name of the requested type.
        type_name: String,
        /// Path to the offending field (empty for syntax errors).
        path: String,
        /// Error message from the codec.
        message: String,
    },

    /// The codec could not encode a value.
    #[display("cannot encode `{type_name}`: {message}")]
    #[from(skip)]
    Encode {
        /// Name of the encoded type.
        type_name: String,
        /// Error message from the codec.
        message: String,
    },

    /// Network/connection errors.
    #[display("connection error: {_0}")]
    #[from(skip)]
    Connection(#[error(not(source))] String),

    /// TLS/SSL errors.
    #[display("TLS error: {_0}")]
    #[from(skip)]
    Tls(#[error(not(source))] String),

    /// Request timeout.
    #[display("request timeout")]
    #[from(skip)]
    Timeout,

    /// The request reached the transport without a usable URL.
    #[display("malformed request: {_0}")]
    #[from(skip)]
    MalformedRequest(#[error(not(source))] String),

    /// Invalid request configuration.
    #[display("invalid request: {_0}")]
    #[from(skip)]
    InvalidRequest(#[error(not(source))] String),

    /// URL parsing error.
    #[display("invalid URL: {_0}")]
    #[from]
    InvalidUrl(url::ParseError),

    /// The response cache could not be used.
    #[display("cache error: {_0}")]
    #[from(skip)]
    Cache(#[error(not(source))] String),

    /// WebSocket handshake or I/O failure.
    #[display("WebSocket error: {_0}")]
    #[from(skip)]
    WebSocket(#[error(not(source))] String),

    /// Callback dispatch was requested outside of an async runtime.
    #[display("no async runtime available to run the call")]
    #[from(skip)]
    NoRuntime,
}

/// Result type alias using [`crate::Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an HTTP error from status code and message.
    #[must_use]
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
            body: None,
        }
    }

    /// Create an HTTP error with body.
    #[must_use]
    pub fn http_with_body(status: u16, message: impl Into<String>, body: bytes::Bytes) -> Self {
        Self::Http {
            status,
            message: message.into(),
            body: Some(body),
        }
    }

    /// Create a connection error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a TLS error.
    #[must_use]
    pub fn tls(message: impl Into<String>) -> Self {
        Self::Tls(message.into())
    }

    /// Create a malformed request error.
    #[must_use]
    pub fn malformed_request(message: impl Into<String>) -> Self {
        Self::MalformedRequest(message.into())
    }

    /// Create an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create a decode error.
    #[must_use]
    pub fn decode(
        type_name: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Decode {
            type_name: type_name.into(),
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an encode error.
    #[must_use]
    pub fn encode(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Encode {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// Create a cache error.
    #[must_use]
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache(message.into())
    }

    /// Create a WebSocket error.
    #[must_use]
    pub fn websocket(message: impl Into<String>) -> Self {
        Self::WebSocket(message.into())
    }

    /// Returns `true` if this is a timeout error.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Returns `true` if this is a connection error.
    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Returns `true` if the exchange itself failed (no HTTP response was obtained).
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Connection(_)
                | Self::Tls(_)
                | Self::Timeout
                | Self::MalformedRequest(_)
                | Self::Cache(_)
        )
    }

    /// Returns the HTTP status code if this is an HTTP error.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` if this is a client error (4xx).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status().is_some_and(|s| (400..500).contains(&s))
    }

    /// Returns `true` if this is a server error (5xx).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status().is_some_and(|s| (500..600).contains(&s))
    }

    /// Returns `true` if this is a 404 Not Found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Returns the response body if this is an HTTP error with a body.
    #[must_use]
    pub fn body(&self) -> Option<&bytes::Bytes> {
        match self {
            Self::Http { body, .. } => body.as_ref(),
            _ => None,
        }
    }
}
