//! Builder-driven HTTP client with pluggable codecs and tower middleware.
//!
//! A [`NetworkClient`] is configured once with [`ClientConfigBuilder`] and
//! then dispatches requests described per call through a
//! [`RequestBuilder`] closure:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use courier::prelude::*;
//!
//! #[derive(Debug, Deserialize)]
//! struct Fact {
//!     fact: String,
//!     length: u32,
//! }
//!
//! # async fn run() -> courier::Result<()> {
//! let client = NetworkClient::builder()
//!     .base_url("https://catfact.ninja")
//!     .serializer(Arc::new(JsonCodec))
//!     .log_level(LogLevel::Basic)
//!     .build();
//!
//! let fact: Fact = client.get_as("/fact", |request| request.query("max_length", 140)).await?;
//! println!("{} ({} chars)", fact.fact, fact.length);
//! # Ok(())
//! # }
//! ```
//!
//! Requests go through the user interceptors, then logging, then auth
//! injection, then the transport. See [`middleware`] for the details.
//!
//! # Features
//!
//! | Feature | Default | Adds |
//! |---|---|---|
//! | `json` | yes | [`JsonCodec`], `PrettyJsonCodec` |
//! | `basic-auth` | yes | `BasicAuth` |
//! | `yaml` | no | `YamlCodec` |
//! | `form` | no | `FormCodec` |
//! | `codecs-full` | no | every codec |

mod client;
mod config;
mod connector;
pub mod middleware;
pub mod prelude;
pub mod transport;
mod websocket;

pub use client::NetworkClient;
pub use config::{
    CacheConfig, ClientConfig, ClientConfigBuilder, DEFAULT_CACHE_SIZE, DEFAULT_TIMEOUT,
    PoolConfig,
};
pub use middleware::LogLevel;
pub use websocket::{WebSocketSession, WebSocketSessionBuilder};

// Re-export tower for interceptors
pub use tower;

// Re-export core types
#[cfg(feature = "basic-auth")]
pub use courier_core::BasicAuth;
pub use courier_core::{
    AuthProvider, Authenticator, BearerAuth, Codec, CodecExt, ContentType, Error, Form, Headers,
    IntoRequestBuilder, Method, Part, Request, RequestBuilder, Response, Result, TypeDescriptor,
    TypeTag, Value, challenge_header,
};

// Re-export http types for status codes and headers
pub use courier_core::{StatusCode, header};

// Re-export codec backends (feature-gated)
#[cfg(feature = "form")]
pub use courier_codec::FormCodec;
#[cfg(feature = "json")]
pub use courier_codec::{JsonCodec, PrettyJsonCodec};
#[cfg(feature = "yaml")]
pub use courier_codec::YamlCodec;
