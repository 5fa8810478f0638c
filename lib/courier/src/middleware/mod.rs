//! Tower middleware for the courier client.
//!
//! A client's stack is assembled by [`ClientConfigBuilder::build`], from the
//! outside in:
//!
//! 1. user interceptors, in registration order;
//! 2. [`LoggingLayer`], unless the log level is [`LogLevel::None`];
//! 3. [`AuthLayer`], when an auth provider is configured;
//! 4. the [`Transport`], with [`CacheLayer`] in front of the raw hyper
//!    client when a cache is configured.
//!
//! The auth layer runs last on the way out, so its headers replace any
//! header of the same name an interceptor set.
//!
//! [`ClientConfigBuilder::build`]: crate::ClientConfigBuilder::build
//! [`Transport`]: crate::transport::Transport

mod auth;
mod cache;
mod logging;

pub use auth::{Auth, AuthLayer};
pub use cache::{Cache, CacheLayer};
pub use logging::{LOG_TARGET, LogLevel, Logging, LoggingLayer};

pub use tower::{Layer, Service, ServiceBuilder};
