//! Core types and capability contracts for the courier HTTP client.
//!
//! This crate holds everything a request or a response is made of, plus
//! the pluggable capabilities a client is configured with:
//! - [`Method`], [`Headers`], [`Request`] and [`RequestBuilder`]
//! - [`Response`]
//! - [`Form`] and [`Part`] for multipart bodies
//! - [`Codec`] and [`CodecExt`] for body (de)serialization
//! - [`AuthProvider`] and [`Authenticator`], with [`BearerAuth`] and `BasicAuth`
//! - [`Error`] and [`Result`]

mod auth;
mod body;
pub mod codec;
mod error;
mod headers;
mod method;
mod multipart;
pub mod prelude;
mod request;
mod response;

#[cfg(feature = "basic-auth")]
pub use auth::BasicAuth;
pub use auth::{AuthProvider, Authenticator, BearerAuth, challenge_header};
pub use body::ContentType;
pub use codec::{Codec, CodecExt, TypeDescriptor, TypeTag};
pub use error::{Error, Result};
pub use headers::Headers;
pub use method::Method;
pub use multipart::{Form, Part};
pub use request::{IntoRequestBuilder, Request, RequestBuilder};
pub use response::Response;

pub use http::{StatusCode, header};
pub use serde_json::Value;
