//! Commonly used types, for glob importing.
//!
//! ```
//! use courier_core::prelude::*;
//! ```

#[cfg(feature = "basic-auth")]
pub use crate::BasicAuth;
pub use crate::{
    AuthProvider, Authenticator, BearerAuth, Codec, CodecExt, ContentType, Error, Form, Headers,
    IntoRequestBuilder, Method, Part, Request, RequestBuilder, Response, Result,
};
