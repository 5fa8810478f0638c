//! Prelude module for convenient imports.
//!
//! ```
//! use courier::prelude::*;
//! ```

#[cfg(feature = "basic-auth")]
pub use crate::BasicAuth;
#[cfg(feature = "form")]
pub use crate::FormCodec;
#[cfg(feature = "json")]
pub use crate::JsonCodec;
#[cfg(feature = "yaml")]
pub use crate::YamlCodec;
pub use crate::{
    AuthProvider, Authenticator, BearerAuth, ClientConfigBuilder, Codec, CodecExt, ContentType,
    Error, Form, Headers, LogLevel, Method, NetworkClient, Part, Request, RequestBuilder,
    Response, Result, StatusCode, WebSocketSession, header,
};
pub use serde::{Deserialize, Serialize};
