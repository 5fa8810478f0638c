//! Well-known body media types.

use derive_more::Display;

/// Content type of a request or response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ContentType {
    /// `application/json`.
    #[display("application/json")]
    Json,
    /// `application/yaml`.
    #[display("application/yaml")]
    Yaml,
    /// `application/x-www-form-urlencoded`.
    #[display("application/x-www-form-urlencoded")]
    FormUrlEncoded,
    /// `text/plain; charset=utf-8`.
    #[display("text/plain; charset=utf-8")]
    PlainText,
    /// `application/octet-stream`.
    #[display("application/octet-stream")]
    OctetStream,
}

impl ContentType {
    /// MIME type string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Yaml => "application/yaml",
            Self::FormUrlEncoded => "application/x-www-form-urlencoded",
            Self::PlainText => "text/plain; charset=utf-8",
            Self::OctetStream => "application/octet-stream",
        }
    }
}

impl From<ContentType> for String {
    fn from(content_type: ContentType) -> Self {
        content_type.as_str().to_string()
    }
}
