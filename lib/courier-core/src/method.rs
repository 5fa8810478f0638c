//! HTTP method types.

use derive_more::Display;

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display)]
pub enum Method {
    /// GET method - retrieve a resource.
    #[default]
    #[display("GET")]
    Get,
    /// POST method - create a resource.
    #[display("POST")]
    Post,
    /// PUT method - replace a resource.
    #[display("PUT")]
    Put,
    /// DELETE method - remove a resource.
    #[display("DELETE")]
    Delete,
    /// PATCH method - partially update a resource.
    #[display("PATCH")]
    Patch,
    /// HEAD method - retrieve headers only.
    #[display("HEAD")]
    Head,
    /// OPTIONS method - retrieve allowed methods.
    #[display("OPTIONS")]
    Options,
    /// TRACE method - loop-back test.
    #[display("TRACE")]
    Trace,
    /// CONNECT method - open a tunnel.
    #[display("CONNECT")]
    Connect,
}

impl Method {
    /// Returns `true` if a request with this method always carries a body.
    ///
    /// When no explicit body is set, such requests get a (possibly empty)
    /// multipart form body.
    #[must_use]
    pub const fn requires_body(&self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

impl From<Method> for http::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => Self::GET,
            Method::Post => Self::POST,
            Method::Put => Self::PUT,
            Method::Delete => Self::DELETE,
            Method::Patch => Self::PATCH,
            Method::Head => Self::HEAD,
            Method::Options => Self::OPTIONS,
            Method::Trace => Self::TRACE,
            Method::Connect => Self::CONNECT,
        }
    }
}

impl TryFrom<http::Method> for Method {
    type Error = crate::Error;

    fn try_from(method: http::Method) -> Result<Self, Self::Error> {
        match method {
            http::Method::GET => Ok(Self::Get),
            http::Method::POST => Ok(Self::Post),
            http::Method::PUT => Ok(Self::Put),
            http::Method::DELETE => Ok(Self::Delete),
            http::Method::PATCH => Ok(Self::Patch),
            http::Method::HEAD => Ok(Self::Head),
            http::Method::OPTIONS => Ok(Self::Options),
            http::Method::TRACE => Ok(Self::Trace),
            http::Method::CONNECT => Ok(Self::Connect),
            other => Err(crate::Error::InvalidRequest(format!(
                "unsupported HTTP method: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_display() {
        assert_eq!(Method::Get.to_string(), "GET");
        assert_eq!(Method::Post.to_string(), "POST");
        assert_eq!(Method::Put.to_string(), "PUT");
        assert_eq!(Method::Delete.to_string(), "DELETE");
        assert_eq!(Method::Patch.to_string(), "PATCH");
        assert_eq!(Method::Head.to_string(), "HEAD");
        assert_eq!(Method::Options.to_string(), "OPTIONS");
        assert_eq!(Method::Trace.to_string(), "TRACE");
        assert_eq!(Method::Connect.to_string(), "CONNECT");
    }

    #[test]
    fn method_requires_body() {
        assert!(Method::Post.requires_body());
        assert!(Method::Put.requires_body());
        assert!(Method::Patch.requires_body());

        for method in [
            Method::Get,
            Method::Head,
            Method::Delete,
            Method::Options,
            Method::Trace,
            Method::Connect,
        ] {
            assert!(!method.requires_body(), "{method} should not require a body");
        }
    }

    #[test]
    fn method_round_trips_through_http() {
        assert_eq!(http::Method::from(Method::Trace), http::Method::TRACE);
        assert_eq!(
            Method::try_from(http::Method::CONNECT).expect("CONNECT"),
            Method::Connect
        );
        assert_eq!(Method::default(), Method::Get);
    }
}
