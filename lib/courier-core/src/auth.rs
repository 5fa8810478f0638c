//! Authentication capabilities.
//!
//! Two distinct contracts:
//!
//! - [`AuthProvider`] injects credentials into every outgoing request. The
//!   client runs it as the innermost middleware, and a request may carry its
//!   own override.
//! - [`Authenticator`] answers `401`/`407` challenges. The transport calls
//!   it only after such a response, outside the middleware chain.
//!
//! [`BearerAuth`] and [`BasicAuth`] implement both.

use std::fmt;
use std::sync::Arc;

use crate::{Headers, Request, Response};

/// Adds credentials to a request's header set.
///
/// Implementations must be idempotent: applying the provider twice to the
/// same headers leaves them as after the first application. Prefer
/// [`Headers::insert`] over [`Headers::append`].
///
/// Any `Fn(&mut Headers)` closure is a provider:
///
/// ```
/// use courier_core::{AuthProvider, Headers};
///
/// let provider = |headers: &mut Headers| headers.insert("X-Api-Key", "secret");
///
/// let mut headers = Headers::new();
/// provider.add_headers(&mut headers);
/// assert_eq!(headers.get("x-api-key"), Some("secret"));
/// ```
pub trait AuthProvider: Send + Sync + 'static {
    /// Adds authentication headers.
    fn add_headers(&self, headers: &mut Headers);
}

impl<F> AuthProvider for F
where
    F: Fn(&mut Headers) + Send + Sync + 'static,
{
    fn add_headers(&self, headers: &mut Headers) {
        self(headers);
    }
}

/// Responds to authentication challenges (`401 Unauthorized`,
/// `407 Proxy Authentication Required`).
pub trait Authenticator: Send + Sync + 'static {
    /// Returns the request to send in place of the challenged one, or `None`
    /// to give up and hand the challenge response to the caller.
    fn authenticate(&self, request: &Request, response: &Response) -> Option<Request>;
}

/// Header carrying credentials for a challenge status.
#[must_use]
pub const fn challenge_header(status: u16) -> &'static str {
    if status == 407 {
        "Proxy-Authorization"
    } else {
        "Authorization"
    }
}

/// Re-issues `request` with `value` in the challenge header, unless the
/// request already carried exactly that value.
fn retry_with(request: &Request, response: &Response, value: &str) -> Option<Request> {
    let header = challenge_header(response.status());
    if request.header(header) == Some(value) {
        return None;
    }

    let mut retry = request.clone();
    retry.headers_mut().insert(header, value);
    Some(retry)
}

/// Bearer token credentials (`Authorization: Bearer <token>`).
#[derive(Clone)]
pub struct BearerAuth {
    value: Arc<str>,
}

impl BearerAuth {
    /// Creates the provider from a token.
    pub fn new(token: impl AsRef<str>) -> Self {
        Self {
            value: Arc::from(format!("Bearer {}", token.as_ref())),
        }
    }
}

impl fmt::Debug for BearerAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerAuth").finish_non_exhaustive()
    }
}

impl AuthProvider for BearerAuth {
    fn add_headers(&self, headers: &mut Headers) {
        headers.insert("Authorization", &*self.value);
    }
}

impl Authenticator for BearerAuth {
    fn authenticate(&self, request: &Request, response: &Response) -> Option<Request> {
        retry_with(request, response, &self.value)
    }
}

/// Basic credentials (`Authorization: Basic <base64(user:pass)>`).
#[cfg(feature = "basic-auth")]
#[derive(Clone)]
pub struct BasicAuth {
    value: Arc<str>,
}

#[cfg(feature = "basic-auth")]
impl BasicAuth {
    /// Creates the provider from a username and password.
    pub fn new(username: impl AsRef<str>, password: impl AsRef<str>) -> Self {
        use base64::Engine;

        let credentials = format!("{}:{}", username.as_ref(), password.as_ref());
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
        Self {
            value: Arc::from(format!("Basic {encoded}")),
        }
    }
}

#[cfg(feature = "basic-auth")]
impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth").finish_non_exhaustive()
    }
}

#[cfg(feature = "basic-auth")]
impl AuthProvider for BasicAuth {
    fn add_headers(&self, headers: &mut Headers) {
        headers.insert("Authorization", &*self.value);
    }
}

#[cfg(feature = "basic-auth")]
impl Authenticator for BasicAuth {
    fn authenticate(&self, request: &Request, response: &Response) -> Option<Request> {
        retry_with(request, response, &self.value)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::Method;

    fn challenge(status: u16) -> Response {
        Response::new(status, Headers::new(), Bytes::new())
    }

    fn request() -> Request {
        Request::builder(Method::Get, "https://api.example.com/me").build()
    }

    #[test]
    fn bearer_sets_authorization() {
        let mut headers = Headers::new();
        headers.append("Authorization", "stale");

        let provider = BearerAuth::new("t0k3n");
        provider.add_headers(&mut headers);
        provider.add_headers(&mut headers);

        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            vec![("Authorization", "Bearer t0k3n")]
        );
    }

    #[cfg(feature = "basic-auth")]
    #[test]
    fn basic_encodes_correctly() {
        // "user:pass" -> "dXNlcjpwYXNz"
        let mut headers = Headers::new();
        BasicAuth::new("user", "pass").add_headers(&mut headers);
        assert_eq!(headers.get("Authorization"), Some("Basic dXNlcjpwYXNz"));
    }

    #[test]
    fn authenticator_retries_once_with_credentials() {
        let auth = BearerAuth::new("t0k3n");

        let retry = auth
            .authenticate(&request(), &challenge(401))
            .expect("first challenge is answered");
        assert_eq!(retry.header("Authorization"), Some("Bearer t0k3n"));

        assert!(auth.authenticate(&retry, &challenge(401)).is_none());
    }

    #[test]
    fn authenticator_uses_proxy_header_for_407() {
        let retry = BearerAuth::new("p")
            .authenticate(&request(), &challenge(407))
            .expect("answered");
        assert_eq!(retry.header("Proxy-Authorization"), Some("Bearer p"));
        assert!(retry.header("Authorization").is_none());
    }

    #[test]
    fn closures_are_providers() {
        let provider: Arc<dyn AuthProvider> =
            Arc::new(|headers: &mut Headers| headers.insert("X-Key", "k"));

        let mut headers = Headers::new();
        provider.add_headers(&mut headers);
        assert_eq!(headers.get("X-Key"), Some("k"));
    }
}
