//! Credential injection middleware.

use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};

use tower::{Layer, Service};

use crate::{AuthProvider, Error, Request, Response, Result};

/// Layer that runs an [`AuthProvider`] on every request.
///
/// It also runs on requests that carry their own provider (see
/// [`RequestBuilder::auth`](crate::RequestBuilder::auth)), so headers the
/// client provider controls win over the per-request ones.
#[derive(Clone)]
pub struct AuthLayer {
    provider: Arc<dyn AuthProvider>,
}

impl AuthLayer {
    /// Creates the layer.
    #[must_use]
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        Self { provider }
    }
}

impl fmt::Debug for AuthLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthLayer").finish_non_exhaustive()
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = Auth<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Auth {
            inner,
            provider: Arc::clone(&self.provider),
        }
    }
}

/// Service adding credentials to requests.
#[derive(Clone)]
pub struct Auth<S> {
    inner: S,
    provider: Arc<dyn AuthProvider>,
}

impl<S> Service<Request> for Auth<S>
where
    S: Service<Request, Response = Response, Error = Error>,
{
    type Response = Response;
    type Error = Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request) -> Self::Future {
        self.provider.add_headers(request.headers_mut());
        self.inner.call(request)
    }
}
