//! The transport engine.
//!
//! Two services live here:
//!
//! - [`HyperTransport`] performs one exchange over the pooled hyper-util
//!   client and buffers the response body;
//! - [`Transport`] wraps it (through the response cache when one is
//!   configured), enforces the per-request deadline and answers `401`/`407`
//!   challenges with the configured [`Authenticator`].
//!
//! Challenge follow-ups happen here rather than in the middleware chain, so
//! interceptors and logging see one request and one final response.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::{Client, connect::HttpConnector};
use hyper_util::rt::TokioExecutor;
use tower::util::BoxCloneService;
use tower::{Layer, ServiceExt};
use tower_service::Service;
use tracing::debug;

use crate::config::ClientConfig;
use crate::connector::https_connector;
use crate::middleware::CacheLayer;
use crate::{Authenticator, Error, Headers, Request, Response, Result};

/// Type-erased service every middleware layer wraps.
pub type BoxedService = BoxCloneService<Request, Response, Error>;

/// Future returned by the client's services.
pub type ServiceFuture = Pin<Box<dyn Future<Output = Result<Response>> + Send + 'static>>;

/// How many times a single call may be re-issued by the [`Authenticator`].
pub const MAX_AUTH_FOLLOW_UPS: usize = 3;

/// One HTTP exchange over hyper-util's pooled client.
#[derive(Clone)]
pub struct HyperTransport {
    inner: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl HyperTransport {
    /// Creates the transport from timeouts and pool settings.
    #[must_use]
    pub fn new(config: &ClientConfig) -> Self {
        let connector = https_connector(config.connect_timeout);

        let inner = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(config.pool.keep_alive)
            .pool_max_idle_per_host(config.pool.max_idle_per_host)
            .build(connector);

        Self {
            inner,
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
        }
    }

    fn build_hyper_request(request: Request) -> Result<http::Request<Full<Bytes>>> {
        let (method, url, headers, body) = request.into_parts();
        let url = url.ok_or_else(|| Error::malformed_request("request has no valid URL"))?;

        let mut builder = http::Request::builder()
            .method(http::Method::from(method))
            .uri(url.as_str());

        for (name, value) in headers.iter() {
            builder = builder.header(name, value);
        }

        builder
            .body(body.map_or_else(Full::default, Full::new))
            .map_err(|e| Error::invalid_request(e.to_string()))
    }

    fn extract_headers(headers: &http::HeaderMap) -> Headers {
        headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str(), value))
            })
            .collect()
    }

    async fn execute(&self, request: Request) -> Result<Response> {
        let hyper_request = Self::build_hyper_request(request)?;

        // Sending the request and waiting for the status line.
        let response = tokio::time::timeout(
            self.write_timeout + self.read_timeout,
            self.inner.request(hyper_request),
        )
        .await
        .map_err(|_| Error::Timeout)?
        .map_err(map_hyper_error)?;

        let status = response.status().as_u16();
        let headers = Self::extract_headers(response.headers());

        let body = tokio::time::timeout(self.read_timeout, response.into_body().collect())
            .await
            .map_err(|_| Error::Timeout)?
            .map_err(|e| Error::connection(e.to_string()))?
            .to_bytes();

        Ok(Response::new(status, headers, body))
    }
}

impl Service<Request> for HyperTransport {
    type Response = Response;
    type Error = Error;
    type Future = ServiceFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let transport = self.clone();
        Box::pin(async move { transport.execute(request).await })
    }
}

#[allow(clippy::needless_pass_by_value)]
fn map_hyper_error(err: hyper_util::client::legacy::Error) -> Error {
    let mut messages = vec![err.to_string()];
    let mut timed_out = false;

    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            timed_out |= io.kind() == std::io::ErrorKind::TimedOut;
        }
        messages.push(cause.to_string());
        source = std::error::Error::source(cause);
    }

    if timed_out {
        return Error::Timeout;
    }

    let message = messages.join(": ");
    let lower = message.to_ascii_lowercase();
    if lower.contains("tls") || lower.contains("certificate") || lower.contains("handshake") {
        return Error::tls(message);
    }

    Error::connection(message)
}

/// Innermost service of every client.
///
/// Holds the raw transport (behind the cache layer when configured) and the
/// challenge-response [`Authenticator`].
#[derive(Clone)]
pub struct Transport {
    inner: BoxedService,
    authenticator: Option<Arc<dyn Authenticator>>,
}

impl Transport {
    /// Builds the transport described by `config`.
    #[must_use]
    pub fn new(config: &ClientConfig) -> Self {
        let hyper = HyperTransport::new(config);
        let inner = match &config.cache {
            Some(cache) => BoxCloneService::new(CacheLayer::new(cache.clone()).layer(hyper)),
            None => BoxCloneService::new(hyper),
        };

        Self {
            inner,
            authenticator: config.authenticator.clone(),
        }
    }

    async fn execute(
        mut inner: BoxedService,
        authenticator: Option<Arc<dyn Authenticator>>,
        request: Request,
    ) -> Result<Response> {
        let Some(authenticator) = authenticator else {
            return inner.ready().await?.call(request).await;
        };

        let mut request = request;
        let mut follow_ups = 0;
        loop {
            let response = inner.ready().await?.call(request.clone()).await?;
            if !matches!(response.status(), 401 | 407) || follow_ups == MAX_AUTH_FOLLOW_UPS {
                return Ok(response);
            }

            let Some(next) = authenticator.authenticate(&request, &response) else {
                return Ok(response);
            };
            follow_ups += 1;
            debug!(
                status = response.status(),
                follow_ups, "re-issuing request after authentication challenge"
            );
            request = next;
        }
    }
}

impl Service<Request> for Transport {
    type Response = Response;
    type Error = Error;
    type Future = ServiceFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let inner = self.inner.clone();
        let authenticator = self.authenticator.clone();
        let deadline = request.timeout();

        Box::pin(async move {
            let exchange = Self::execute(inner, authenticator, request);
            match deadline {
                Some(deadline) => tokio::time::timeout(deadline, exchange)
                    .await
                    .map_err(|_| Error::Timeout)?,
                None => exchange.await,
            }
        })
    }
}

/// Thread-safe handle on the composed middleware stack.
///
/// `BoxCloneService` is not `Sync`; the lock is only held to clone it.
#[derive(Clone)]
pub(crate) struct SyncService {
    inner: Arc<Mutex<BoxedService>>,
}

impl SyncService {
    pub(crate) fn new(service: BoxedService) -> Self {
        Self {
            inner: Arc::new(Mutex::new(service)),
        }
    }

    pub(crate) fn call(&self, request: Request) -> ServiceFuture {
        let service = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        Box::pin(async move { service.oneshot(request).await })
    }
}
