//! The client façade.
//!
//! [`NetworkClient`] offers four ways to run a request:
//!
//! | Flavour | Methods | Outcome |
//! |---|---|---|
//! | raw | [`request`](NetworkClient::request), [`get`](NetworkClient::get), ... | `Result<Response>`, any status |
//! | typed | [`get_as`](NetworkClient::get_as), ... | `Result<T>`, non-2xx is an error |
//! | result-wrapped | [`get_with_result`](NetworkClient::get_with_result), ... | `Result<Response>`, any status |
//! | callback | [`enqueue`](NetworkClient::enqueue), [`get_async`](NetworkClient::get_async), ... | `on_success` or `on_failure` on a runtime worker |
//!
//! Every request method takes a configuration closure receiving a
//! [`RequestBuilder`] already seeded with the base URL, path, method and
//! codec. The closure may return the builder or a `Result` of it.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::runtime::Handle;
use tower::Layer;
use tower::util::BoxCloneService;
use tracing::debug;

use crate::config::{BoxLayer, ClientConfig, ClientConfigBuilder};
use crate::middleware::{AuthLayer, LogLevel, LoggingLayer};
use crate::transport::{BoxedService, SyncService, Transport};
use crate::websocket::WebSocketSessionBuilder;
use crate::{
    Codec, Error, IntoRequestBuilder, Method, Request, RequestBuilder, Response, Result,
};

/// HTTP client holding a composed middleware stack over the transport.
///
/// Cloning is cheap; clones share the connection pool, the cache and every
/// configured capability.
#[derive(Clone)]
pub struct NetworkClient {
    service: SyncService,
    config: Arc<ClientConfig>,
}

impl fmt::Debug for NetworkClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl NetworkClient {
    /// Creates a client builder.
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    pub(crate) fn from_config(config: ClientConfig, interceptors: Vec<BoxLayer>) -> Self {
        let mut service: BoxedService = BoxCloneService::new(Transport::new(&config));

        if let Some(provider) = &config.auth_provider {
            service = BoxCloneService::new(AuthLayer::new(Arc::clone(provider)).layer(service));
        }

        if config.log_level != LogLevel::None {
            service = BoxCloneService::new(LoggingLayer::new(config.log_level).layer(service));
        }

        // Wrapping from the last registered, so the first one ends up outermost.
        for interceptor in interceptors.iter().rev() {
            service = interceptor(service);
        }

        Self {
            service: SyncService::new(service),
            config: Arc::new(config),
        }
    }

    /// Client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Bound codec, if any.
    #[must_use]
    pub fn codec(&self) -> Option<&dyn Codec> {
        self.config.codec.as_deref()
    }

    /// Builds the request for `method` on `path`.
    ///
    /// The client's auth provider runs on the result unless the closure set
    /// a per-request one.
    ///
    /// # Errors
    ///
    /// Returns the error of a failed configuration step, such as
    /// [`RequestBuilder::encode_body`].
    pub fn prepare<F, B>(&self, method: Method, path: &str, configure: F) -> Result<Request>
    where
        F: FnOnce(RequestBuilder) -> B,
        B: IntoRequestBuilder,
    {
        let mut builder = RequestBuilder::new().method(method).url(path);
        if let Some(base_url) = &self.config.base_url {
            builder = builder.base_url(base_url.as_str());
        }
        if let Some(codec) = &self.config.codec {
            builder = builder.codec(Arc::clone(codec));
        }

        let mut request = configure(builder).into_request_builder()?.build();
        if !request.has_auth_override()
            && let Some(provider) = &self.config.auth_provider
        {
            provider.add_headers(request.headers_mut());
        }
        Ok(request)
    }

    /// Runs an already built request through the middleware stack.
    pub async fn execute(&self, request: Request) -> Result<Response> {
        self.service.call(request).await
    }

    /// Builds and runs a request, returning the raw response whatever its
    /// status.
    ///
    /// Transport failures (refused connection, timeout, TLS) are returned
    /// as is; nothing is retried.
    pub async fn request<F, B>(&self, method: Method, path: &str, configure: F) -> Result<Response>
    where
        F: FnOnce(RequestBuilder) -> B,
        B: IntoRequestBuilder,
    {
        let request = self.prepare(method, path, configure)?;
        self.execute(request).await
    }

    /// `GET` request.
    pub async fn get<F, B>(&self, path: &str, configure: F) -> Result<Response>
    where
        F: FnOnce(RequestBuilder) -> B,
        B: IntoRequestBuilder,
    {
        self.request(Method::Get, path, configure).await
    }

    /// `POST` request.
    pub async fn post<F, B>(&self, path: &str, configure: F) -> Result<Response>
    where
        F: FnOnce(RequestBuilder) -> B,
        B: IntoRequestBuilder,
    {
        self.request(Method::Post, path, configure).await
    }

    /// `PUT` request.
    pub async fn put<F, B>(&self, path: &str, configure: F) -> Result<Response>
    where
        F: FnOnce(RequestBuilder) -> B,
        B: IntoRequestBuilder,
    {
        self.request(Method::Put, path, configure).await
    }

    /// `DELETE` request.
    pub async fn delete<F, B>(&self, path: &str, configure: F) -> Result<Response>
    where
        F: FnOnce(RequestBuilder) -> B,
        B: IntoRequestBuilder,
    {
        self.request(Method::Delete, path, configure).await
    }

    /// `HEAD` request.
    pub async fn head<F, B>(&self, path: &str, configure: F) -> Result<Response>
    where
        F: FnOnce(RequestBuilder) -> B,
        B: IntoRequestBuilder,
    {
        self.request(Method::Head, path, configure).await
    }

    /// `OPTIONS` request.
    pub async fn options<F, B>(&self, path: &str, configure: F) -> Result<Response>
    where
        F: FnOnce(RequestBuilder) -> B,
        B: IntoRequestBuilder,
    {
        self.request(Method::Options, path, configure).await
    }

    /// `PATCH` request.
    pub async fn patch<F, B>(&self, path: &str, configure: F) -> Result<Response>
    where
        F: FnOnce(RequestBuilder) -> B,
        B: IntoRequestBuilder,
    {
        self.request(Method::Patch, path, configure).await
    }

    /// `TRACE` request.
    pub async fn trace<F, B>(&self, path: &str, configure: F) -> Result<Response>
    where
        F: FnOnce(RequestBuilder) -> B,
        B: IntoRequestBuilder,
    {
        self.request(Method::Trace, path, configure).await
    }

    /// `CONNECT` request.
    pub async fn connect<F, B>(&self, path: &str, configure: F) -> Result<Response>
    where
        F: FnOnce(RequestBuilder) -> B,
        B: IntoRequestBuilder,
    {
        self.request(Method::Connect, path, configure).await
    }

    // ========================================================================
    // Typed dispatch
    // ========================================================================

    /// Runs a request and decodes a 2xx body into `T` with the bound codec.
    ///
    /// # Errors
    ///
    /// In this order: transport errors, [`Error::Http`] for a non-2xx status,
    /// [`Error::EmptyBody`], [`Error::CodecNotConfigured`], then
    /// [`Error::Decode`].
    pub async fn request_as<T, F, B>(&self, method: Method, path: &str, configure: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnOnce(RequestBuilder) -> B,
        B: IntoRequestBuilder,
    {
        let response = self.request(method, path, configure).await?;
        response.decode(self.codec())
    }

    /// Typed `GET`.
    pub async fn get_as<T, F, B>(&self, path: &str, configure: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnOnce(RequestBuilder) -> B,
        B: IntoRequestBuilder,
    {
        self.request_as(Method::Get, path, configure).await
    }

    /// Typed `POST`.
    pub async fn post_as<T, F, B>(&self, path: &str, configure: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnOnce(RequestBuilder) -> B,
        B: IntoRequestBuilder,
    {
        self.request_as(Method::Post, path, configure).await
    }

    /// Typed `PUT`.
    pub async fn put_as<T, F, B>(&self, path: &str, configure: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnOnce(RequestBuilder) -> B,
        B: IntoRequestBuilder,
    {
        self.request_as(Method::Put, path, configure).await
    }

    /// Typed `DELETE`.
    pub async fn delete_as<T, F, B>(&self, path: &str, configure: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnOnce(RequestBuilder) -> B,
        B: IntoRequestBuilder,
    {
        self.request_as(Method::Delete, path, configure).await
    }

    /// Typed `PATCH`.
    pub async fn patch_as<T, F, B>(&self, path: &str, configure: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnOnce(RequestBuilder) -> B,
        B: IntoRequestBuilder,
    {
        self.request_as(Method::Patch, path, configure).await
    }

    // ========================================================================
    // Result-wrapped dispatch
    // ========================================================================

    /// `GET` whose result is `Ok` whenever the exchange completed, a `404`
    /// included. Only transport failures are `Err`.
    pub async fn get_with_result<F, B>(&self, path: &str, configure: F) -> Result<Response>
    where
        F: FnOnce(RequestBuilder) -> B,
        B: IntoRequestBuilder,
    {
        self.request(Method::Get, path, configure).await
    }

    /// `POST`, see [`NetworkClient::get_with_result`].
    pub async fn post_with_result<F, B>(&self, path: &str, configure: F) -> Result<Response>
    where
        F: FnOnce(RequestBuilder) -> B,
        B: IntoRequestBuilder,
    {
        self.request(Method::Post, path, configure).await
    }

    /// `PUT`, see [`NetworkClient::get_with_result`].
    pub async fn put_with_result<F, B>(&self, path: &str, configure: F) -> Result<Response>
    where
        F: FnOnce(RequestBuilder) -> B,
        B: IntoRequestBuilder,
    {
        self.request(Method::Put, path, configure).await
    }

    /// `DELETE`, see [`NetworkClient::get_with_result`].
    pub async fn delete_with_result<F, B>(&self, path: &str, configure: F) -> Result<Response>
    where
        F: FnOnce(RequestBuilder) -> B,
        B: IntoRequestBuilder,
    {
        self.request(Method::Delete, path, configure).await
    }

    // ========================================================================
    // Callback dispatch
    // ========================================================================

    /// Runs a request on the current tokio runtime and reports the outcome
    /// through exactly one of the callbacks, from a runtime worker.
    ///
    /// The request is built on the caller's thread; a build error is still
    /// delivered from the runtime. Outside a runtime there is no thread to
    /// deliver from, so `on_failure` runs right away with
    /// [`Error::NoRuntime`].
    pub fn enqueue<F, B, S, E>(
        &self,
        method: Method,
        path: &str,
        configure: F,
        on_success: S,
        on_failure: E,
    ) where
        F: FnOnce(RequestBuilder) -> B,
        B: IntoRequestBuilder,
        S: FnOnce(Response) + Send + 'static,
        E: FnOnce(Error) + Send + 'static,
    {
        let Ok(runtime) = Handle::try_current() else {
            on_failure(Error::NoRuntime);
            return;
        };
        let request = match self.prepare(method, path, configure) {
            Ok(request) => request,
            Err(err) => {
                debug!(%method, path, %err, "request could not be built");
                runtime.spawn(async move { on_failure(err) });
                return;
            }
        };

        debug!(%method, path, "enqueuing request");
        let call = self.service.call(request);
        runtime.spawn(async move {
            match call.await {
                Ok(response) => on_success(response),
                Err(err) => on_failure(err),
            }
        });
    }

    /// Callback `GET`, see [`NetworkClient::enqueue`].
    pub fn get_async<F, B, S, E>(&self, path: &str, configure: F, on_success: S, on_failure: E)
    where
        F: FnOnce(RequestBuilder) -> B,
        B: IntoRequestBuilder,
        S: FnOnce(Response) + Send + 'static,
        E: FnOnce(Error) + Send + 'static,
    {
        self.enqueue(Method::Get, path, configure, on_success, on_failure);
    }

    /// Callback `POST`, see [`NetworkClient::enqueue`].
    pub fn post_async<F, B, S, E>(&self, path: &str, configure: F, on_success: S, on_failure: E)
    where
        F: FnOnce(RequestBuilder) -> B,
        B: IntoRequestBuilder,
        S: FnOnce(Response) + Send + 'static,
        E: FnOnce(Error) + Send + 'static,
    {
        self.enqueue(Method::Post, path, configure, on_success, on_failure);
    }

    /// Callback `PUT`, see [`NetworkClient::enqueue`].
    pub fn put_async<F, B, S, E>(&self, path: &str, configure: F, on_success: S, on_failure: E)
    where
        F: FnOnce(RequestBuilder) -> B,
        B: IntoRequestBuilder,
        S: FnOnce(Response) + Send + 'static,
        E: FnOnce(Error) + Send + 'static,
    {
        self.enqueue(Method::Put, path, configure, on_success, on_failure);
    }

    /// Callback `DELETE`, see [`NetworkClient::enqueue`].
    pub fn delete_async<F, B, S, E>(&self, path: &str, configure: F, on_success: S, on_failure: E)
    where
        F: FnOnce(RequestBuilder) -> B,
        B: IntoRequestBuilder,
        S: FnOnce(Response) + Send + 'static,
        E: FnOnce(Error) + Send + 'static,
    {
        self.enqueue(Method::Delete, path, configure, on_success, on_failure);
    }

    /// Callback `HEAD`, see [`NetworkClient::enqueue`].
    pub fn head_async<F, B, S, E>(&self, path: &str, configure: F, on_success: S, on_failure: E)
    where
        F: FnOnce(RequestBuilder) -> B,
        B: IntoRequestBuilder,
        S: FnOnce(Response) + Send + 'static,
        E: FnOnce(Error) + Send + 'static,
    {
        self.enqueue(Method::Head, path, configure, on_success, on_failure);
    }

    /// Callback `OPTIONS`, see [`NetworkClient::enqueue`].
    pub fn options_async<F, B, S, E>(&self, path: &str, configure: F, on_success: S, on_failure: E)
    where
        F: FnOnce(RequestBuilder) -> B,
        B: IntoRequestBuilder,
        S: FnOnce(Response) + Send + 'static,
        E: FnOnce(Error) + Send + 'static,
    {
        self.enqueue(Method::Options, path, configure, on_success, on_failure);
    }

    /// Callback `PATCH`, see [`NetworkClient::enqueue`].
    pub fn patch_async<F, B, S, E>(&self, path: &str, configure: F, on_success: S, on_failure: E)
    where
        F: FnOnce(RequestBuilder) -> B,
        B: IntoRequestBuilder,
        S: FnOnce(Response) + Send + 'static,
        E: FnOnce(Error) + Send + 'static,
    {
        self.enqueue(Method::Patch, path, configure, on_success, on_failure);
    }

    // ========================================================================
    // WebSocket
    // ========================================================================

    /// Starts describing a WebSocket session.
    #[must_use]
    pub fn websocket(&self) -> WebSocketSessionBuilder {
        WebSocketSessionBuilder::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BearerAuth, Headers};

    #[test]
    fn client_is_clone_and_debug() {
        let client = NetworkClient::builder().build();
        let cloned = client.clone();
        assert!(format!("{cloned:?}").contains("NetworkClient"));
    }

    #[test]
    fn prepare_seeds_base_url_and_method() {
        let client = NetworkClient::builder()
            .base_url("https://api.example.com")
            .build();

        let request = client
            .prepare(Method::Delete, "/facts/1", |builder| builder.query("hard", true))
            .expect("request");
        assert_eq!(request.method(), Method::Delete);
        assert_eq!(
            request.url().map(url::Url::as_str),
            Some("https://api.example.com/facts/1?hard=true")
        );
    }

    #[test]
    fn prepare_applies_default_auth_unless_overridden() {
        let client = NetworkClient::builder()
            .auth_provider(Arc::new(BearerAuth::new("client")))
            .build();

        let request = client
            .prepare(Method::Get, "https://example.com", |builder| builder)
            .expect("request");
        assert_eq!(request.header("Authorization"), Some("Bearer client"));

        let request = client
            .prepare(Method::Get, "https://example.com", |builder| {
                builder.auth(Arc::new(|headers: &mut Headers| {
                    headers.insert("Authorization", "Token mine");
                }))
            })
            .expect("request");
        assert_eq!(request.header("Authorization"), Some("Token mine"));
    }

    #[test]
    fn prepare_reports_configuration_errors() {
        let client = NetworkClient::builder().build();
        let err = client
            .prepare(Method::Post, "https://example.com", |builder| {
                builder.encode_body(&[1, 2, 3])
            })
            .expect_err("no codec");
        assert!(matches!(err, Error::CodecNotConfigured));
    }

    #[test]
    fn enqueue_outside_runtime_fails_fast() {
        let client = NetworkClient::builder().build();
        let (tx, rx) = std::sync::mpsc::channel();

        client.get_async(
            "https://example.com",
            |builder| builder,
            |_| panic!("no runtime, no success"),
            move |err| tx.send(err).expect("send"),
        );

        let err = rx.recv().expect("failure reported");
        assert!(matches!(err, Error::NoRuntime));
    }
}
