//! Client configuration.
//!
//! [`ClientConfigBuilder`] collects every client-wide setting and turns it
//! into a [`NetworkClient`] in one step. The resulting [`ClientConfig`] is
//! immutable and owned by the client.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tower::Layer;
use tower::util::BoxCloneService;
use tower_service::Service;

use crate::middleware::LogLevel;
use crate::transport::BoxedService;
use crate::{AuthProvider, Authenticator, Codec, Error, NetworkClient, Request, Response};

/// Default connect, read and write timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cache size when only a directory is given.
pub const DEFAULT_CACHE_SIZE: u64 = 10 * 1024 * 1024;

/// Connection pool settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Idle connections kept per host.
    pub max_idle_per_host: usize,
    /// How long an idle connection is kept.
    pub keep_alive: Duration,
}

impl PoolConfig {
    /// Creates pool settings.
    #[must_use]
    pub const fn new(max_idle_per_host: usize, keep_alive: Duration) -> Self {
        Self {
            max_idle_per_host,
            keep_alive,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(5 * 60))
    }
}

/// Response cache settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Directory holding the entries; created on first use.
    pub directory: PathBuf,
    /// Upper bound on the total size of cached bodies.
    pub max_bytes: u64,
}

/// Immutable client settings.
#[derive(Clone)]
pub struct ClientConfig {
    /// Prefix of every request URL.
    pub base_url: Option<String>,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Timeout for reading the response.
    pub read_timeout: Duration,
    /// Timeout for sending the request.
    pub write_timeout: Duration,
    /// Connection pool settings.
    pub pool: PoolConfig,
    /// Response cache, if enabled.
    pub cache: Option<CacheConfig>,
    /// Logging middleware verbosity.
    pub log_level: LogLevel,
    /// Credentials added to every request.
    pub auth_provider: Option<Arc<dyn AuthProvider>>,
    /// Answers `401`/`407` challenges.
    pub authenticator: Option<Arc<dyn Authenticator>>,
    /// Codec for typed dispatch and encoded bodies.
    pub codec: Option<Arc<dyn Codec>>,
    /// Number of user interceptors installed.
    pub interceptor_count: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            connect_timeout: DEFAULT_TIMEOUT,
            read_timeout: DEFAULT_TIMEOUT,
            write_timeout: DEFAULT_TIMEOUT,
            pool: PoolConfig::default(),
            cache: None,
            log_level: LogLevel::None,
            auth_provider: None,
            authenticator: None,
            codec: None,
            interceptor_count: 0,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("write_timeout", &self.write_timeout)
            .field("pool", &self.pool)
            .field("cache", &self.cache)
            .field("log_level", &self.log_level)
            .field("auth_provider", &self.auth_provider.is_some())
            .field("authenticator", &self.authenticator.is_some())
            .field("codec", &self.codec.as_ref().map(|codec| codec.media_type()))
            .field("interceptor_count", &self.interceptor_count)
            .finish()
    }
}

impl ClientConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

pub(crate) type BoxLayer = Arc<dyn Fn(BoxedService) -> BoxedService + Send + Sync>;

/// Builder for a [`NetworkClient`].
///
/// ```
/// use std::time::Duration;
///
/// use courier::{ClientConfigBuilder, LogLevel};
///
/// let client = ClientConfigBuilder::default()
///     .base_url("https://catfact.ninja")
///     .connect_timeout(Duration::from_secs(5))
///     .log_level(LogLevel::Basic)
///     .build();
///
/// assert_eq!(client.config().base_url.as_deref(), Some("https://catfact.ninja"));
/// ```
#[derive(Default)]
pub struct ClientConfigBuilder {
    base_url: Option<String>,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    pool: Option<PoolConfig>,
    cache: Option<CacheConfig>,
    log_level: Option<LogLevel>,
    auth_provider: Option<Arc<dyn AuthProvider>>,
    authenticator: Option<Arc<dyn Authenticator>>,
    codec: Option<Arc<dyn Codec>>,
    interceptors: Vec<BoxLayer>,
}

impl fmt::Debug for ClientConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfigBuilder")
            .field("base_url", &self.base_url)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("write_timeout", &self.write_timeout)
            .field("pool", &self.pool)
            .field("cache", &self.cache)
            .field("log_level", &self.log_level)
            .field("auth_provider", &self.auth_provider.is_some())
            .field("authenticator", &self.authenticator.is_some())
            .field("codec", &self.codec.is_some())
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}

impl ClientConfigBuilder {
    /// Sets the base URL every request path is appended to.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the TCP connect timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the read timeout.
    #[must_use]
    pub const fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Sets the write timeout.
    #[must_use]
    pub const fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }

    /// Sets the connection pool.
    #[must_use]
    pub const fn connection_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Enables the response cache with the default size.
    #[must_use]
    pub fn cache(self, directory: impl Into<PathBuf>) -> Self {
        self.cache_with_size(directory, DEFAULT_CACHE_SIZE)
    }

    /// Enables the response cache.
    #[must_use]
    pub fn cache_with_size(mut self, directory: impl Into<PathBuf>, max_bytes: u64) -> Self {
        self.cache = Some(CacheConfig {
            directory: directory.into(),
            max_bytes,
        });
        self
    }

    /// Adds an interceptor.
    ///
    /// Interceptors wrap the rest of the stack in registration order: the
    /// first one registered sees each request first and each response last.
    ///
    /// ```
    /// use courier::{ClientConfigBuilder, Request};
    /// use courier::tower::util::MapRequestLayer;
    ///
    /// let client = ClientConfigBuilder::default()
    ///     .interceptor(MapRequestLayer::new(|mut request: Request| {
    ///         request.headers_mut().insert("X-Client", "courier");
    ///         request
    ///     }))
    ///     .build();
    /// assert_eq!(client.config().interceptor_count, 1);
    /// ```
    #[must_use]
    pub fn interceptor<L>(mut self, layer: L) -> Self
    where
        L: Layer<BoxedService> + Send + Sync + 'static,
        L::Service: Service<Request, Response = Response, Error = Error> + Clone + Send + 'static,
        <L::Service as Service<Request>>::Future: Send,
    {
        self.interceptors
            .push(Arc::new(move |service| BoxCloneService::new(layer.layer(service))));
        self
    }

    /// Sets the logging middleware verbosity.
    #[must_use]
    pub const fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    /// Sets the challenge-response authenticator.
    #[must_use]
    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// Sets the provider adding credentials to every request.
    #[must_use]
    pub fn auth_provider(mut self, provider: Arc<dyn AuthProvider>) -> Self {
        self.auth_provider = Some(provider);
        self
    }

    /// Sets the codec.
    #[must_use]
    pub fn serializer(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Builds the client. No I/O happens here.
    #[must_use]
    pub fn build(self) -> NetworkClient {
        let defaults = ClientConfig::default();
        let config = ClientConfig {
            base_url: self.base_url,
            connect_timeout: self.connect_timeout.unwrap_or(defaults.connect_timeout),
            read_timeout: self.read_timeout.unwrap_or(defaults.read_timeout),
            write_timeout: self.write_timeout.unwrap_or(defaults.write_timeout),
            pool: self.pool.unwrap_or(defaults.pool),
            cache: self.cache,
            log_level: self.log_level.unwrap_or(defaults.log_level),
            auth_provider: self.auth_provider,
            authenticator: self.authenticator,
            codec: self.codec,
            interceptor_count: self.interceptors.len(),
        };

        NetworkClient::from_config(config, self.interceptors)
    }
}
