//! Request/response logging middleware.
//!
//! Events are emitted with `tracing` under the [`LOG_TARGET`] target, at
//! `INFO` (failures at `WARN`). What gets logged depends on the
//! [`LogLevel`]:
//!
//! | Level | Logged |
//! |---|---|
//! | `None` | nothing |
//! | `Basic` | request line, response status and elapsed time |
//! | `Headers` | `Basic` plus every request and response header |
//! | `Body` | `Headers` plus request and response bodies (non UTF-8 bodies are omitted) |

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use bytes::Bytes;
use derive_more::Display;
use tower::{Layer, Service, ServiceExt};
use tracing::{Instrument, info, info_span, warn};

use crate::{Error, Headers, Request, Response, Result};

/// Target of every event emitted by [`Logging`].
pub const LOG_TARGET: &str = "courier::http";

/// Verbosity of the logging middleware.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub enum LogLevel {
    /// No logging; the middleware is not installed.
    #[default]
    None,
    /// Request line, response status and timing.
    Basic,
    /// Basic plus headers.
    Headers,
    /// Headers plus bodies.
    Body,
}

/// Layer that logs requests and responses.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingLayer {
    level: LogLevel,
}

impl LoggingLayer {
    /// Creates a logging layer with the given verbosity.
    #[must_use]
    pub const fn new(level: LogLevel) -> Self {
        Self { level }
    }
}

impl<S> Layer<S> for LoggingLayer {
    type Service = Logging<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Logging {
            inner,
            level: self.level,
        }
    }
}

/// Service that logs requests and responses.
#[derive(Debug, Clone)]
pub struct Logging<S> {
    inner: S,
    level: LogLevel,
}

impl<S> Service<Request> for Logging<S>
where
    S: Service<Request, Response = Response, Error = Error> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let level = if request.log_headers() {
            self.level.max(LogLevel::Headers)
        } else {
            self.level
        };

        let inner = self.inner.clone();
        if level == LogLevel::None {
            return Box::pin(async move { inner.oneshot(request).await });
        }

        let method = request.method();
        let url = request
            .url()
            .map_or_else(|| "<no url>".to_string(), ToString::to_string);
        let span = info_span!(target: LOG_TARGET, "http_request", %method, %url);

        Box::pin(
            async move {
                info!(target: LOG_TARGET, "--> {method} {url}");
                if level >= LogLevel::Headers {
                    log_headers("-->", request.headers());
                }
                if level >= LogLevel::Body {
                    log_body("-->", request.body());
                }
                info!(target: LOG_TARGET, "--> END {method}");

                let start = Instant::now();
                let result = inner.oneshot(request).await;
                let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

                match &result {
                    Ok(response) => {
                        let status = response.status();
                        info!(target: LOG_TARGET, status, "<-- {status} {url} ({elapsed_ms:.2}ms)");
                        if level >= LogLevel::Headers {
                            log_headers("<--", response.headers());
                        }
                        if level >= LogLevel::Body {
                            log_body("<--", Some(response.body()));
                        }
                        info!(target: LOG_TARGET, "<-- END HTTP");
                    }
                    Err(err) => {
                        warn!(target: LOG_TARGET, error = %err, "<-- HTTP FAILED: {err} ({elapsed_ms:.2}ms)");
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}

fn log_headers(direction: &str, headers: &Headers) {
    for (name, value) in headers.iter() {
        info!(target: LOG_TARGET, "{direction} {name}: {value}");
    }
}

fn log_body(direction: &str, body: Option<&Bytes>) {
    let Some(body) = body.filter(|body| !body.is_empty()) else {
        info!(target: LOG_TARGET, "{direction} (empty body)");
        return;
    };

    match std::str::from_utf8(body) {
        Ok(text) => info!(target: LOG_TARGET, "{direction} {text}"),
        Err(_) => info!(target: LOG_TARGET, "{direction} (binary {}-byte body omitted)", body.len()),
    }
}
