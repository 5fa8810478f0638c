//! WebSocket sessions.
//!
//! [`WebSocketSessionBuilder`] collects extra handshake headers and event
//! callbacks, then [`build`](WebSocketSessionBuilder::build) resolves the
//! URL through the client's request logic and hands the handshake to
//! tokio-tungstenite on a spawned task. The returned [`WebSocketSession`]
//! is usable right away: frames sent before the handshake completes are
//! queued.
//!
//! Every session ends with exactly one terminal callback, `on_closed` after
//! a close handshake or `on_failure` otherwise. `on_closing` fires when the
//! peer's close frame arrives and is always followed by `on_closed`: from
//! that point the session refuses frames and ignores `cancel`.

use std::fmt;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::{
    Request as HandshakeRequest, Response as HandshakeResponse,
};
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tracing::{debug, warn};
use url::Url;

use crate::{Error, Headers, Method, NetworkClient, Request, Response, Result};

/// Close code sent when a session is cancelled.
const GOING_AWAY: u16 = 1001;

/// Close code reported when the peer's close frame carried none.
const NO_STATUS_RECEIVED: u16 = 1005;

type OpenCallback = Box<dyn FnOnce(Response) + Send>;
type TextCallback = Box<dyn FnMut(String) + Send>;
type BinaryCallback = Box<dyn FnMut(Bytes) + Send>;
type CloseCallback = Box<dyn FnOnce(u16, String) + Send>;
type FailureCallback = Box<dyn FnOnce(Error) + Send>;

/// Event callbacks of one session. Terminal events consume the listener.
#[derive(Default)]
struct Listener {
    on_open: Option<OpenCallback>,
    on_message: Option<TextCallback>,
    on_binary: Option<BinaryCallback>,
    on_closing: Option<CloseCallback>,
    on_closed: Option<CloseCallback>,
    on_failure: Option<FailureCallback>,
}

impl Listener {
    fn opened(&mut self, response: Response) {
        if let Some(callback) = self.on_open.take() {
            callback(response);
        }
    }

    fn text(&mut self, text: String) {
        if let Some(callback) = &mut self.on_message {
            callback(text);
        }
    }

    fn binary(&mut self, bytes: Bytes) {
        if let Some(callback) = &mut self.on_binary {
            callback(bytes);
        }
    }

    fn closing(&mut self, code: u16, reason: String) {
        if let Some(callback) = self.on_closing.take() {
            callback(code, reason);
        }
    }

    fn closed(self, code: u16, reason: String) {
        debug!(code, %reason, "websocket closed");
        if let Some(callback) = self.on_closed {
            callback(code, reason);
        }
    }

    fn failed(self, err: Error) {
        warn!(%err, "websocket failed");
        if let Some(callback) = self.on_failure {
            callback(err);
        }
    }
}

#[derive(Debug)]
enum Command {
    Text(String),
    Binary(Bytes),
    Close(u16, String),
    Cancel,
}

/// Builder for a [`WebSocketSession`], obtained from
/// [`NetworkClient::websocket`].
pub struct WebSocketSessionBuilder {
    client: NetworkClient,
    headers: Headers,
    listener: Listener,
}

impl fmt::Debug for WebSocketSessionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketSessionBuilder")
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl WebSocketSessionBuilder {
    pub(crate) fn new(client: NetworkClient) -> Self {
        Self {
            client,
            headers: Headers::new(),
            listener: Listener::default(),
        }
    }

    /// Adds a handshake header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Called once the handshake succeeded, with the `101` response.
    #[must_use]
    pub fn on_open(mut self, callback: impl FnOnce(Response) + Send + 'static) -> Self {
        self.listener.on_open = Some(Box::new(callback));
        self
    }

    /// Called for every text frame.
    #[must_use]
    pub fn on_message(mut self, callback: impl FnMut(String) + Send + 'static) -> Self {
        self.listener.on_message = Some(Box::new(callback));
        self
    }

    /// Called for every binary frame.
    #[must_use]
    pub fn on_binary(mut self, callback: impl FnMut(Bytes) + Send + 'static) -> Self {
        self.listener.on_binary = Some(Box::new(callback));
        self
    }

    /// Called when the peer's close frame arrives.
    #[must_use]
    pub fn on_closing(mut self, callback: impl FnOnce(u16, String) + Send + 'static) -> Self {
        self.listener.on_closing = Some(Box::new(callback));
        self
    }

    /// Called when the connection ended after a close handshake.
    #[must_use]
    pub fn on_closed(mut self, callback: impl FnOnce(u16, String) + Send + 'static) -> Self {
        self.listener.on_closed = Some(Box::new(callback));
        self
    }

    /// Called when the session ended abnormally.
    #[must_use]
    pub fn on_failure(mut self, callback: impl FnOnce(Error) + Send + 'static) -> Self {
        self.listener.on_failure = Some(Box::new(callback));
        self
    }

    /// Starts the session on `path`.
    ///
    /// The URL is resolved like a `GET` request of the client, so the base
    /// URL and the client's auth provider apply; `http` becomes `ws` and
    /// `https` becomes `wss`. Every failure, including an unusable URL, is
    /// reported through `on_failure`. Outside a tokio runtime the failure is
    /// [`Error::NoRuntime`] and fires before this returns.
    #[must_use]
    pub fn build(self, path: &str) -> WebSocketSession {
        let Self {
            client,
            headers,
            listener,
        } = self;

        let target = client
            .prepare(Method::Get, path, |builder| builder.headers(headers))
            .and_then(handshake_target);

        let (commands, receiver) = mpsc::unbounded_channel();
        let session = WebSocketSession {
            url: target.as_ref().ok().map(|(url, _)| url.clone()),
            commands,
        };

        match Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(run(target, receiver, listener));
            }
            Err(_) => listener.failed(Error::NoRuntime),
        }
        session
    }
}

/// Handle on a live WebSocket session.
///
/// Clones drive the same connection.
#[derive(Debug, Clone)]
pub struct WebSocketSession {
    url: Option<Url>,
    commands: mpsc::UnboundedSender<Command>,
}

impl WebSocketSession {
    /// Resolved `ws`/`wss` URL, `None` if the path could not be resolved.
    #[must_use]
    pub const fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// Queues a text frame. Returns `false` once the session has ended.
    pub fn send(&self, text: impl Into<String>) -> bool {
        self.commands.send(Command::Text(text.into())).is_ok()
    }

    /// Queues a binary frame. Returns `false` once the session has ended.
    pub fn send_binary(&self, bytes: impl Into<Bytes>) -> bool {
        self.commands.send(Command::Binary(bytes.into())).is_ok()
    }

    /// Starts a graceful close handshake.
    ///
    /// Returns `false` once the session has ended.
    pub fn close(&self, code: u16, reason: impl Into<String>) -> bool {
        self.commands
            .send(Command::Close(code, reason.into()))
            .is_ok()
    }

    /// Drops the connection; `on_failure` fires with a cancellation error
    /// unless the session already ended or the peer started closing.
    pub fn cancel(&self) {
        let _ = self.commands.send(Command::Cancel);
    }
}

fn handshake_target(request: Request) -> Result<(Url, HandshakeRequest)> {
    let Some(mut url) = request.url().cloned() else {
        return Err(Error::malformed_request("WebSocket request has no valid URL"));
    };

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(Error::invalid_request(format!(
                "unsupported WebSocket scheme: {other}"
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|()| Error::invalid_request(format!("cannot switch {url} to {scheme}")))?;

    let mut handshake = url
        .as_str()
        .into_client_request()
        .map_err(|e| Error::invalid_request(e.to_string()))?;
    for (name, value) in request.headers().iter() {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::invalid_request(format!("invalid header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::invalid_request(format!("invalid value for {name}: {e}")))?;
        handshake.headers_mut().append(name, value);
    }

    Ok((url, handshake))
}

fn handshake_response(response: HandshakeResponse) -> Response {
    let (parts, body) = response.into_parts();
    let headers = parts
        .headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    Response::new(parts.status.as_u16(), headers, body.unwrap_or_default())
}

async fn run(
    target: Result<(Url, HandshakeRequest)>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut listener: Listener,
) {
    let outcome = match target {
        Ok((url, handshake)) => drive(url, handshake, &mut commands, &mut listener).await,
        Err(err) => Err(err),
    };

    // Handles see the session as ended before the terminal callback runs.
    commands.close();
    match outcome {
        Ok((code, reason)) => listener.closed(code, reason),
        Err(err) => listener.failed(err),
    }
}

/// Runs the connection until it ends, returning the peer's close code and
/// reason after a close handshake.
async fn drive(
    url: Url,
    handshake: HandshakeRequest,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    listener: &mut Listener,
) -> Result<(u16, String)> {
    let (socket, response) = connect_async(handshake).await.map_err(ws_error)?;
    debug!(%url, "websocket open");
    listener.opened(handshake_response(response));

    let (mut sink, mut stream) = socket.split();
    let mut peer_close: Option<(u16, String)> = None;
    let mut accepting = true;

    loop {
        tokio::select! {
            biased;

            command = commands.recv(), if accepting => {
                let outgoing = match command {
                    Some(Command::Text(text)) => Message::Text(text.into()),
                    Some(Command::Binary(bytes)) => Message::Binary(bytes),
                    Some(Command::Close(code, reason)) => Message::Close(Some(CloseFrame {
                        code: code.into(),
                        reason: reason.into(),
                    })),
                    Some(Command::Cancel) => {
                        let _ = sink
                            .send(Message::Close(Some(CloseFrame {
                                code: GOING_AWAY.into(),
                                reason: String::from("cancelled").into(),
                            })))
                            .await;
                        return Err(Error::websocket("cancelled"));
                    }
                    None => {
                        // Every handle is gone; keep reading until the peer hangs up.
                        accepting = false;
                        continue;
                    }
                };
                sink.send(outgoing).await.map_err(ws_error)?;
            }

            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => listener.text(text.as_str().to_owned()),
                Some(Ok(Message::Binary(bytes))) => listener.binary(bytes),
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame.map_or_else(
                        || (NO_STATUS_RECEIVED, String::new()),
                        |frame| (u16::from(frame.code), frame.reason.as_str().to_owned()),
                    );
                    // Nothing more is sent once the peer started closing.
                    commands.close();
                    accepting = false;
                    listener.closing(code, reason.clone());
                    peer_close = Some((code, reason));
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => return peer_close.ok_or_else(|| ws_error(err)),
                None => {
                    return peer_close.ok_or_else(|| {
                        Error::websocket("connection ended without a close handshake")
                    });
                }
            },
        }
    }
}

fn ws_error(err: tokio_tungstenite::tungstenite::Error) -> Error {
    Error::websocket(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(url: &str) -> Result<(Url, HandshakeRequest)> {
        handshake_target(
            Request::builder(Method::Get, url)
                .header("X-Room", "lobby")
                .build(),
        )
    }

    #[test]
    fn http_schemes_become_websocket_schemes() {
        let (url, handshake) = target("http://localhost:8080/chat").expect("ws");
        assert_eq!(url.as_str(), "ws://localhost:8080/chat");
        assert_eq!(handshake.uri(), "ws://localhost:8080/chat");
        assert_eq!(handshake.headers()["x-room"], "lobby");

        let (url, _) = target("https://example.com/chat").expect("wss");
        assert_eq!(url.scheme(), "wss");
    }

    #[test]
    fn unresolvable_targets_are_rejected() {
        assert!(matches!(
            target("not a url"),
            Err(Error::MalformedRequest(_))
        ));
        assert!(matches!(
            target("ftp://example.com/chat"),
            Err(Error::InvalidRequest(_))
        ));
    }

    #[test]
    fn build_outside_runtime_fails_fast() {
        let (tx, rx) = std::sync::mpsc::channel();
        let session = NetworkClient::builder()
            .build()
            .websocket()
            .on_closed(|_, _| panic!("never opened"))
            .on_failure(move |err| tx.send(err).expect("send"))
            .build("ws://localhost:9/chat");

        assert!(matches!(rx.recv().expect("failure"), Error::NoRuntime));
        assert_eq!(session.url().map(Url::as_str), Some("ws://localhost:9/chat"));
        assert!(!session.send("ignored"));
    }
}
