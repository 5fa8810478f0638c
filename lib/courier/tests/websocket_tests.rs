//! WebSocket session tests against a local tokio-tungstenite server.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use courier::{Error, NetworkClient};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

#[derive(Debug, PartialEq)]
enum Event {
    Open(u16),
    Text(String),
    Binary(Vec<u8>),
    Closing(u16),
    Closed(u16),
    Failure(String),
}

/// Echoes text and binary frames until the client closes.
async fn echo_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut socket = accept_async(stream).await.expect("handshake");
        while let Some(Ok(message)) = socket.next().await {
            if message.is_text() || message.is_binary() {
                socket.send(message).await.expect("echo");
            }
        }
    });

    addr
}

/// Closes every connection with `1000` right after the handshake.
async fn closing_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut socket = accept_async(stream).await.expect("handshake");
        socket
            .send(Message::Close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: String::from("done").into(),
            })))
            .await
            .expect("close");
        while let Some(Ok(_)) = socket.next().await {}
    });

    addr
}

fn session_events(
    client: &NetworkClient,
    path: &str,
) -> (courier::WebSocketSession, mpsc::UnboundedReceiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (open, text, binary, closing, closed, failure) = (
        tx.clone(),
        tx.clone(),
        tx.clone(),
        tx.clone(),
        tx.clone(),
        tx,
    );

    let session = client
        .websocket()
        .on_open(move |response| {
            let _ = open.send(Event::Open(response.status()));
        })
        .on_message(move |message| {
            let _ = text.send(Event::Text(message));
        })
        .on_binary(move |bytes| {
            let _ = binary.send(Event::Binary(bytes.to_vec()));
        })
        .on_closing(move |code, _| {
            let _ = closing.send(Event::Closing(code));
        })
        .on_closed(move |code, _| {
            let _ = closed.send(Event::Closed(code));
        })
        .on_failure(move |err: Error| {
            let _ = failure.send(Event::Failure(err.to_string()));
        })
        .build(path);

    (session, rx)
}

async fn next_event(events: &mut mpsc::UnboundedReceiver<Event>) -> Event {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("event in time")
        .expect("event")
}

#[tokio::test]
async fn test_echo_then_graceful_close() {
    let addr = echo_server().await;
    let client = NetworkClient::builder()
        .base_url(format!("http://{addr}"))
        .build();

    let (session, mut events) = session_events(&client, "/chat");
    assert_eq!(
        session.url().map(url::Url::as_str),
        Some(format!("ws://{addr}/chat").as_str())
    );

    assert!(session.send("meow"));
    assert!(session.send_binary(vec![1_u8, 2, 3]));

    assert_eq!(next_event(&mut events).await, Event::Open(101));
    assert_eq!(next_event(&mut events).await, Event::Text("meow".to_string()));
    assert_eq!(next_event(&mut events).await, Event::Binary(vec![1, 2, 3]));

    assert!(session.close(1000, "bye"));
    assert_eq!(next_event(&mut events).await, Event::Closing(1000));
    assert_eq!(next_event(&mut events).await, Event::Closed(1000));

    // Exactly one terminal event: the listener is gone once closed.
    assert!(events.recv().await.is_none());
}

#[tokio::test]
async fn test_failure_when_nothing_listens() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let client = NetworkClient::builder().build();
    let (_session, mut events) = session_events(&client, &format!("http://{addr}/chat"));

    assert!(matches!(next_event(&mut events).await, Event::Failure(_)));
    assert!(events.recv().await.is_none());
}

#[tokio::test]
async fn test_cancel_reports_failure() {
    let addr = echo_server().await;
    let client = NetworkClient::builder().build();

    let (session, mut events) = session_events(&client, &format!("http://{addr}/chat"));
    assert_eq!(next_event(&mut events).await, Event::Open(101));

    session.cancel();
    assert_eq!(
        next_event(&mut events).await,
        Event::Failure("WebSocket error: cancelled".to_string())
    );
    assert!(events.recv().await.is_none());
    assert!(!session.send("too late"));
}

#[tokio::test]
async fn test_invalid_scheme_reports_failure() {
    let client = NetworkClient::builder().build();
    let (session, mut events) = session_events(&client, "ftp://127.0.0.1/chat");

    assert!(session.url().is_none());
    assert!(matches!(next_event(&mut events).await, Event::Failure(_)));
}

#[tokio::test]
async fn test_peer_close_ignores_later_commands() {
    let addr = closing_server().await;
    let client = NetworkClient::builder().build();

    let (tx, mut events) = mpsc::unbounded_channel();
    let (closing, closed, failure) = (tx.clone(), tx.clone(), tx);
    let slot: Arc<OnceLock<courier::WebSocketSession>> = Arc::new(OnceLock::new());
    let from_callback = Arc::clone(&slot);

    let session = client
        .websocket()
        .on_closing(move |code, _| {
            let session = from_callback.get().expect("session");
            let accepted = session.send("late");
            session.cancel();
            let _ = closing.send(Event::Closing(code));
            let _ = closing.send(Event::Text(format!("accepted={accepted}")));
        })
        .on_closed(move |code, _| {
            let _ = closed.send(Event::Closed(code));
        })
        .on_failure(move |err: Error| {
            let _ = failure.send(Event::Failure(err.to_string()));
        })
        .build(&format!("http://{addr}/chat"));
    slot.set(session).expect("set once");

    assert_eq!(next_event(&mut events).await, Event::Closing(1000));
    assert_eq!(
        next_event(&mut events).await,
        Event::Text("accepted=false".to_string())
    );
    assert_eq!(next_event(&mut events).await, Event::Closed(1000));
    assert!(events.recv().await.is_none());
}
