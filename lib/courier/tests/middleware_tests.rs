//! Integration tests for the middleware ordering and authentication.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use courier::tower::util::MapRequestLayer;
use courier::{BearerAuth, ContentType, Headers, LogLevel, NetworkClient, Request};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path},
};

fn set_user(value: &'static str) -> MapRequestLayer<impl Fn(Request) -> Request + Clone> {
    MapRequestLayer::new(move |mut request: Request| {
        request.headers_mut().insert("X-User", value);
        request
    })
}

/// Auth headers are added after every interceptor ran, so they win.
#[tokio::test]
async fn test_auth_provider_overrides_interceptor_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("X-User", "2"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = |headers: &mut Headers| headers.insert("X-User", "2");
    let client = NetworkClient::builder()
        .base_url(mock_server.uri())
        .interceptor(set_user("1"))
        .auth_provider(Arc::new(provider))
        .build();

    let response = client.get("/me", |request| request).await.expect("response");
    assert_eq!(response.status(), 200);

    let received = mock_server.received_requests().await.expect("recording");
    let users: Vec<_> = received[0].headers.get_all("x-user").iter().collect();
    assert_eq!(users, ["2"]);
}

/// Interceptors run in registration order, the first one outermost.
#[tokio::test]
async fn test_interceptors_run_in_registration_order() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/order"))
        .and(header("X-User", "second"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = NetworkClient::builder()
        .base_url(mock_server.uri())
        .interceptor(set_user("first"))
        .interceptor(set_user("second"))
        .build();

    let response = client.get("/order", |request| request).await.expect("response");
    assert!(response.is_success());
}

/// Formatted log output, lowercased.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Captured {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl Captured {
    fn output(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().expect("lock")).to_lowercase()
    }
}

/// Posts `purr` with the given verbosity and returns what got logged.
async fn logged_post(level: LogLevel, log_headers: bool) -> String {
    logged_post_with(level, log_headers, ContentType::PlainText).await
}

async fn logged_post_with(level: LogLevel, log_headers: bool, content_type: ContentType) -> String {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/logged"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"logged": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let captured = Captured::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(captured.clone())
        .with_ansi(false)
        .with_env_filter(EnvFilter::new("courier::http=info"))
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);

    let client = NetworkClient::builder()
        .base_url(mock_server.uri())
        .log_level(level)
        .build();
    let response = client
        .post("/logged", |request| {
            request
                .body("purr", content_type)
                .log_headers(log_headers)
        })
        .await
        .expect("response");
    assert_eq!(response.text().expect("utf8"), r#"{"logged":true}"#);

    drop(guard);
    captured.output()
}

#[tokio::test]
async fn test_logging_none_is_silent() {
    let output = logged_post(LogLevel::None, false).await;
    assert!(output.is_empty(), "{output}");
}

#[tokio::test]
async fn test_logging_basic_lines() {
    let output = logged_post(LogLevel::Basic, false).await;

    assert!(output.contains("--> post http://"), "{output}");
    assert!(output.contains("<-- 200 http://"), "{output}");
    assert!(output.contains("ms)"), "{output}");
    assert!(!output.contains("content-type:"), "{output}");
    assert!(!output.contains("purr"), "{output}");
}

#[tokio::test]
async fn test_logging_headers_lines() {
    let output = logged_post(LogLevel::Headers, false).await;

    assert!(output.contains("--> content-type: text/plain"), "{output}");
    assert!(output.contains("<-- content-type: application/json"), "{output}");
    assert!(!output.contains("purr"), "{output}");
}

#[tokio::test]
async fn test_logging_body_lines() {
    let output = logged_post(LogLevel::Body, false).await;

    assert!(output.contains("--> content-type: text/plain"), "{output}");
    assert!(output.contains("--> purr"), "{output}");
    assert!(output.contains(r#"<-- {"logged":true}"#), "{output}");
}

#[tokio::test]
async fn test_logging_body_ignores_content_type() {
    let output = logged_post_with(LogLevel::Body, false, ContentType::OctetStream).await;

    assert!(output.contains("--> content-type: application/octet-stream"), "{output}");
    assert!(output.contains("--> purr"), "{output}");
}

#[tokio::test]
async fn test_log_headers_raises_basic() {
    let output = logged_post(LogLevel::Basic, true).await;

    assert!(output.contains("--> content-type: text/plain"), "{output}");
    assert!(!output.contains("purr"), "{output}");
}

#[tokio::test]
async fn test_bearer_auth_header() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/protected"))
        .and(header("Authorization", "Bearer my-secret-token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = NetworkClient::builder()
        .base_url(mock_server.uri())
        .auth_provider(Arc::new(BearerAuth::new("my-secret-token")))
        .build();

    let response = client.get("/protected", |request| request).await.expect("response");
    assert!(response.is_success());
}

/// A per-request provider adds its headers; the client provider still runs.
#[tokio::test]
async fn test_per_request_auth_keeps_client_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/protected"))
        .and(header("Authorization", "Bearer client"))
        .and(header("X-Extra", "1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = NetworkClient::builder()
        .base_url(mock_server.uri())
        .auth_provider(Arc::new(BearerAuth::new("client")))
        .build();

    let response = client
        .get("/protected", |request| {
            request.auth(Arc::new(|headers: &mut Headers| {
                headers.insert("X-Extra", "1");
            }))
        })
        .await
        .expect("response");
    assert!(response.is_success());

    let received = mock_server.received_requests().await.expect("recording");
    assert_eq!(received[0].headers.get_all("authorization").iter().count(), 1);
}

/// On a shared header the client provider wins over the per-request one.
#[tokio::test]
async fn test_client_auth_wins_over_per_request_auth() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/protected"))
        .and(header("Authorization", "Bearer client"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = NetworkClient::builder()
        .base_url(mock_server.uri())
        .auth_provider(Arc::new(BearerAuth::new("client")))
        .build();

    let response = client
        .get("/protected", |request| {
            request.auth(Arc::new(BearerAuth::new("per-request")))
        })
        .await
        .expect("response");
    assert!(response.is_success());
}

/// The authenticator answers a 401 once; interceptors see a single call.
#[tokio::test]
async fn test_authenticator_answers_challenge() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/secret"))
        .and(header("Authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_string("granted"))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/secret"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let client = NetworkClient::builder()
        .base_url(mock_server.uri())
        .interceptor(MapRequestLayer::new(move |request: Request| {
            counter.fetch_add(1, Ordering::SeqCst);
            request
        }))
        .authenticator(Arc::new(BearerAuth::new("fresh")))
        .build();

    let response = client.get("/secret", |request| request).await.expect("response");
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().expect("utf8"), "granted");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// Without an answer the challenge response is handed back as is.
#[tokio::test]
async fn test_unanswered_challenge_is_returned() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/secret"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = NetworkClient::builder()
        .base_url(mock_server.uri())
        .authenticator(Arc::new(BearerAuth::new("wrong")))
        .build();

    let response = client
        .get_with_result("/secret", |request| request)
        .await
        .expect("response");
    assert_eq!(response.status(), 401);
}
