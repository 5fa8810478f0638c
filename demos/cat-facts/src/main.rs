//! Cat facts demo
//!
//! Builds a courier client against <https://catfact.ninja> and shows raw,
//! typed, result-wrapped and callback dispatch. Set `RUST_LOG` to change the
//! log output, e.g. `RUST_LOG=courier=debug`.

// Demo-specific lint allowances
#![allow(missing_docs)]
#![allow(clippy::print_stdout)]

use std::sync::Arc;
use std::time::Duration;

use courier::prelude::*;
use tokio::sync::oneshot;
use tracing::info;
use tracing_subscriber::EnvFilter;

const BASE_URL: &str = "https://catfact.ninja";

// ============================================================================
// Data Types
// ============================================================================

/// One cat fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    pub fact: String,
    pub length: u32,
}

/// A page of cat breeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreedPage {
    pub current_page: u32,
    pub data: Vec<Breed>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breed {
    pub breed: String,
    pub country: String,
}

// ============================================================================
// Client
// ============================================================================

fn cat_client(base_url: &str) -> NetworkClient {
    NetworkClient::builder()
        .base_url(base_url)
        .connect_timeout(Duration::from_secs(10))
        .read_timeout(Duration::from_secs(10))
        .log_level(LogLevel::Basic)
        .serializer(Arc::new(JsonCodec))
        .build()
}

async fn random_fact(client: &NetworkClient, max_length: u32) -> courier::Result<Fact> {
    client
        .get_as("/fact", |request| request.query("max_length", max_length))
        .await
}

async fn breeds(client: &NetworkClient, limit: u32) -> courier::Result<BreedPage> {
    client
        .get_as("/breeds", |request| {
            request
                .query("limit", limit)
                .header("Accept", "application/json")
        })
        .await
}

#[tokio::main]
async fn main() -> courier::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let client = cat_client(BASE_URL);

    let fact = random_fact(&client, 120).await?;
    println!("Fact: {} ({} chars)", fact.fact, fact.length);

    let page = breeds(&client, 3).await?;
    for breed in &page.data {
        println!("Breed: {} from {}", breed.breed, breed.country);
    }

    let missing = client.get_with_result("/no-such-endpoint", |request| request).await?;
    println!("Missing endpoint answered {}", missing.status());

    let (tx, rx) = oneshot::channel();
    client.get_async(
        "/fact",
        |request| request,
        |response| {
            let _ = tx.send(response.status());
        },
        |err| info!(%err, "callback dispatch failed"),
    );
    if let Ok(status) = rx.await {
        println!("Callback dispatch answered {status}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path, query_param},
    };

    use super::*;

    #[tokio::test]
    async fn test_random_fact() {
        let mock_server = MockServer::start().await;
        let expected = Fact {
            fact: "A group of cats is called a clowder.".to_string(),
            length: 36,
        };

        Mock::given(method("GET"))
            .and(path("/fact"))
            .and(query_param("max_length", "80"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&expected))
            .mount(&mock_server)
            .await;

        let client = cat_client(&mock_server.uri());
        let fact = random_fact(&client, 80).await.expect("fact");

        assert_eq!(fact, expected);
    }

    #[tokio::test]
    async fn test_breeds_not_found() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/breeds"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = cat_client(&mock_server.uri());
        let err = breeds(&client, 3).await.expect_err("404");

        assert!(err.is_not_found());
    }
}
