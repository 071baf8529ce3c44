//! Integration tests for the retrying HTTP client using wiremock

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use async_trait::async_trait;

use azqr_core::infrastructure::credential::{
    AccessToken, CredentialError, StaticTokenCredential, TokenCredential,
};
use azqr_core::infrastructure::http::{ClientError, HttpClient};

use common::{fast_retry, mock_client_options};

const GRAPH_PATH: &str = "/providers/Microsoft.ResourceGraph/resources";

// ── Helpers ──

fn graph_url(server: &MockServer) -> String {
    format!("{}{}?api-version=2021-03-01", server.uri(), GRAPH_PATH)
}

/// Credential whose token request never completes
struct HangingCredential;

#[async_trait]
impl TokenCredential for HangingCredential {
    async fn get_token(&self, _scopes: &[String]) -> Result<AccessToken, CredentialError> {
        std::future::pending().await
    }
}

fn client(server: &MockServer, max_retries: u32, base: Duration) -> HttpClient {
    let options = mock_client_options(&server.uri(), fast_retry(max_retries, base));
    HttpClient::new(&options, None).expect("client builds")
}

// ── Retry ──

#[tokio::test]
async fn test_recovers_after_three_429s() {
    let server = MockServer::start().await;
    let base = Duration::from_millis(20);

    Mock::given(method("POST"))
        .and(path(GRAPH_PATH))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(3)
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(GRAPH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{"id": "/subscriptions/s/resourceGroups/rg"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let http = client(&server, 3, base);
    let start = Instant::now();
    let response = http
        .post(&graph_url(&server), &serde_json::json!({}), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    let body: serde_json::Value = response.json("graph").unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    // base + 2·base + 4·base without jitter
    assert!(start.elapsed() >= base * 7);
}

#[tokio::test]
async fn test_exhausted_budget_returns_http_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/subscriptions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .expect(3)
        .mount(&server)
        .await;

    let http = client(&server, 2, Duration::from_millis(5));
    let err = http
        .get(&format!("{}/subscriptions", server.uri()), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(503));
    assert!(err.to_string().starts_with("HTTP 503 from "));
    assert!(err.to_string().ends_with(": busy"));
}

#[tokio::test]
async fn test_non_retryable_status_fails_fast() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/subscriptions/s"))
        .respond_with(ResponseTemplate::new(403).set_body_string("denied"))
        .expect(1)
        .mount(&server)
        .await;

    let http = client(&server, 3, Duration::from_millis(5));
    let err = http
        .get(&format!("{}/subscriptions/s", server.uri()), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(403));
}

#[tokio::test]
async fn test_retry_after_on_non_standard_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(409).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let http = client(&server, 3, Duration::from_millis(5));
    let response = http
        .get(&format!("{}/slow", server.uri()), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_skippable_error_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/providers"))
        .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
            "error": {"code": "MissingSubscriptionRegistration", "message": "not registered"}
        })))
        .mount(&server)
        .await;

    let http = client(&server, 0, Duration::from_millis(5));
    let err = http
        .get(&format!("{}/providers", server.uri()), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_skippable());
}

// ── Auth and cancellation ──

#[tokio::test]
async fn test_bearer_token_is_attached() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/subscriptions"))
        .and(header("authorization", "Bearer secret-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"value": []})))
        .expect(1)
        .mount(&server)
        .await;

    let options = mock_client_options(&server.uri(), fast_retry(0, Duration::from_millis(5)));
    let http = HttpClient::new(
        &options,
        Some(Arc::new(StaticTokenCredential::new("secret-token"))),
    )
    .unwrap();

    let body: serde_json::Value = http
        .get_json(&format!("{}/subscriptions", server.uri()), &CancellationToken::new())
        .await
        .unwrap();
    assert!(body["value"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_cancelled_before_send() {
    let server = MockServer::start().await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let http = client(&server, 3, Duration::from_millis(5));
    let err = http
        .get(&format!("{}/anything", server.uri()), &cancel)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
}

#[tokio::test]
async fn test_cancel_interrupts_token_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let options = mock_client_options(&server.uri(), fast_retry(0, Duration::from_millis(5)));
    let http = HttpClient::new(&options, Some(Arc::new(HangingCredential))).unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        http.get(&format!("{}/subscriptions", server.uri()), &cancel),
    )
    .await
    .expect("token fetch honours cancellation")
    .unwrap_err();

    assert!(err.is_cancelled());
}

#[tokio::test]
async fn test_invalid_url() {
    let server = MockServer::start().await;
    let http = client(&server, 0, Duration::from_millis(5));
    let err = http
        .get("not a url", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::InvalidUrl { .. }));
}
