//! Integration tests for `SearchClient` using wiremock HTTP mocks.

use mktmon_search::{SearchClient, SearchError, SearchQuery};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(base_url: &str) -> SearchClient {
    SearchClient::with_base_url("test-key", 30, 3, base_url)
        .expect("client construction should not fail")
        .with_backoff_base_ms(0)
}

#[tokio::test]
async fn search_returns_parsed_hits() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "results": [
            {
                "title": "Acme launches zero-proof line",
                "url": "https://news.example.com/acme-launch",
                "snippet": "Acme Drinks announced a nationwide launch...",
                "published_date": "2026-07-30"
            },
            {
                "title": "Q2 category report",
                "url": "https://research.example.com/q2-report.pdf",
                "content_type": "application/pdf"
            }
        ]
    });

    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_partial_json(serde_json::json!({
            "api_key": "test-key",
            "query": "functional beverages launch"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let hits = client
        .search(&SearchQuery::new("functional beverages launch"))
        .await
        .expect("should parse hits");

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].title, "Acme launches zero-proof line");
    assert_eq!(
        hits[0].published_date.map(|d| d.to_string()),
        Some("2026-07-30".to_string())
    );
    assert_eq!(hits[1].content_type.as_deref(), Some("application/pdf"));
}

#[tokio::test]
async fn search_passes_recency_days() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_partial_json(serde_json::json!({ "days": 7 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "results": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let mut query = SearchQuery::new("anything");
    query.recency_days = Some(7);

    let hits = client.search(&query).await.expect("empty result is ok");
    assert!(hits.is_empty());
}

#[tokio::test]
async fn provider_error_field_is_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "error": "query too long" })),
        )
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client
        .search(&SearchQuery::new("x"))
        .await
        .expect_err("should surface provider error");

    assert!(matches!(err, SearchError::ApiError(ref msg) if msg == "query too long"));
}

#[tokio::test]
async fn rejected_request_surfaces_detail_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(serde_json::json!({ "detail": "invalid api key" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client
        .search(&SearchQuery::new("x"))
        .await
        .expect_err("400 should be an ApiError");

    assert!(matches!(err, SearchError::ApiError(ref msg) if msg == "invalid api key"));
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [{ "title": "ok", "url": "https://x.test/a" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let hits = client
        .search(&SearchQuery::new("retry me"))
        .await
        .expect("should succeed after retries");

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].url, "https://x.test/a");
}
