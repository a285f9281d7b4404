// Integration tests for `HomeboxClient` using wiremock.
#![allow(clippy::unwrap_used)]

use std::time::Duration;

use chrono::{TimeDelta, Utc};
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use homebox_api::{
    AuthConfig, DEFAULT_WEBHOOK_EVENTS, Error, HomeboxClient, LoginCredentials, RetryPolicy,
    TransportConfig,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
    }
}

async fn setup() -> (MockServer, HomeboxClient) {
    let server = MockServer::start().await;
    mount_login(&server).await;
    let client = build_client(&server);
    (server, client)
}

fn build_client(server: &MockServer) -> HomeboxClient {
    HomeboxClient::new(
        Url::parse(&server.uri()).unwrap(),
        LoginCredentials {
            username: "admin@example.com".into(),
            password: SecretString::from("hunter2".to_owned()),
        },
        AuthConfig::default(),
        &TransportConfig::default(),
    )
    .unwrap()
    .with_retry_policy(fast_retry())
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/v1/users/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "Bearer tok",
            "expiresAt": (Utc::now() + TimeDelta::hours(1)).to_rfc3339(),
        })))
        .mount(server)
        .await;
}

fn item(id: &str, location: &str) -> serde_json::Value {
    json!({
        "id": id,
        "name": format!("Item {id}"),
        "quantity": 1,
        "location": { "id": location, "name": location },
        "updatedAt": "2024-05-01T12:00:00Z",
    })
}

// ── Items ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_assets_follows_pagination() {
    let (server, client) = setup().await;
    let client = client.with_page_size(2);

    Mock::given(method("GET"))
        .and(path("/api/v1/items"))
        .and(query_param("page", "1"))
        .and(query_param("pageSize", "2"))
        .and(header("Authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [item("a", "garage"), item("b", "garage")],
            "page": 1, "pageSize": 2, "total": 3,
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/items"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [item("c", "attic")],
            "page": 2, "pageSize": 2, "total": 3,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let assets = client.list_assets().await.unwrap();
    let ids: Vec<_> = assets.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    assert_eq!(assets[2].effective_location_id(), Some("attic"));
}

#[tokio::test]
async fn test_list_assets_passes_label_filter() {
    let (server, client) = setup().await;
    let client = client.with_asset_label(Some("tracked".into()));

    Mock::given(method("GET"))
        .and(path("/api/v1/items"))
        .and(query_param("labels", "tracked"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([item("a", "garage")])))
        .expect(1)
        .mount(&server)
        .await;

    let assets = client.list_assets().await.unwrap();
    assert_eq!(assets.len(), 1);
}

#[tokio::test]
async fn test_get_asset_not_found() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/items/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.get_asset("gone").await.unwrap_err();
    assert!(err.is_not_found(), "expected NotFound, got {err:?}");
}

#[tokio::test]
async fn test_malformed_body_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/items/a"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy error</html>"))
        .mount(&server)
        .await;

    let err = client.get_asset("a").await.unwrap_err();
    match err {
        Error::Deserialization { body, .. } => assert!(body.contains("proxy error")),
        other => panic!("expected Deserialization, got {other:?}"),
    }
}

// ── Retry ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_rate_limit_then_success() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/locations"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/locations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "garage", "name": "Garage" }])))
        .expect(1)
        .mount(&server)
        .await;

    let locations = client.list_locations().await.unwrap();
    assert_eq!(locations[0].name, "Garage");
}

#[tokio::test]
async fn test_server_errors_exhaust_retries() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/locations"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({ "error": "maintenance" })))
        .expect(3)
        .mount(&server)
        .await;

    let err = client.list_locations().await.unwrap_err();
    match err {
        Error::Server { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "maintenance");
        }
        other => panic!("expected Server, got {other:?}"),
    }
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/locations"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.list_locations().await.unwrap_err();
    assert!(matches!(err, Error::Api { status: 400, .. }));
}

// ── 401 handling ────────────────────────────────────────────────────

#[tokio::test]
async fn test_unauthorized_is_not_replayed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/users/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "Bearer tok" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/locations"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let client = build_client(&server);
    let err = client.list_locations().await.unwrap_err();
    assert!(err.is_auth());
}

#[tokio::test]
async fn test_unauthorized_drops_credential_for_next_call() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/users/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "Bearer tok" })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/locations"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/locations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let client = build_client(&server);
    assert!(client.list_locations().await.unwrap_err().is_auth());
    let locations = client.list_locations().await.unwrap();
    assert!(locations.is_empty());
}

// ── Mutations ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_move_asset_falls_back_to_nested_location() {
    let (server, client) = setup().await;

    Mock::given(method("PATCH"))
        .and(path("/api/v1/items/a"))
        .and(body_json(json!({ "location_id": "attic" })))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({ "error": "unknown field" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/v1/items/a"))
        .and(body_json(json!({ "location": { "id": "attic" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(item("a", "attic")))
        .expect(1)
        .mount(&server)
        .await;

    client.move_asset("a", "attic").await.unwrap();
}

#[tokio::test]
async fn test_create_location() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/locations"))
        .and(body_json(json!({ "name": "Basement" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "loc-9", "name": "Basement" })))
        .expect(1)
        .mount(&server)
        .await;

    let created = client.create_location("Basement").await.unwrap();
    assert_eq!(created.id, "loc-9");
}

#[tokio::test]
async fn test_register_and_list_webhooks() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/notifiers"))
        .and(body_partial_json(json!({
            "url": "https://ha.local/api/webhook/abc",
            "events": ["item.created", "item.updated", "item.deleted"],
            "is_active": true,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "n1", "name": "homebox-sync", "url": "https://ha.local/api/webhook/abc", "isActive": true,
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/notifiers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "n1", "name": "homebox-sync", "url": "https://ha.local/api/webhook/abc", "isActive": true }
        ])))
        .mount(&server)
        .await;

    let created = client
        .register_webhook("https://ha.local/api/webhook/abc", &DEFAULT_WEBHOOK_EVENTS)
        .await
        .unwrap();
    assert!(created.is_active);

    let listed = client.list_webhooks().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].url, "https://ha.local/api/webhook/abc");
}
