#![allow(clippy::unwrap_used)]
// Integration tests for `BridgeClient` using wiremock.

use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pairlink_api::{BridgeClient, Error, NotificationRequest, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, BridgeClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&format!("{}/api", server.uri())).unwrap();
    let client = BridgeClient::with_client(reqwest::Client::new(), base_url);
    (server, client)
}

async fn setup_with_key(key: &str) -> (MockServer, BridgeClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&format!("{}/api", server.uri())).unwrap();
    let secret = SecretString::from(key.to_owned());
    let client = BridgeClient::new(base_url, Some(&secret), &TransportConfig::default()).unwrap();
    (server, client)
}

// ── Status ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_status_connected() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/bridge/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "connected": true, "identifier": "56912345678" })),
        )
        .mount(&server)
        .await;

    let status = client.status(&CancellationToken::new()).await.unwrap();

    assert!(status.connected);
    assert_eq!(status.identifier.as_deref(), Some("56912345678"));
}

#[tokio::test]
async fn test_status_legacy_shape() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/bridge/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "conectado": false })))
        .mount(&server)
        .await;

    let status = client.status(&CancellationToken::new()).await.unwrap();

    assert!(!status.connected);
    assert_eq!(status.identifier, None);
}

#[tokio::test]
async fn test_status_does_not_send_admin_key() {
    let (server, client) = setup_with_key("s3cret").await;

    Mock::given(method("GET"))
        .and(path("/api/bridge/status"))
        .and(header_exists("x-admin-key"))
        .respond_with(ResponseTemplate::new(418))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/bridge/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "connected": false })))
        .mount(&server)
        .await;

    let status = client.status(&CancellationToken::new()).await.unwrap();
    assert!(!status.connected);
}

// ── Pairing code ────────────────────────────────────────────────────

#[tokio::test]
async fn test_pairing_code_sends_admin_key() {
    let (server, client) = setup_with_key("s3cret").await;

    Mock::given(method("GET"))
        .and(path("/api/bridge/pairing-code"))
        .and(header("X-Admin-Key", "s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": "ABC123" })))
        .expect(1)
        .mount(&server)
        .await;

    let code = client.pairing_code(&CancellationToken::new()).await.unwrap();
    assert_eq!(code.as_deref(), Some("ABC123"));
}

#[tokio::test]
async fn test_pairing_code_null_when_paired() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/bridge/pairing-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": null })))
        .mount(&server)
        .await;

    let code = client.pairing_code(&CancellationToken::new()).await.unwrap();
    assert_eq!(code, None);
}

// ── Control endpoints ───────────────────────────────────────────────

#[tokio::test]
async fn test_request_unlink() {
    let (server, client) = setup_with_key("s3cret").await;

    Mock::given(method("POST"))
        .and(path("/api/bridge/unlink"))
        .and(header("X-Admin-Key", "s3cret"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "ok": true, "message": "unlinked, scan a new code" })),
        )
        .mount(&server)
        .await;

    let resp = client.request_unlink(&CancellationToken::new()).await.unwrap();
    assert!(resp.ok);
    assert_eq!(resp.message, "unlinked, scan a new code");
}

#[tokio::test]
async fn test_request_relink_reports_refusal() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/bridge/relink"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "ok": false, "mensaje": "busy" })),
        )
        .mount(&server)
        .await;

    let resp = client.request_relink(&CancellationToken::new()).await.unwrap();
    assert!(!resp.ok);
    assert_eq!(resp.message, "busy");
}

#[tokio::test]
async fn test_close_session() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/bridge/close-session"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "message": "closed" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let resp = client.close_session(&CancellationToken::new()).await.unwrap();
    assert!(resp.ok);
}

#[tokio::test]
async fn test_notify_sends_query() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/bridge/notify"))
        .and(query_param("number", "56912345678"))
        .and(query_param("patient", "Firulais"))
        .and(query_param("time", "10:30"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "message": "sent" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let request = NotificationRequest {
        number: "56912345678".into(),
        name: "Ana".into(),
        patient: "Firulais".into(),
        date: "2026-10-20".into(),
        time: Some("10:30".into()),
    };
    let resp = client
        .notify(&request, &CancellationToken::new())
        .await
        .unwrap();
    assert!(resp.ok);
}

// ── Error tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_error_detail_is_surfaced() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/bridge/unlink"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "detail": "Invalid admin key" })),
        )
        .mount(&server)
        .await;

    let result = client.request_unlink(&CancellationToken::new()).await;

    match result {
        Err(Error::Remote { status, ref message }) => {
            assert_eq!(status, 401);
            assert_eq!(message, "Invalid admin key");
        }
        other => panic!("expected Remote error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_error_without_body_uses_status_code() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/bridge/status"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let err = client
        .status(&CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_transient(), "5xx should be transient: {err:?}");
    assert_eq!(err.status(), Some(503));
    assert!(
        err.to_string().contains("HTTP 503"),
        "expected raw status in message, got: {err}"
    );
}

#[tokio::test]
async fn test_slow_bridge_reports_configured_timeout() {
    let server = MockServer::start().await;
    let base_url = Url::parse(&format!("{}/api", server.uri())).unwrap();
    let transport = TransportConfig {
        timeout: Duration::from_secs(1),
        ..TransportConfig::default()
    };
    let client = BridgeClient::new(base_url, None, &transport).unwrap();

    Mock::given(method("GET"))
        .and(path("/api/bridge/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "connected": true }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let err = client.status(&CancellationToken::new()).await.unwrap_err();
    assert!(
        matches!(err, Error::Timeout { timeout_secs: 1 }),
        "unexpected error: {err:?}"
    );
    assert!(err.is_transient());
    assert_eq!(err.to_string(), "Request timed out after 1s");
}

#[tokio::test]
async fn test_client_error_is_not_transient() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/bridge/pairing-code"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({ "error": "forbidden" })))
        .mount(&server)
        .await;

    let err = client
        .pairing_code(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(!err.is_transient());
    assert!(err.to_string().contains("forbidden"));
}

#[tokio::test]
async fn test_malformed_body_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/bridge/status"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Backend WhatsApp activo"))
        .mount(&server)
        .await;

    let result = client.status(&CancellationToken::new()).await;
    assert!(
        matches!(result, Err(Error::Deserialization { .. })),
        "expected Deserialization error, got: {result:?}"
    );
}

// ── Cancellation ────────────────────────────────────────────────────

#[tokio::test]
async fn test_cancel_aborts_in_flight_request() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/bridge/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "connected": true }))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let result = client.status(&cancel).await;

    assert!(matches!(result, Err(Error::Cancelled)), "got: {result:?}");
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_already_cancelled_token_short_circuits() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/bridge/unlink"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(0)
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = client.request_unlink(&cancel).await.unwrap_err();
    assert!(err.is_cancelled());
}
