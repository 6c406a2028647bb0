#![allow(clippy::unwrap_used)]
// Integration tests for `DeviceClient` using wiremock.

use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use poolsync_api::transport::DEFAULT_TIMEOUT;
use poolsync_api::{Credential, DeviceClient, Error, ErrorKind, PairingStatus};

const USER: &str = "b167ecc8-87ce-47da-9b7d-cab632a2eeba";

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, DeviceClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = DeviceClient::with_client(reqwest::Client::new(), base_url, DEFAULT_TIMEOUT);
    (server, client)
}

fn credential(secret: &str) -> Credential {
    Credential::new(SecretString::from(secret.to_string()), "aa:bb:cc:dd:ee:ff")
}

fn snapshot_body() -> serde_json::Value {
    json!({
        "poolSync": {
            "config": { "name": "PoolSync®" },
            "system": { "fwVersion": "1.2.3", "hwVersion": "4" },
            "status": { "online": true, "rssi": -61 }
        },
        "devices": {
            "0": { "status": { "waterTemp": 78 }, "config": { "chlorOutput": 40 } }
        },
        "deviceType": { "0": "chlorSync" }
    })
}

// ── Pairing ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_start_pairing_sends_user_header() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/api/poolsync"))
        .and(query_param("cmd", "pushLink"))
        .and(query_param("start", ""))
        .and(header("user", USER))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "timeRemaining": 120 })))
        .expect(1)
        .mount(&server)
        .await;

    let ack = client.start_pairing().await.unwrap();
    assert_eq!(ack, json!({ "timeRemaining": 120 }));
}

#[tokio::test]
async fn test_start_pairing_rejects_non_json() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/api/poolsync"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>busy</html>"))
        .mount(&server)
        .await;

    let err = client.start_pairing().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
}

#[tokio::test]
async fn test_poll_status_waiting() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/poolsync"))
        .and(query_param("cmd", "pushLink"))
        .and(query_param("status", ""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "timeRemaining": 95 })))
        .mount(&server)
        .await;

    let status = client.poll_pairing_status().await.unwrap();
    assert!(
        matches!(status, PairingStatus::Waiting { time_remaining: Some(95) }),
        "unexpected status: {status:?}"
    );
}

#[tokio::test]
async fn test_poll_status_linked_json_labelled_as_text() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/poolsync"))
        .and(query_param("status", ""))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/plain")
                .set_body_string(r#"{"password":"abc123","macAddress":"AA:BB:CC:00:11:22"}"#),
        )
        .mount(&server)
        .await;

    match client.poll_pairing_status().await.unwrap() {
        PairingStatus::Linked { secret, identifier } => {
            assert_eq!(secret.expose_secret(), "abc123");
            assert_eq!(identifier.as_deref(), Some("AA:BB:CC:00:11:22"));
        }
        other @ PairingStatus::Waiting { .. } => panic!("expected linked, got {other:?}"),
    }
}

// ── Snapshot ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_fetch_snapshot_sends_raw_secret() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/poolsync"))
        .and(query_param("cmd", "poolSync"))
        .and(query_param("all", ""))
        .and(header("authorization", "s3cret"))
        .and(header("user", USER))
        .respond_with(ResponseTemplate::new(200).set_body_json(snapshot_body()))
        .expect(1)
        .mount(&server)
        .await;

    let body = client.fetch_snapshot(&credential("s3cret")).await.unwrap();
    assert_eq!(body["devices"]["0"]["status"]["waterTemp"], json!(78));
}

#[tokio::test]
async fn test_fetch_snapshot_without_secret_makes_no_request() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(snapshot_body()))
        .expect(0)
        .mount(&server)
        .await;

    let err = client.fetch_snapshot(&credential("")).await.unwrap_err();
    assert!(err.is_auth(), "expected auth error, got {err:?}");
}

#[tokio::test]
async fn test_fetch_snapshot_unauthorized() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/poolsync"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&server)
        .await;

    let result = client.fetch_snapshot(&credential("stale")).await;
    assert!(
        matches!(result, Err(Error::Authentication { status: Some(401), .. })),
        "expected Authentication error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_fetch_snapshot_forbidden_is_auth() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = client.fetch_snapshot(&credential("stale")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Auth);
}

#[tokio::test]
async fn test_fetch_snapshot_server_error_is_protocol() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .mount(&server)
        .await;

    let err = client.fetch_snapshot(&credential("s3cret")).await.unwrap_err();
    match err {
        Error::Protocol { status, body, .. } => {
            assert_eq!(status, Some(500));
            assert_eq!(body.as_deref(), Some("internal"));
        }
        other => panic!("expected protocol error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_fetch_snapshot_missing_devices_section() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "poolSync": {} })))
        .mount(&server)
        .await;

    let err = client.fetch_snapshot(&credential("s3cret")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert!(err.to_string().contains("devices"));
}

#[tokio::test]
async fn test_fetch_snapshot_timeout_is_communication() {
    let server = MockServer::start().await;
    let timeout = Duration::from_secs(1);
    let http = reqwest::Client::builder().timeout(timeout).build().unwrap();
    let client = DeviceClient::with_client(http, Url::parse(&server.uri()).unwrap(), timeout);

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(snapshot_body())
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let err = client.fetch_snapshot(&credential("s3cret")).await.unwrap_err();
    assert!(matches!(err, Error::Timeout { timeout_secs: 1 }), "got {err:?}");
    assert_eq!(err.to_string(), "Request timed out after 1s");
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_unreachable_device_is_communication() {
    // Bind an ephemeral port, then release it so nothing is listening.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let base_url = Url::parse(&format!("http://127.0.0.1:{port}")).unwrap();
    let client = DeviceClient::with_client(reqwest::Client::new(), base_url, DEFAULT_TIMEOUT);
    let err = client.poll_pairing_status().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Communication);
    assert!(matches!(err, Error::Communication { .. }), "got {err:?}");
}

// ── Writes ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_patch_field_body_and_query() {
    let (server, client) = setup().await;

    Mock::given(method("PATCH"))
        .and(path("/api/poolsync"))
        .and(query_param("cmd", "devices"))
        .and(query_param("device", "0"))
        .and(header("authorization", "s3cret"))
        .and(body_json(json!({ "config": { "chlorOutput": 55 } })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let ack = client
        .patch_field("0", "chlorOutput", 55, &credential("s3cret"))
        .await
        .unwrap();
    assert_eq!(ack, serde_json::Value::Null);
}

#[tokio::test]
async fn test_patch_field_returns_json_ack() {
    let (server, client) = setup().await;

    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .mount(&server)
        .await;

    let ack = client
        .patch_field("1", "setpoint", 84, &credential("s3cret"))
        .await
        .unwrap();
    assert_eq!(ack, json!({ "ok": true }));
}

#[tokio::test]
async fn test_patch_field_rejected_credential() {
    let (server, client) = setup().await;

    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client
        .patch_field("0", "chlorOutput", 10, &credential("stale"))
        .await
        .unwrap_err();
    assert!(err.is_auth());
}

#[test]
fn test_new_derives_base_url_from_address() {
    let client = DeviceClient::new("192.168.1.50", &poolsync_api::TransportConfig::default()).unwrap();
    assert_eq!(client.address(), "192.168.1.50");
    assert_eq!(client.base_url().as_str(), "http://192.168.1.50/");
}
