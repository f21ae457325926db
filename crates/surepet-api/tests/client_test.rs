#![allow(clippy::unwrap_used)]
// Integration tests for `SureClient` using wiremock.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use futures_util::future::join_all;
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use surepet_api::{Error, LoginCredentials, SureClient, TokenSource};

// ── Helpers ─────────────────────────────────────────────────────────

const EMAIL: &str = "owner@example.com";

fn token(fill: char) -> String {
    fill.to_string().repeat(400)
}

fn bearer(fill: char) -> String {
    format!("Bearer {}", token(fill))
}

fn credentials() -> LoginCredentials {
    LoginCredentials::new(EMAIL, SecretString::from("hunter2".to_string()))
}

async fn setup() -> (MockServer, SureClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&format!("{}/api", server.uri())).unwrap();
    let client = SureClient::with_client(reqwest::Client::new(), base_url, Some(credentials()));
    (server, client)
}

/// Client already holding token `s` (for "stale").
async fn setup_with_token() -> (MockServer, SureClient) {
    let (server, client) = setup().await;
    let client = client.with_token(SecretString::from(token('s')));
    (server, client)
}

async fn mount_login(server: &MockServer, fill: char, times: u64) {
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_partial_json(json!({ "email_address": EMAIL })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": { "token": token(fill) } })),
        )
        .expect(times)
        .mount(server)
        .await;
}

fn start_body() -> serde_json::Value {
    json!({ "data": { "devices": [{ "id": 1, "household_id": 7 }], "pets": [] } })
}

// ── Authentication ──────────────────────────────────────────────────

#[tokio::test]
async fn test_login_then_request_uses_bearer() {
    let (server, client) = setup().await;
    mount_login(&server, 'f', 1).await;

    Mock::given(method("GET"))
        .and(path("/api/me/start"))
        .and(header("authorization", bearer('f').as_str()))
        .and(header("x-device-id", client.device_id()))
        .and(header("x-requested-with", "com.sureflap.surepetcare"))
        .respond_with(ResponseTemplate::new(200).set_body_json(start_body()))
        .expect(1)
        .mount(&server)
        .await;

    let body = client.me_start().await.unwrap().unwrap();
    assert_eq!(body["data"]["devices"][0]["id"], 1);
}

#[tokio::test]
async fn test_login_sends_device_id() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({
            "email_address": EMAIL,
            "password": "hunter2",
            "device_id": client.device_id(),
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": { "token": token('f') } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let credential = client.authenticate().await.unwrap();
    assert_eq!(credential.expose(), token('f'));
}

#[tokio::test]
async fn test_login_rejected() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = client.me_start().await;
    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
    // The account email never ends up in error text.
    assert!(!result.unwrap_err().to_string().contains(EMAIL));
}

#[tokio::test]
async fn test_login_unexpected_status_is_protocol_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let result = client.me_start().await;
    assert!(
        matches!(result, Err(Error::Protocol { status: 503, .. })),
        "expected Protocol error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_login_without_token_field() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": {} })))
        .mount(&server)
        .await;

    let result = client.authenticate().await;
    assert!(matches!(result, Err(Error::Authentication { .. })));
}

#[tokio::test]
async fn test_no_credentials_and_no_token() {
    let server = MockServer::start().await;
    let base_url = Url::parse(&format!("{}/api", server.uri())).unwrap();
    let client = SureClient::with_client(reqwest::Client::new(), base_url, None);

    let result = client.me_start().await;
    assert!(matches!(result, Err(Error::Authentication { .. })));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_implausible_token_source_is_ignored() {
    struct Fixed(&'static str);

    impl TokenSource for Fixed {
        fn resolve(&self) -> Option<SecretString> {
            Some(SecretString::from(self.0.to_string()))
        }
    }

    let (server, client) = setup().await;
    let client = client.with_token_source(&Fixed("not-a-real-token"));
    mount_login(&server, 'f', 1).await;

    Mock::given(method("GET"))
        .and(path("/api/me/start"))
        .and(header("authorization", bearer('f').as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(start_body()))
        .mount(&server)
        .await;

    assert!(client.me_start().await.unwrap().is_some());
}

// ── 401 retry protocol ──────────────────────────────────────────────

#[tokio::test]
async fn test_single_reauth_on_401() {
    let (server, client) = setup_with_token().await;
    mount_login(&server, 'f', 1).await;

    Mock::given(method("GET"))
        .and(path("/api/me/start"))
        .and(header("authorization", bearer('s').as_str()))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/me/start"))
        .and(header("authorization", bearer('f').as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(start_body()))
        .expect(1)
        .mount(&server)
        .await;

    let body = client.me_start().await.unwrap().unwrap();
    assert_eq!(*body, start_body());
}

#[tokio::test]
async fn test_second_401_surfaces_authentication_error() {
    let (server, client) = setup_with_token().await;
    mount_login(&server, 'f', 1).await;

    Mock::given(method("GET"))
        .and(path("/api/me/start"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    let result = client.me_start().await;
    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_retry_preserves_method_and_body() {
    let (server, client) = setup_with_token().await;
    mount_login(&server, 'f', 1).await;

    Mock::given(method("PUT"))
        .and(path("/api/device/42/control"))
        .and(header("authorization", bearer('s').as_str()))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/device/42/control"))
        .and(header("authorization", bearer('f').as_str()))
        .and(body_json(json!({ "locking": 3 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "locking": 3 } })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/device/42/control"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let body = client.set_lock_state(42, 3).await.unwrap().unwrap();
    assert_eq!(body["data"]["locking"], 3);
}

#[tokio::test]
async fn test_concurrent_401s_share_one_login() {
    let (server, client) = setup_with_token().await;
    mount_login(&server, 'f', 1).await;

    Mock::given(method("GET"))
        .and(path("/api/me/start"))
        .and(header("authorization", bearer('s').as_str()))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/me/start"))
        .and(header("authorization", bearer('f').as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(start_body()))
        .mount(&server)
        .await;

    let results = join_all((0..8).map(|_| client.me_start())).await;
    assert!(results.iter().all(|r| matches!(r, Ok(Some(_)))));
}

// ── Conditional requests ────────────────────────────────────────────

#[tokio::test]
async fn test_304_serves_cached_body() {
    let (server, client) = setup_with_token().await;

    Mock::given(method("GET"))
        .and(path("/api/me/start"))
        .and(header("if-none-match", "\"v1\""))
        .respond_with(ResponseTemplate::new(304))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/me/start"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("ETag", "\"v1\"")
                .set_body_json(start_body()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let first = client.me_start().await.unwrap().unwrap();
    let second = client.me_start().await.unwrap().unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(
        serde_json::to_vec(&*first).unwrap(),
        serde_json::to_vec(&*second).unwrap()
    );
    assert_eq!(client.cache().len(), 1);
}

#[tokio::test]
async fn test_etag_sent_only_after_fetch_of_same_url() {
    let (server, client) = setup_with_token().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("ETag", "\"v1\"")
                .set_body_json(json!({ "data": [] })),
        )
        .mount(&server)
        .await;

    client.household_timeline(7, 1).await.unwrap();
    client.household_timeline(7, 2).await.unwrap();
    client.household_timeline(7, 1).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);

    let etag = |i: usize| {
        requests[i]
            .headers
            .get("etag")
            .map(|v| v.to_str().unwrap().to_owned())
    };
    assert_eq!(etag(0), None);
    assert_eq!(etag(1), None);
    assert_eq!(etag(2).as_deref(), Some("v1"));
    assert_eq!(
        requests[2].headers.get("if-none-match").unwrap(),
        "\"v1\""
    );
}

#[tokio::test]
async fn test_weak_etag_revalidates_verbatim() {
    let (server, client) = setup_with_token().await;

    Mock::given(method("GET"))
        .and(path("/api/me/start"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("ETag", "W/\"abc\"")
                .set_body_json(start_body()),
        )
        .mount(&server)
        .await;

    client.me_start().await.unwrap();
    client.me_start().await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].headers.get("if-none-match").unwrap(), "W/\"abc\"");
    assert_eq!(requests[1].headers.get("etag").unwrap(), "abc");
}

#[tokio::test]
async fn test_control_commands_are_unconditional() {
    let (server, client) = setup_with_token().await;

    Mock::given(method("PUT"))
        .and(path("/api/device/42/control"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("ETag", "\"c1\"")
                .set_body_json(json!({ "data": { "locking": 1 } })),
        )
        .mount(&server)
        .await;

    client.set_lock_state(42, 1).await.unwrap();
    client.set_lock_state(42, 1).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.headers.get("etag").is_none()));
}

// ── Soft and hard failures ──────────────────────────────────────────

#[tokio::test]
async fn test_server_error_degrades_to_none() {
    let (server, client) = setup_with_token().await;

    Mock::given(method("GET"))
        .and(path("/api/me/start"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    assert!(client.me_start().await.unwrap().is_none());
    assert!(client.cache().is_empty());
}

#[tokio::test]
async fn test_timeout_is_not_retried() {
    let (server, client) = setup_with_token().await;
    let client = client.with_timeout(Duration::from_millis(100));

    Mock::given(method("GET"))
        .and(path("/api/me/start"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(start_body())
                .set_delay(Duration::from_secs(2)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let result = client.me_start().await;
    assert!(
        matches!(result, Err(Error::Timeout { .. })),
        "expected Timeout error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_notification_gets_double_timeout() {
    let (server, client) = setup_with_token().await;
    let client = client.with_timeout(Duration::from_millis(300));

    Mock::given(method("GET"))
        .and(path("/api/notification"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": [] }))
                .set_delay(Duration::from_millis(450)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let body = client.notification().await.unwrap().unwrap();
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_refused_connection_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let base_url = Url::parse(&format!("http://127.0.0.1:{port}/api")).unwrap();
    let client = SureClient::with_client(reqwest::Client::new(), base_url, None)
        .with_token(SecretString::from(token('s')));

    let err = client.me_start().await.unwrap_err();
    assert!(
        matches!(err, Error::Transport(_)),
        "expected Transport error, got: {err:?}"
    );
    assert!(err.is_connection());
}

#[tokio::test]
async fn test_invalid_json_is_deserialization_error() {
    let (server, client) = setup_with_token().await;

    Mock::given(method("GET"))
        .and(path("/api/me/start"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let result = client.me_start().await;
    assert!(matches!(result, Err(Error::Deserialization { .. })));
}

// ── Endpoints ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_remove_device_tag_no_content() {
    let (server, client) = setup_with_token().await;

    Mock::given(method("DELETE"))
        .and(path("/api/device/42/tag/9"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    assert!(client.remove_device_tag(42, 9).await.unwrap().is_none());
}

#[tokio::test]
async fn test_add_device_tag() {
    let (server, client) = setup_with_token().await;

    Mock::given(method("PUT"))
        .and(path("/api/device/42/tag/9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "id": 9 } })))
        .expect(1)
        .mount(&server)
        .await;

    let body = client.add_device_tag(42, 9).await.unwrap().unwrap();
    assert_eq!(body["data"]["id"], 9);
}

#[tokio::test]
async fn test_set_curfew_body() {
    let (server, client) = setup_with_token().await;

    let curfew = json!({
        "curfew": [{ "lock_time": "21:30", "unlock_time": "07:05", "enabled": true }]
    });
    Mock::given(method("PUT"))
        .and(path("/api/device/42/control"))
        .and(body_json(&curfew))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": curfew })))
        .expect(1)
        .mount(&server)
        .await;

    client
        .set_curfew(
            42,
            NaiveTime::from_hms_opt(21, 30, 0).unwrap(),
            NaiveTime::from_hms_opt(7, 5, 0).unwrap(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_set_pet_position_body() {
    let (server, client) = setup_with_token().await;

    Mock::given(method("POST"))
        .and(path("/api/pet/5/position"))
        .and(body_json(json!({ "where": 2, "since": "2024-03-01 08:15:00" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "where": 2 } })))
        .expect(1)
        .mount(&server)
        .await;

    let since = Utc.with_ymd_and_hms(2024, 3, 1, 8, 15, 0).unwrap();
    client.set_pet_position(5, 2, since).await.unwrap();
}

#[tokio::test]
async fn test_pet_aggregate_report_range() {
    let (server, client) = setup_with_token().await;

    Mock::given(method("GET"))
        .and(path("/api/report/household/7/pet/5/aggregate"))
        .and(query_param("from", "2024-01-01"))
        .and(query_param("to", "2024-01-31"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": {} })))
        .expect(1)
        .mount(&server)
        .await;

    let range = (
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
    );
    assert!(
        client
            .pet_aggregate_report(7, 5, Some(range))
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn test_pets_expands_sub_resources() {
    let (server, client) = setup_with_token().await;

    Mock::given(method("GET"))
        .and(path("/api/pet"))
        .and(query_param("with[]", "photo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .expect(1)
        .mount(&server)
        .await;

    assert!(client.pets().await.unwrap().is_some());
}

#[tokio::test]
async fn test_notification_and_report_paths() {
    let (server, client) = setup_with_token().await;

    Mock::given(method("GET"))
        .and(path("/api/notification"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/report/household/7/pet/5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": {} })))
        .expect(1)
        .mount(&server)
        .await;

    assert!(client.notification().await.unwrap().is_some());
    assert!(client.report(7, Some(5)).await.unwrap().is_some());
}
