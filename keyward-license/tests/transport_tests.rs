mod common;

use chrono::{Duration, Utc};
use common::*;
use keyward_crypto::{CryptoError, Headers};
use keyward_license::mock::MockTransport;
use keyward_license::{
    ClientConfig, HttpTransport, LicenseError, Machine, Method, Transport, account_url,
    verify_request_at,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn server_config(server: &MockServer) -> ClientConfig {
    ClientConfig {
        api_url: server.uri(),
        token: Some("prod-token".into()),
        ..test_config()
    }
}

fn unsigned_config(server: &MockServer) -> ClientConfig {
    ClientConfig {
        verify_responses: false,
        ..server_config(server)
    }
}

fn host_of(server: &MockServer) -> String {
    server.address().to_string()
}

// ── URLs ─────────────────────────────────────────────────────────

#[test]
fn account_url_joins_segments() {
    let config = ClientConfig {
        api_url: "https://licensing.example.com/".into(),
        ..test_config()
    };
    let url = account_url(&config, "/machines/m-1/actions/ping").unwrap();
    assert_eq!(
        url.as_str(),
        "https://licensing.example.com/v1/accounts/test/machines/m-1/actions/ping"
    );
}

#[test]
fn authorization_prefers_token() {
    let config = ClientConfig {
        token: Some("tok".into()),
        license_key: Some("KEY".into()),
        ..test_config()
    };
    assert_eq!(config.authorization().as_deref(), Some("Bearer tok"));

    let config = ClientConfig {
        token: None,
        ..config
    };
    assert_eq!(config.authorization().as_deref(), Some("License KEY"));

    assert_eq!(test_config().authorization(), None);
}

// ── HTTP transport ───────────────────────────────────────────────

#[tokio::test]
async fn sends_jsonapi_headers_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts/test/licenses/lic-1/actions/validate"))
        .and(header("accept", "application/vnd.api+json"))
        .and(header("content-type", "application/vnd.api+json"))
        .and(header("authorization", "Bearer prod-token"))
        .and(header("keygen-accept-signature", r#"algorithm="ed25519""#))
        .and(body_json(json!({ "meta": { "scope": {} } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(validation_document(true, "VALID")))
        .expect(1)
        .mount(&server)
        .await;

    let transport = HttpTransport::new(unsigned_config(&server)).unwrap();
    let response = transport
        .call(
            Method::Post,
            "licenses/lic-1/actions/validate",
            Some(json!({ "meta": { "scope": {} } })),
        )
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.target(), "/v1/accounts/test/licenses/lic-1/actions/validate");
    assert_eq!(response.host(), host_of(&server));
}

#[tokio::test]
async fn license_key_auth_when_no_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("authorization", "License KEY-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": machine_resource("mach-1", "ALIVE")
        })))
        .mount(&server)
        .await;

    let config = ClientConfig {
        token: None,
        license_key: Some("KEY-123".into()),
        ..unsigned_config(&server)
    };
    let transport = HttpTransport::new(config).unwrap();
    let machine: Machine = transport
        .call(Method::Get, "machines/mach-1", None)
        .await
        .unwrap()
        .primary()
        .unwrap();

    assert_eq!(machine.id, "mach-1");
    assert_eq!(machine.heartbeat_duration, Some(600));
}

#[tokio::test]
async fn request_keeps_unsuccessful_responses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_json(error_document("NOT_FOUND")))
        .mount(&server)
        .await;

    let transport = HttpTransport::new(unsigned_config(&server)).unwrap();
    let response = transport.request(Method::Get, "licenses/x", None).await.unwrap();
    assert_eq!(response.status, 404);
    assert!(!response.is_success());
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    let config = ClientConfig {
        api_url: "http://127.0.0.1:9".into(),
        verify_responses: false,
        request_timeout: std::time::Duration::from_secs(2),
        ..test_config()
    };
    let transport = HttpTransport::new(config).unwrap();

    let err = transport.request(Method::Get, "licenses/x", None).await.unwrap_err();
    assert!(matches!(err, LicenseError::Network(_)));
}

#[test]
fn malformed_public_key_fails_construction() {
    let config = ClientConfig {
        public_key: "zz".into(),
        ..test_config()
    };
    assert!(matches!(
        HttpTransport::new(config),
        Err(LicenseError::Crypto(CryptoError::PublicKeyInvalid))
    ));
}

// ── Error classification ─────────────────────────────────────────

async fn classify(status: u16, code: &str, extra_header: Option<(&str, &str)>) -> LicenseError {
    let server = MockServer::start().await;
    let mut template = ResponseTemplate::new(status).set_body_json(error_document(code));
    if let Some((name, value)) = extra_header {
        template = template.insert_header(name, value);
    }
    Mock::given(method("POST")).respond_with(template).mount(&server).await;

    let transport = HttpTransport::new(unsigned_config(&server)).unwrap();
    transport.call(Method::Post, "machines", None).await.unwrap_err()
}

#[tokio::test]
async fn api_errors_are_classified() {
    assert!(matches!(
        classify(422, "FINGERPRINT_TAKEN", None).await,
        LicenseError::MachineAlreadyActivated
    ));
    assert!(matches!(
        classify(422, "MACHINE_LIMIT_EXCEEDED", None).await,
        LicenseError::MachineLimitExceeded
    ));
    assert!(matches!(
        classify(422, "MACHINE_PROCESS_LIMIT_EXCEEDED", None).await,
        LicenseError::ProcessLimitExceeded
    ));
    assert!(matches!(
        classify(422, "PROCESS_HEARTBEAT_DEAD", None).await,
        LicenseError::HeartbeatDead
    ));
    assert!(matches!(
        classify(401, "TOKEN_INVALID", None).await,
        LicenseError::LicenseTokenInvalid
    ));
    assert!(matches!(
        classify(401, "LICENSE_INVALID", None).await,
        LicenseError::LicenseKeyInvalid
    ));
    assert!(matches!(
        classify(403, "FORBIDDEN", None).await,
        LicenseError::NotAuthorized
    ));
    assert!(matches!(classify(404, "NOT_FOUND", None).await, LicenseError::NotFound));
}

#[tokio::test]
async fn rate_limit_carries_retry_after() {
    let err = classify(429, "TOO_MANY_REQUESTS", Some(("Retry-After", "30"))).await;
    assert!(err.is_rate_limited());
    assert_eq!(err.retry_after(), Some(std::time::Duration::from_secs(30)));
}

#[tokio::test]
async fn unknown_errors_keep_status_and_code() {
    match classify(500, "INTERNAL", None).await {
        LicenseError::Api {
            status,
            code,
            detail,
        } => {
            assert_eq!(status, 500);
            assert_eq!(code.as_deref(), Some("INTERNAL"));
            assert_eq!(detail.as_deref(), Some("INTERNAL detail"));
        }
        other => panic!("expected api error, got {other:?}"),
    }
}

// ── Response signatures ──────────────────────────────────────────

async fn signed_server(body: &[u8], signed_body: &[u8], date: chrono::DateTime<Utc>) -> MockServer {
    let server = MockServer::start().await;
    let (sk, _) = test_keypair();
    let headers = signed_headers(
        &sk,
        "GET",
        &host_of(&server),
        "/v1/accounts/test/licenses/lic-1",
        signed_body,
        date,
    );

    let mut template = ResponseTemplate::new(200).set_body_raw(body.to_vec(), "application/vnd.api+json");
    for (name, value) in headers.iter() {
        template = template.insert_header(name, value);
    }
    Mock::given(method("GET"))
        .and(path("/v1/accounts/test/licenses/lic-1"))
        .respond_with(template)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn signed_response_is_accepted() {
    let body = json!({ "data": license_resource("lic-1") }).to_string();
    let server = signed_server(body.as_bytes(), body.as_bytes(), Utc::now()).await;

    let transport = HttpTransport::new(server_config(&server)).unwrap();
    let response = transport.call(Method::Get, "licenses/lic-1", None).await.unwrap();
    assert_eq!(response.primary::<keyward_license::License>().unwrap().id, "lic-1");
}

#[tokio::test]
async fn tampered_response_is_rejected() {
    let body = json!({ "data": license_resource("lic-1") }).to_string();
    let forged = body.replace("Acme Pro", "Acme Enterprise");
    let server = signed_server(forged.as_bytes(), body.as_bytes(), Utc::now()).await;

    let transport = HttpTransport::new(server_config(&server)).unwrap();
    let err = transport.call(Method::Get, "licenses/lic-1", None).await.unwrap_err();
    assert!(matches!(err, LicenseError::Crypto(CryptoError::DigestInvalid)));
}

#[tokio::test]
async fn replayed_response_is_rejected() {
    let body = json!({ "data": license_resource("lic-1") }).to_string();
    let server = signed_server(body.as_bytes(), body.as_bytes(), Utc::now() - Duration::hours(1)).await;

    let transport = HttpTransport::new(server_config(&server)).unwrap();
    let err = transport.call(Method::Get, "licenses/lic-1", None).await.unwrap_err();
    assert!(matches!(err, LicenseError::Crypto(CryptoError::DateTooOld)));
}

#[tokio::test]
async fn unsigned_response_is_rejected_when_verifying() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": license_resource("lic-1") })))
        .mount(&server)
        .await;

    let transport = HttpTransport::new(server_config(&server)).unwrap();
    let err = transport.call(Method::Get, "licenses/lic-1", None).await.unwrap_err();
    assert!(matches!(err, LicenseError::Crypto(CryptoError::DigestMissing)));
}

// ── Webhooks ─────────────────────────────────────────────────────

#[test]
fn webhook_request_verifies_with_its_own_target() {
    let (sk, pk) = test_keypair();
    let url = Url::parse("https://hooks.example.com:8443/keygen?source=prod").unwrap();
    let body = br#"{"data":{"type":"webhook-events"}}"#;
    let headers = signed_headers(&sk, "POST", "hooks.example.com:8443", "/keygen?source=prod", body, now());

    verify_request_at("POST", &url, &headers, body, &pk, Some(std::time::Duration::from_secs(300)), now())
        .unwrap();

    let err = verify_request_at("PUT", &url, &headers, body, &pk, None, now()).unwrap_err();
    assert!(matches!(err, LicenseError::Crypto(CryptoError::SignatureInvalid)));

    let empty = Headers::new();
    let err = verify_request_at("POST", &url, &empty, body, &pk, None, now()).unwrap_err();
    assert!(matches!(err, LicenseError::Crypto(CryptoError::DigestMissing)));
}

// ── Mock transport ───────────────────────────────────────────────

#[tokio::test]
async fn mock_replays_script_then_fallback() {
    let mock = MockTransport::new();
    mock.push_json(201, json!({ "n": 1 }))
        .push_network_error("down");
    mock.set_fallback_json(200, json!({ "n": 0 }));

    let first = mock.request(Method::Post, "a", Some(json!({}))).await.unwrap();
    assert_eq!(first.status, 201);
    assert!(matches!(
        mock.request(Method::Get, "b", None).await,
        Err(LicenseError::Network(_))
    ));
    let third = mock.request(Method::Get, "c", None).await.unwrap();
    assert_eq!(third.json::<serde_json::Value>().unwrap()["n"], 0);

    let paths: Vec<_> = mock.calls().into_iter().map(|c| c.path).collect();
    assert_eq!(paths, vec!["a", "b", "c"]);
    assert_eq!(mock.call_count(), 3);
}

#[tokio::test]
async fn empty_mock_fails_requests() {
    let mock = MockTransport::default();
    assert!(matches!(
        mock.request(Method::Get, "x", None).await,
        Err(LicenseError::Network(_))
    ));
}
