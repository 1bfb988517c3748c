//! Shared test helpers for license tests.

#![allow(dead_code)]

use base64::{
    Engine,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use ed25519_dalek::{Signer, SigningKey};
use keyward_crypto::{Algorithm, Certificate, CertificateKind, PublicKey, seal};
use keyward_license::ClientConfig;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

pub const LICENSE_KEY: &str = "C1B6DE-39A6E3-DE1529-8559A0-4AF593-V3";
pub const FINGERPRINT: &str = "3a9f6e7c1d5b42e8a0f4c6b8d2e1f0a9";

/// Routes crate logs to the test output, filtered by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Returns a deterministic Ed25519 key pair from a fixed seed.
pub fn test_keypair() -> (SigningKey, PublicKey) {
    let seed: [u8; 32] = [
        1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24,
        25, 26, 27, 28, 29, 30, 31, 32,
    ];
    let signing_key = SigningKey::from_bytes(&seed);
    let public_key = PublicKey::from(signing_key.verifying_key());
    (signing_key, public_key)
}

/// Returns a second, unrelated key pair.
pub fn other_keypair() -> (SigningKey, PublicKey) {
    let signing_key = SigningKey::from_bytes(&[7u8; 32]);
    let public_key = PublicKey::from(signing_key.verifying_key());
    (signing_key, public_key)
}

/// A config trusting [`test_keypair`].
pub fn test_config() -> ClientConfig {
    let (_, public_key) = test_keypair();
    ClientConfig {
        account: "test".into(),
        product: "prod-1".into(),
        public_key: public_key.to_hex(),
        ..ClientConfig::default()
    }
}

/// A fixed "now" all dataset fixtures are relative to.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

/// Creates a signed key: `key/base64url(payload).base64url(signature)`.
pub fn sign_key(signing_key: &SigningKey, payload_json: &str) -> String {
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload_json.as_bytes());
    let signature = signing_key.sign(format!("key/{payload_b64}").as_bytes());
    let sig_b64 = URL_SAFE_NO_PAD.encode(signature.to_bytes());
    format!("key/{payload_b64}.{sig_b64}")
}

fn sign_enc(signing_key: &SigningKey, kind: CertificateKind, enc: &str) -> String {
    let message = format!("{}/{}", kind.signing_prefix(), enc);
    STANDARD.encode(signing_key.sign(message.as_bytes()).to_bytes())
}

/// Issues an encrypted certificate text over `dataset` for `secret`.
pub fn issue_encrypted(
    signing_key: &SigningKey,
    kind: CertificateKind,
    secret: &str,
    dataset: &Value,
) -> String {
    let enc = seal(secret, dataset.to_string().as_bytes()).unwrap();
    let sig = sign_enc(signing_key, kind, &enc);
    Certificate::new(Algorithm::Aes256GcmEd25519, enc, sig).encode(kind)
}

/// Issues an unencrypted certificate text over `dataset`.
pub fn issue_plain(signing_key: &SigningKey, kind: CertificateKind, dataset: &Value) -> String {
    let enc = STANDARD.encode(dataset.to_string());
    let sig = sign_enc(signing_key, kind, &enc);
    Certificate::new(Algorithm::Base64Ed25519, enc, sig).encode(kind)
}

/// Dataset meta issued at `issued` with `ttl` seconds to live.
pub fn meta(issued: DateTime<Utc>, ttl: i64) -> Value {
    json!({
        "issued": issued.to_rfc3339(),
        "expiry": (issued + Duration::seconds(ttl)).to_rfc3339(),
        "ttl": ttl,
    })
}

pub fn license_resource(id: &str) -> Value {
    json!({
        "id": id,
        "type": "licenses",
        "attributes": {
            "name": "Acme Pro",
            "key": LICENSE_KEY,
            "scheme": null,
            "status": "ACTIVE",
            "requireHeartbeat": false,
            "metadata": { "seats": 5, "tier": "pro" }
        },
        "relationships": {
            "policy": { "data": { "type": "policies", "id": "pol-1" } }
        }
    })
}

pub fn machine_resource(id: &str, heartbeat_status: &str) -> Value {
    json!({
        "id": id,
        "type": "machines",
        "attributes": {
            "fingerprint": FINGERPRINT,
            "hostname": "build-01",
            "platform": "linux",
            "cores": 8,
            "requireHeartbeat": true,
            "heartbeatStatus": heartbeat_status,
            "heartbeatDuration": 600,
            "metadata": {}
        },
        "relationships": {
            "license": { "data": { "type": "licenses", "id": "lic-1" } }
        }
    })
}

pub fn process_resource(id: &str, status: &str, interval: u64) -> Value {
    json!({
        "id": id,
        "type": "processes",
        "attributes": { "pid": "4242", "status": status, "interval": interval },
        "relationships": {
            "machine": { "data": { "type": "machines", "id": "mach-1" } }
        }
    })
}

pub fn entitlement_resource(id: &str, code: &str) -> Value {
    json!({
        "id": id,
        "type": "entitlements",
        "attributes": { "name": code, "code": code }
    })
}

/// A license file dataset issued at `issued`.
pub fn license_dataset(issued: DateTime<Utc>, ttl: i64) -> Value {
    json!({
        "data": license_resource("lic-1"),
        "included": [
            entitlement_resource("ent-1", "FEATURE_A"),
            entitlement_resource("ent-2", "FEATURE_B"),
            { "id": "pol-1", "type": "policies", "attributes": { "name": "Pro" } }
        ],
        "meta": meta(issued, ttl),
    })
}

/// A machine file dataset issued at `issued`.
pub fn machine_dataset(issued: DateTime<Utc>, ttl: i64) -> Value {
    json!({
        "data": machine_resource("mach-1", "ALIVE"),
        "included": [
            license_resource("lic-1"),
            entitlement_resource("ent-1", "FEATURE_A"),
            {
                "id": "comp-1",
                "type": "components",
                "attributes": { "fingerprint": "gpu-0", "name": "GPU" },
                "relationships": { "machine": { "data": { "type": "machines", "id": "mach-1" } } }
            }
        ],
        "meta": meta(issued, ttl),
    })
}

/// A validation response document.
pub fn validation_document(valid: bool, code: &str) -> Value {
    json!({
        "data": license_resource("lic-1"),
        "meta": {
            "ts": "2026-03-01T12:00:00Z",
            "valid": valid,
            "detail": format!("validation returned {code}"),
            "code": code,
            "scope": { "fingerprint": FINGERPRINT }
        }
    })
}

/// A JSON:API error document.
pub fn error_document(code: &str) -> Value {
    json!({ "errors": [{ "title": "error", "detail": format!("{code} detail"), "code": code }] })
}

/// Builds the signature headers the API attaches to a response.
pub fn signed_headers(
    signing_key: &SigningKey,
    method: &str,
    host: &str,
    target: &str,
    body: &[u8],
    date: DateTime<Utc>,
) -> keyward_crypto::Headers {
    let date = keyward_crypto::format_http_date(date);
    let digest = keyward_crypto::body_digest(body);
    let signing = format!(
        "(request-target): {} {target}\nhost: {host}\ndate: {date}\ndigest: {digest}",
        method.to_ascii_lowercase()
    );
    let signature = STANDARD.encode(signing_key.sign(signing.as_bytes()).to_bytes());

    let mut headers = keyward_crypto::Headers::new();
    headers.insert("Date", date);
    headers.insert("Digest", digest);
    headers.insert(
        "Keygen-Signature",
        format!(
            r#"keyid="test", algorithm="ed25519", signature="{signature}", headers="(request-target) host date digest""#
        ),
    );
    headers
}
