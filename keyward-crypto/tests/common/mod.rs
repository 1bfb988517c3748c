//! Shared test helpers for crypto tests.

#![allow(dead_code)]

use base64::{
    Engine,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use ed25519_dalek::{Signer, SigningKey};
use keyward_crypto::{
    Algorithm, Certificate, CertificateKind, Headers, PublicKey, body_digest, format_http_date,
    seal,
};

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

/// Creates a signed key: `key/base64url(payload).base64url(signature)`.
pub fn sign_key(signing_key: &SigningKey, payload_json: &str) -> String {
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload_json.as_bytes());
    let signature = signing_key.sign(format!("key/{payload_b64}").as_bytes());
    let sig_b64 = URL_SAFE_NO_PAD.encode(signature.to_bytes());
    format!("key/{payload_b64}.{sig_b64}")
}

/// Signs `enc` the way the issuer does for `kind`.
pub fn sign_enc(signing_key: &SigningKey, kind: CertificateKind, enc: &str) -> String {
    let message = format!("{}/{}", kind.signing_prefix(), enc);
    STANDARD.encode(signing_key.sign(message.as_bytes()).to_bytes())
}

/// Issues an encrypted certificate over `dataset` for `secret`.
pub fn issue_encrypted(
    signing_key: &SigningKey,
    kind: CertificateKind,
    secret: &str,
    dataset: &[u8],
) -> Certificate {
    let enc = seal(secret, dataset).unwrap();
    let sig = sign_enc(signing_key, kind, &enc);
    Certificate::new(Algorithm::Aes256GcmEd25519, enc, sig)
}

/// Issues an unencrypted certificate over `dataset`.
pub fn issue_plain(signing_key: &SigningKey, kind: CertificateKind, dataset: &[u8]) -> Certificate {
    let enc = STANDARD.encode(dataset);
    let sig = sign_enc(signing_key, kind, &enc);
    Certificate::new(Algorithm::Base64Ed25519, enc, sig)
}

/// Builds headers for a signed message the way the API signs responses.
pub fn signed_headers(
    signing_key: &SigningKey,
    method: &str,
    host: &str,
    target: &str,
    body: &[u8],
    date: chrono::DateTime<chrono::Utc>,
) -> Headers {
    let date = format_http_date(date);
    let digest = body_digest(body);
    let signing = format!(
        "(request-target): {} {target}\nhost: {host}\ndate: {date}\ndigest: {digest}",
        method.to_ascii_lowercase()
    );
    let signature = STANDARD.encode(signing_key.sign(signing.as_bytes()).to_bytes());

    let mut headers = Headers::new();
    headers.insert("Date", date);
    headers.insert("Digest", digest);
    headers.insert(
        "Keygen-Signature",
        format!(
            r#"keyid="acme", algorithm="ed25519", signature="{signature}", headers="(request-target) host date digest""#
        ),
    );
    headers
}
