//! Ed25519 verification of signed license keys and certificates.
//!
//! Signed keys have the shape `key/<payload>.<signature>`, both segments
//! URL-safe base64. The signature covers the ASCII bytes `key/<payload>`
//! (the encoded payload, not the decoded JSON).
//!
//! Certificates are signed over `<kind>/<enc>` where `enc` is the raw,
//! still-encoded payload field.

use crate::certificate::{Certificate, CertificateKind};
use crate::error::{CryptoError, CryptoResult};
use crate::key::PublicKey;
use base64::{
    Engine,
    alphabet,
    engine::{
        DecodePaddingMode,
        general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD},
    },
};
use ed25519_dalek::{Signature, Verifier};
use tracing::debug;

/// Prefix segment every signed key must carry.
pub const KEY_SIGNING_PREFIX: &str = "key";

/// URL-safe base64 that accepts both padded and unpadded input.
pub const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Verifies raw signature bytes over `message`.
///
/// # Errors
///
/// Returns `NotGenuine` if the signature is malformed or does not verify.
pub fn verify_detached(
    public_key: &PublicKey,
    message: &[u8],
    signature: &[u8],
) -> CryptoResult<()> {
    let signature = Signature::from_slice(signature).map_err(|_| CryptoError::NotGenuine)?;

    public_key
        .verifying_key()
        .verify(message, &signature)
        .map_err(|_| CryptoError::NotGenuine)
}

/// Verifies a signed key and returns its decoded payload.
///
/// The payload is usually a JSON document; parsing it is left to the
/// caller.
///
/// # Errors
///
/// Returns `NotGenuine` for a missing `key/` prefix, undecodable
/// segments, or a signature that does not verify.
pub fn verify_signed_key(key: &str, public_key: &PublicKey) -> CryptoResult<Vec<u8>> {
    let (signing_data, encoded_sig) = key
        .trim()
        .split_once('.')
        .ok_or(CryptoError::NotGenuine)?;

    let (prefix, encoded_payload) = signing_data
        .split_once('/')
        .ok_or(CryptoError::NotGenuine)?;

    if prefix != KEY_SIGNING_PREFIX {
        debug!(prefix, "signed key has unexpected prefix");
        return Err(CryptoError::NotGenuine);
    }

    let signature = URL_SAFE_LENIENT
        .decode(encoded_sig)
        .map_err(|_| CryptoError::NotGenuine)?;

    let message = format!("{KEY_SIGNING_PREFIX}/{encoded_payload}");
    verify_detached(public_key, message.as_bytes(), &signature)?;

    URL_SAFE_LENIENT
        .decode(encoded_payload)
        .map_err(|_| CryptoError::NotGenuine)
}

/// Verifies that a certificate was signed by the holder of `public_key`.
///
/// Only the two Ed25519 algorithms are accepted. Anything else is
/// `UnsupportedAlgorithm`, which callers must keep distinct from
/// `NotGenuine`.
pub fn verify_certificate(
    cert: &Certificate,
    kind: CertificateKind,
    public_key: &PublicKey,
) -> CryptoResult<()> {
    if !cert.alg().is_ed25519() {
        return Err(CryptoError::UnsupportedAlgorithm(cert.alg().to_string()));
    }

    let signature = STANDARD
        .decode(cert.sig())
        .map_err(|_| CryptoError::NotGenuine)?;

    let message = format!("{}/{}", kind.signing_prefix(), cert.enc());
    verify_detached(public_key, message.as_bytes(), &signature).inspect_err(|_| {
        debug!(kind = kind.signing_prefix(), "certificate signature did not verify");
    })
}
