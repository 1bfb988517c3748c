//! Verification primitives for keyward.
//!
//! This crate handles:
//! - Decoding license and machine file certificates
//! - Ed25519 verification of signed keys, certificates and HTTP messages
//! - AES-256-GCM decryption with a SHA-256 derived key
//!
//! Nothing here talks to the network or reads the clock except
//! [`verify_message`], which has a clock-free [`verify_message_at`] twin.
//!
//! # Example
//!
//! ```no_run
//! use keyward_crypto::{Certificate, CertificateKind, PublicKey, decrypt_certificate, verify_certificate};
//!
//! # fn main() -> keyward_crypto::CryptoResult<()> {
//! let public_key = PublicKey::from_hex("e8601e48b69383ba520245fd07971e983d06d22c4257cfd82304601479cee788")?;
//! let text = std::fs::read_to_string("license.lic").unwrap_or_default();
//!
//! let cert = Certificate::parse_kind(&text, CertificateKind::License)?;
//! verify_certificate(&cert, CertificateKind::License, &public_key)?;
//! let dataset = decrypt_certificate(&cert, "LICENSE-KEY")?;
//! # let _ = dataset;
//! # Ok(())
//! # }
//! ```

mod certificate;
mod cipher;
mod error;
mod http_signature;
mod key;
mod signature;

pub use certificate::{Algorithm, Certificate, CertificateKind};
pub use cipher::{
    EncryptedData, NONCE_SIZE, SEGMENT_DELIMITER, TAG_SIZE, decrypt, decrypt_certificate, encrypt,
    seal,
};
pub use error::{CryptoError, CryptoResult};
pub use http_signature::{
    DATE_HEADER, DEFAULT_MAX_CLOCK_DRIFT, DIGEST_HEADER, Headers, HttpMessage, SIGNATURE_HEADER,
    SIGNED_HEADERS, SignatureParams, body_digest, format_http_date,
    parse_http_date, signing_string, verify_message, verify_message_at,
};
pub use key::{DerivedKey, KEY_SIZE, PublicKey, derive_key};
pub use signature::{
    KEY_SIGNING_PREFIX, URL_SAFE_LENIENT, verify_certificate, verify_detached, verify_signed_key,
};
