//! Error types for the verification layer.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur while decoding, verifying or decrypting.
///
/// Variants are grouped by kind: malformed input, unsupported scheme,
/// not genuine, and the three independent HTTP message checks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Envelope framing, base64 or JSON could not be decoded.
    #[error("certificate is invalid")]
    CertificateInvalid,

    /// The certificate algorithm is recognized but not implemented.
    #[error("algorithm is not supported: {0}")]
    UnsupportedAlgorithm(String),

    /// The certificate is signed but carries no ciphertext.
    #[error("certificate is not encrypted")]
    NotEncrypted,

    /// An Ed25519 signature did not verify.
    #[error("signature is not genuine")]
    NotGenuine,

    /// Authenticated decryption failed (wrong secret or tampered data).
    #[error("decryption failed")]
    Decryption,

    /// No public key was supplied.
    #[error("public key is missing")]
    PublicKeyMissing,

    /// The public key is not valid hex or has the wrong length.
    #[error("public key is invalid")]
    PublicKeyInvalid,

    /// The `Digest` header is absent.
    #[error("digest is missing")]
    DigestMissing,

    /// The `Digest` header does not match the body.
    #[error("digest is invalid")]
    DigestInvalid,

    /// The `Date` header is absent or not an HTTP date.
    #[error("date is invalid")]
    DateInvalid,

    /// The `Date` header is older than the allowed clock drift.
    #[error("date is too old")]
    DateTooOld,

    /// The signature header is absent or lacks a signature.
    #[error("signature is missing")]
    SignatureMissing,

    /// The signature header names an algorithm other than ed25519.
    #[error("signature algorithm is not supported: {0}")]
    SignatureAlgorithmUnsupported(String),

    /// The HTTP message signature did not verify.
    #[error("signature is invalid")]
    SignatureInvalid,

    /// Encrypting a fixture failed.
    #[error("encryption failed")]
    Encryption,
}
