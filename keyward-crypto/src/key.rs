//! Key material.
//!
//! Symmetric keys are derived from a caller-supplied secret with a single
//! SHA-256 pass. This is not a password KDF: the issuing server derives
//! the same key the same way, so the derivation must stay byte-for-byte
//! identical for files to decrypt.

use crate::error::{CryptoError, CryptoResult};
use ed25519_dalek::{PUBLIC_KEY_LENGTH, VerifyingKey};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of symmetric keys in bytes (256 bits for AES-256).
pub const KEY_SIZE: usize = 32;

/// The AES-256-GCM key that opens one license or machine file.
///
/// Built by [`derive_key`] from the license key (and, for machine files,
/// the fingerprint). Wiped from memory when dropped and never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    bytes: [u8; KEY_SIZE],
}

impl DerivedKey {
    /// Wraps raw AES-256 key bytes, e.g. for issuing test certificates.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Raw key bytes for the AES-256-GCM cipher.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("aes256", &"<redacted>")
            .finish()
    }
}

/// Derives the AES-256 key for a secret: `SHA-256(secret)`.
///
/// For license files the secret is the license key; for machine files it
/// is the license key followed by the machine fingerprint.
pub fn derive_key(secret: &str) -> DerivedKey {
    let digest = Sha256::digest(secret.as_bytes());
    let mut bytes = [0u8; KEY_SIZE];
    bytes.copy_from_slice(&digest);
    DerivedKey::from_bytes(bytes)
}

/// An Ed25519 verify key supplied as hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    /// Parses a hex-encoded Ed25519 public key.
    ///
    /// An empty string is `PublicKeyMissing`; anything that does not
    /// decode to exactly 32 bytes of a valid curve point is
    /// `PublicKeyInvalid`.
    pub fn from_hex(encoded: &str) -> CryptoResult<Self> {
        let encoded = encoded.trim();
        if encoded.is_empty() {
            return Err(CryptoError::PublicKeyMissing);
        }

        let bytes = hex::decode(encoded).map_err(|_| CryptoError::PublicKeyInvalid)?;
        let bytes: [u8; PUBLIC_KEY_LENGTH] = bytes
            .try_into()
            .map_err(|_| CryptoError::PublicKeyInvalid)?;

        Self::from_bytes(&bytes)
    }

    /// Creates a public key from raw bytes.
    pub fn from_bytes(bytes: &[u8; PUBLIC_KEY_LENGTH]) -> CryptoResult<Self> {
        VerifyingKey::from_bytes(bytes)
            .map(Self)
            .map_err(|_| CryptoError::PublicKeyInvalid)
    }

    /// Returns the raw 32-byte key.
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        self.0.to_bytes()
    }

    /// Returns the key as lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_bytes())
    }

    /// Returns the underlying dalek key.
    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.0
    }
}

impl From<VerifyingKey> for PublicKey {
    fn from(key: VerifyingKey) -> Self {
        Self(key)
    }
}
