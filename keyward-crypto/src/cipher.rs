//! Certificate decryption using AES-256-GCM.
//!
//! An encrypted `enc` field is three base64 segments joined by `.`:
//! `ciphertext.nonce.tag`. The key is `SHA-256(secret)`; there is no
//! associated data.

use crate::certificate::{Algorithm, Certificate};
use crate::error::{CryptoError, CryptoResult};
use crate::key::{DerivedKey, derive_key};
use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use rand::RngCore;

/// Size of nonce in bytes (96 bits for AES-GCM).
pub const NONCE_SIZE: usize = 12;

/// Size of authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Separator between the ciphertext, nonce and tag segments.
pub const SEGMENT_DELIMITER: char = '.';

/// The three decoded segments of an encrypted payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedData {
    /// The ciphertext without its tag.
    pub ciphertext: Vec<u8>,
    /// The nonce (initialization vector).
    pub nonce: [u8; NONCE_SIZE],
    /// The GCM authentication tag.
    pub tag: Vec<u8>,
}

impl EncryptedData {
    /// Splits and decodes an `enc` field.
    ///
    /// # Errors
    ///
    /// Returns `CertificateInvalid` unless there are exactly three valid
    /// base64 segments and the nonce is 12 bytes.
    pub fn parse(enc: &str) -> CryptoResult<Self> {
        let mut segments = enc.split(SEGMENT_DELIMITER);
        let (Some(ciphertext), Some(nonce), Some(tag), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(CryptoError::CertificateInvalid);
        };

        let ciphertext = decode_segment(ciphertext)?;
        let nonce: [u8; NONCE_SIZE] = decode_segment(nonce)?
            .try_into()
            .map_err(|_| CryptoError::CertificateInvalid)?;
        let tag = decode_segment(tag)?;

        Ok(Self {
            ciphertext,
            nonce,
            tag,
        })
    }

    /// Encodes back to the `ciphertext.nonce.tag` form.
    pub fn to_enc(&self) -> String {
        format!(
            "{}{SEGMENT_DELIMITER}{}{SEGMENT_DELIMITER}{}",
            STANDARD.encode(&self.ciphertext),
            STANDARD.encode(self.nonce),
            STANDARD.encode(&self.tag)
        )
    }
}

fn decode_segment(segment: &str) -> CryptoResult<Vec<u8>> {
    STANDARD
        .decode(segment)
        .map_err(|_| CryptoError::CertificateInvalid)
}

/// Decrypts with AES-256-GCM.
///
/// Every authentication failure is the same opaque `Decryption` error;
/// no partial plaintext is ever returned.
pub fn decrypt(key: &DerivedKey, encrypted: &EncryptedData) -> CryptoResult<Vec<u8>> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let nonce = Nonce::from_slice(&encrypted.nonce);

    // aes-gcm expects the tag appended to the ciphertext.
    let mut sealed = Vec::with_capacity(encrypted.ciphertext.len() + encrypted.tag.len());
    sealed.extend_from_slice(&encrypted.ciphertext);
    sealed.extend_from_slice(&encrypted.tag);

    cipher
        .decrypt(nonce, sealed.as_ref())
        .map_err(|_| CryptoError::Decryption)
}

/// Decrypts a certificate's payload with a key derived from `secret`.
///
/// # Errors
///
/// - `UnsupportedAlgorithm` for RSA and unknown algorithms
/// - `NotEncrypted` for `base64+ed25519` certificates
/// - `CertificateInvalid` for malformed segments
/// - `Decryption` when authentication fails
pub fn decrypt_certificate(cert: &Certificate, secret: &str) -> CryptoResult<Vec<u8>> {
    match cert.alg() {
        Algorithm::Aes256GcmEd25519 => {}
        Algorithm::Base64Ed25519 => return Err(CryptoError::NotEncrypted),
        other => return Err(CryptoError::UnsupportedAlgorithm(other.to_string())),
    }

    let encrypted = EncryptedData::parse(cert.enc())?;
    let key = derive_key(secret);
    decrypt(&key, &encrypted)
}

/// Encrypts `plaintext` for `secret`, returning an `enc` field.
///
/// This is the issuer side of [`decrypt_certificate`], used to build
/// fixtures and offline tooling.
pub fn seal(secret: &str, plaintext: &[u8]) -> CryptoResult<String> {
    let key = derive_key(secret);
    let mut nonce = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce);

    Ok(encrypt(&key, nonce, plaintext)?.to_enc())
}

/// Encrypts with an explicit nonce.
pub fn encrypt(
    key: &DerivedKey,
    nonce: [u8; NONCE_SIZE],
    plaintext: &[u8],
) -> CryptoResult<EncryptedData> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let mut sealed = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| CryptoError::Encryption)?;

    let tag = sealed.split_off(sealed.len() - TAG_SIZE);

    Ok(EncryptedData {
        ciphertext: sealed,
        nonce,
        tag,
    })
}
