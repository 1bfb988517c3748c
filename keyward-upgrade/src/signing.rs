//! Ed25519ph release signatures and SHA-512 checksums.
//!
//! A release artifact is signed with the publisher's personal key over
//! the SHA-512 prehash of the binary, with the product id as the
//! Ed25519ph context. A signature for one product does not verify for
//! another. Checksums are unpadded standard base64 of SHA-512.

use base64::{
    Engine,
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use ed25519_dalek::{SIGNATURE_LENGTH, Signature, SigningKey};
use keyward_crypto::PublicKey;
use sha2::{Digest, Sha512};

use crate::error::{UpgradeError, UpgradeResult};

/// Standard base64, unpadded on encode, padding-indifferent on decode.
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A detached Ed25519ph release signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseSignature(Signature);

impl ReleaseSignature {
    /// Decodes a base64 signature.
    ///
    /// # Errors
    ///
    /// `SignatureInvalid` unless it decodes to exactly 64 bytes.
    pub fn from_base64(encoded: &str) -> UpgradeResult<Self> {
        let bytes = STANDARD_LENIENT
            .decode(encoded.trim())
            .map_err(|_| UpgradeError::SignatureInvalid)?;
        let bytes: [u8; SIGNATURE_LENGTH] = bytes
            .try_into()
            .map_err(|_| UpgradeError::SignatureInvalid)?;
        Ok(Self(Signature::from_bytes(&bytes)))
    }

    /// Encodes as unpadded base64.
    #[must_use]
    pub fn to_base64(&self) -> String {
        STANDARD_LENIENT.encode(self.0.to_bytes())
    }
}

fn prehash(binary: &[u8]) -> Sha512 {
    let mut hasher = Sha512::new();
    hasher.update(binary);
    hasher
}

/// Verifies a release signature over `binary` for `context`.
///
/// # Errors
///
/// `SignatureInvalid` for a wrong key, binary, context or signature.
pub fn verify_release(
    public_key: &PublicKey,
    context: &str,
    binary: &[u8],
    signature: &ReleaseSignature,
) -> UpgradeResult<()> {
    public_key
        .verifying_key()
        .verify_prehashed(prehash(binary), Some(context.as_bytes()), &signature.0)
        .map_err(|_| UpgradeError::SignatureInvalid)
}

/// Signs `binary` for `context` the way release tooling does.
///
/// # Errors
///
/// `SignatureInvalid` if the context is longer than 255 bytes.
pub fn sign_release(
    signing_key: &SigningKey,
    context: &str,
    binary: &[u8],
) -> UpgradeResult<ReleaseSignature> {
    signing_key
        .sign_prehashed(prehash(binary), Some(context.as_bytes()))
        .map(ReleaseSignature)
        .map_err(|_| UpgradeError::SignatureInvalid)
}

/// Returns the unpadded base64 SHA-512 checksum of `binary`.
#[must_use]
pub fn checksum(binary: &[u8]) -> String {
    STANDARD_LENIENT.encode(Sha512::digest(binary))
}

/// Checks `binary` against a base64 SHA-512 checksum.
///
/// # Errors
///
/// `ChecksumInvalid` if `expected` is not base64, `ChecksumMismatch` if
/// the digests differ.
pub fn verify_checksum(expected: &str, binary: &[u8]) -> UpgradeResult<()> {
    let expected = STANDARD_LENIENT
        .decode(expected.trim())
        .map_err(|_| UpgradeError::ChecksumInvalid)?;

    if Sha512::digest(binary).as_slice() == expected.as_slice() {
        Ok(())
    } else {
        Err(UpgradeError::ChecksumMismatch)
    }
}
