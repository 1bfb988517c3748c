//! Signed license keys.
//!
//! Keys signed with `ED25519_SIGN` have the format
//! `key/base64url(dataset).base64url(signature)`. The signature covers
//! the ASCII bytes `key/<encoded dataset>`, not the decoded JSON. The
//! dataset is whatever JSON the license's policy embeds.

use crate::error::{LicenseError, LicenseResult};
use crate::resource::{License, SCHEME_ED25519_SIGN};
use keyward_crypto::{CryptoError, PublicKey, verify_signed_key};
use serde::de::DeserializeOwned;

/// Verifies a signed key and returns its decoded dataset.
///
/// # Errors
///
/// `LicenseKeyMissing` for an empty key, `LicenseKeyNotGenuine` for a
/// malformed or forged one.
pub fn verify_license_key(key: &str, public_key: &PublicKey) -> LicenseResult<Vec<u8>> {
    if key.trim().is_empty() {
        return Err(LicenseError::LicenseKeyMissing);
    }

    verify_signed_key(key, public_key).map_err(|e| match e {
        CryptoError::NotGenuine => LicenseError::LicenseKeyNotGenuine,
        other => LicenseError::Crypto(other),
    })
}

impl License {
    /// Verifies the license key against the account public key.
    ///
    /// # Errors
    ///
    /// - `LicenseNotSigned` when the license has no scheme
    /// - `LicenseSchemeNotSupported` for schemes other than `ED25519_SIGN`
    /// - `LicenseKeyMissing` / `LicenseKeyNotGenuine` from key verification
    pub fn verify(&self, public_key: &PublicKey) -> LicenseResult<Vec<u8>> {
        match self.scheme.as_deref() {
            None | Some("") => Err(LicenseError::LicenseNotSigned),
            Some(SCHEME_ED25519_SIGN) => verify_license_key(&self.key, public_key),
            Some(other) => Err(LicenseError::LicenseSchemeNotSupported(other.to_string())),
        }
    }
}

/// A verified license key together with its embedded dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseKey {
    raw: String,
    dataset: Vec<u8>,
}

impl LicenseKey {
    /// Verifies `key` and keeps its dataset.
    pub fn parse(key: &str, public_key: &PublicKey) -> LicenseResult<Self> {
        let dataset = verify_license_key(key, public_key)?;
        Ok(Self {
            raw: key.trim().to_string(),
            dataset,
        })
    }

    /// Returns the key as issued.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the raw dataset bytes.
    #[must_use]
    pub fn dataset(&self) -> &[u8] {
        &self.dataset
    }

    /// Deserializes the dataset.
    pub fn json<T: DeserializeOwned>(&self) -> LicenseResult<T> {
        Ok(serde_json::from_slice(&self.dataset)?)
    }
}
