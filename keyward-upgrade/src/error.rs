//! Error types for the upgrade crate.

use keyward_crypto::CryptoError;
use keyward_license::LicenseError;
use thiserror::Error;

/// Upgrade-specific errors.
#[derive(Debug, Error)]
pub enum UpgradeError {
    /// API or license-layer failure.
    #[error(transparent)]
    License(#[from] LicenseError),

    /// Key parsing failure.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The personal key is the account's license-verification key.
    #[error("personal public key must not be the account public key")]
    PersonalKeyReused,

    /// The current version is the latest for the options given.
    #[error("no upgrades available (already up-to-date)")]
    NotAvailable,

    /// The artifact lookup returned no download URL.
    #[error("release has no download URL")]
    LocationMissing,

    /// The filename template is malformed or names an unknown variable.
    #[error("invalid filename template: {0}")]
    FilenameTemplate(String),

    /// The artifact checksum is not valid base64.
    #[error("artifact checksum is malformed")]
    ChecksumInvalid,

    /// The downloaded bytes do not match the artifact checksum.
    #[error("artifact checksum does not match")]
    ChecksumMismatch,

    /// The artifact signature did not verify under the personal key.
    #[error("artifact signature is invalid")]
    SignatureInvalid,

    /// The download failed.
    #[error("download failed: {0}")]
    Download(String),

    /// Writing the new binary failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl UpgradeError {
    /// Returns true if the downloaded artifact failed an integrity check.
    #[must_use]
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            Self::ChecksumInvalid | Self::ChecksumMismatch | Self::SignatureInvalid
        )
    }
}

impl From<reqwest::Error> for UpgradeError {
    fn from(e: reqwest::Error) -> Self {
        Self::Download(e.to_string())
    }
}

/// Result type for upgrade operations.
pub type UpgradeResult<T> = Result<T, UpgradeError>;
