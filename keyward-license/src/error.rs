//! Error types for the licensing module.

use crate::dataset::{LicenseFileDataset, MachineFileDataset};
use keyward_crypto::CryptoError;
use thiserror::Error;

/// Licensing-specific errors.
///
/// Validation codes returned by the server collapse onto the `License*`,
/// `Validation*` and `Heartbeat*` variants. API failures that carry a
/// recognized error code get their own variant; the rest are `Api`.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// Verification primitive failure (public key, response signature).
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    // ── License keys ─────────────────────────────────────────────
    /// The license has no key to verify.
    #[error("license key is missing")]
    LicenseKeyMissing,

    /// The license key is signed with a scheme we cannot verify.
    #[error("license scheme is not supported: {0}")]
    LicenseSchemeNotSupported(String),

    /// The license key is not signed at all.
    #[error("license is not signed")]
    LicenseNotSigned,

    /// The license key signature did not verify.
    #[error("license key is not genuine")]
    LicenseKeyNotGenuine,

    // ── License files ────────────────────────────────────────────
    /// The license file could not be decoded.
    #[error("license file is invalid")]
    LicenseFileInvalid,

    /// The license file uses an algorithm we cannot verify or decrypt.
    #[error("license file is not supported: {0}")]
    LicenseFileNotSupported(String),

    /// The license file is signed but not encrypted.
    #[error("license file is not encrypted")]
    LicenseFileNotEncrypted,

    /// The license file signature or ciphertext is not authentic.
    #[error("license file is not genuine")]
    LicenseFileNotGenuine,

    /// The license file is past its expiry. The dataset is still readable.
    #[error("license file is expired")]
    LicenseFileExpired(Box<LicenseFileDataset>),

    /// No decryption secret was supplied for a license file.
    #[error("license file secret is missing")]
    LicenseFileSecretMissing,

    // ── Machine files ────────────────────────────────────────────
    /// The machine file could not be decoded.
    #[error("machine file is invalid")]
    MachineFileInvalid,

    /// The machine file uses an algorithm we cannot verify or decrypt.
    #[error("machine file is not supported: {0}")]
    MachineFileNotSupported(String),

    /// The machine file is signed but not encrypted.
    #[error("machine file is not encrypted")]
    MachineFileNotEncrypted,

    /// The machine file signature or ciphertext is not authentic.
    #[error("machine file is not genuine")]
    MachineFileNotGenuine,

    /// The machine file is past its expiry. The dataset is still readable.
    #[error("machine file is expired")]
    MachineFileExpired(Box<MachineFileDataset>),

    /// No decryption secret was supplied for a machine file.
    #[error("machine file secret is missing")]
    MachineFileSecretMissing,

    /// A dataset was issued further in the future than the allowed drift.
    #[error("system clock is out of sync")]
    SystemClockUnsynced,

    // ── Validation ───────────────────────────────────────────────
    /// No machine is activated for the license (or for this fingerprint).
    #[error("license is not activated")]
    LicenseNotActivated,

    /// The license is expired.
    #[error("license is expired")]
    LicenseExpired,

    /// The license is suspended.
    #[error("license is suspended")]
    LicenseSuspended,

    /// The license has more machines than its policy allows.
    #[error("license has too many machines")]
    LicenseTooManyMachines,

    /// The license has more cores than its policy allows.
    #[error("license has too many cores")]
    LicenseTooManyCores,

    /// The license has more processes than its policy allows.
    #[error("license has too many processes")]
    LicenseTooManyProcesses,

    /// Validation requires a fingerprint scope.
    #[error("validation fingerprint scope is missing")]
    ValidationFingerprintMissing,

    /// Validation requires a components scope.
    #[error("validation components scope is missing")]
    ValidationComponentsMissing,

    /// Validation requires a product scope.
    #[error("validation product scope is missing")]
    ValidationProductMissing,

    /// A component in scope is not activated for the machine.
    #[error("component is not activated")]
    ComponentNotActivated,

    /// The machine must start sending heartbeats.
    #[error("heartbeat is required")]
    HeartbeatRequired,

    /// The server considers the machine or process dead.
    #[error("heartbeat is dead")]
    HeartbeatDead,

    /// The license is invalid for any other reason.
    #[error("license is invalid")]
    LicenseInvalid,

    // ── Machines and processes ───────────────────────────────────
    /// The fingerprint is already activated.
    #[error("machine is already activated")]
    MachineAlreadyActivated,

    /// The license cannot activate more machines.
    #[error("machine limit has been exceeded")]
    MachineLimitExceeded,

    /// The machine cannot spawn more processes.
    #[error("process limit has been exceeded")]
    ProcessLimitExceeded,

    /// The machine was deleted server-side.
    #[error("machine no longer exists")]
    MachineNotFound,

    /// The process was deleted server-side.
    #[error("process no longer exists")]
    ProcessNotFound,

    // ── API ──────────────────────────────────────────────────────
    /// The bearer token was rejected.
    #[error("license token is invalid")]
    LicenseTokenInvalid,

    /// The license key used for authentication was rejected.
    #[error("license key is invalid")]
    LicenseKeyInvalid,

    /// The credentials lack permission for the request.
    #[error("not authorized to perform the request")]
    NotAuthorized,

    /// The requested resource does not exist.
    #[error("resource was not found")]
    NotFound,

    /// Too many requests.
    #[error("rate limit has been exceeded")]
    RateLimited {
        /// Seconds until the window resets, if the server said.
        retry_after_secs: Option<u64>,
    },

    /// Any other unsuccessful API response.
    #[error("api error: status={status} code={}", .code.as_deref().unwrap_or("-"))]
    Api {
        /// HTTP status.
        status: u16,
        /// First `errors[].code`, if any.
        code: Option<String>,
        /// First `errors[].detail`, if any.
        detail: Option<String>,
    },

    /// The request could not be sent or the response not read.
    #[error("network error: {0}")]
    Network(String),

    /// A request URL could not be built.
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A payload could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LicenseError {
    /// Returns true if a signature or authenticated decryption failed.
    #[must_use]
    pub fn is_not_genuine(&self) -> bool {
        matches!(
            self,
            Self::LicenseKeyNotGenuine
                | Self::LicenseFileNotGenuine
                | Self::MachineFileNotGenuine
                | Self::Crypto(
                    CryptoError::NotGenuine
                        | CryptoError::Decryption
                        | CryptoError::DigestInvalid
                        | CryptoError::SignatureInvalid
                )
        )
    }

    /// Returns true if a heartbeat loop must stop on this error.
    ///
    /// The entity was deleted or the server gave up on it; pinging again
    /// cannot succeed.
    #[must_use]
    pub fn is_terminal_for_monitor(&self) -> bool {
        matches!(
            self,
            Self::MachineNotFound | Self::ProcessNotFound | Self::NotFound | Self::HeartbeatDead
        )
    }

    /// Returns true if the request was rate limited.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Returns the retry-after duration if this is a rate-limit error.
    #[must_use]
    pub fn retry_after(&self) -> Option<std::time::Duration> {
        match self {
            Self::RateLimited { retry_after_secs } => {
                retry_after_secs.map(std::time::Duration::from_secs)
            }
            _ => None,
        }
    }

    /// Returns the dataset of an expired license file.
    #[must_use]
    pub fn expired_license_file(&self) -> Option<&LicenseFileDataset> {
        match self {
            Self::LicenseFileExpired(dataset) => Some(dataset),
            _ => None,
        }
    }

    /// Returns the dataset of an expired machine file.
    #[must_use]
    pub fn expired_machine_file(&self) -> Option<&MachineFileDataset> {
        match self {
            Self::MachineFileExpired(dataset) => Some(dataset),
            _ => None,
        }
    }
}

#[cfg(feature = "online")]
impl From<reqwest::Error> for LicenseError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
