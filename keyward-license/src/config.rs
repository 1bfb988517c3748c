//! Client configuration.
//!
//! One immutable value handed to every component constructor. Nothing in
//! the crate reads process-wide state.

use crate::error::{LicenseError, LicenseResult};
use keyward_crypto::{DEFAULT_MAX_CLOCK_DRIFT, PublicKey};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default API base URL.
pub const DEFAULT_API_URL: &str = "https://api.keygen.sh";

/// Default API version segment.
pub const DEFAULT_API_VERSION: &str = "v1";

/// Connection settings and trust root for talking to the licensing API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Account id or slug.
    pub account: String,
    /// Product id, sent as the validation product scope.
    pub product: String,
    /// Optional environment scope.
    pub environment: Option<String>,
    /// License key, used for `License` authentication when no token is set.
    pub license_key: Option<String>,
    /// Bearer token (license, user or product token).
    pub token: Option<String>,
    /// Hex Ed25519 public key of the account. Empty disables response
    /// verification and makes offline verification fail.
    pub public_key: String,
    /// API base URL, without version.
    pub api_url: String,
    /// API version path segment.
    pub api_version: String,
    /// User agent suffix appended to the crate's own.
    pub user_agent: Option<String>,
    /// Replay window for signed responses and dataset issue times.
    /// `None` disables the drift checks.
    pub max_clock_drift: Option<Duration>,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Verify response signatures when a public key is configured.
    pub verify_responses: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            account: String::new(),
            product: String::new(),
            environment: None,
            license_key: None,
            token: None,
            public_key: String::new(),
            api_url: DEFAULT_API_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            user_agent: None,
            max_clock_drift: Some(DEFAULT_MAX_CLOCK_DRIFT),
            request_timeout: Duration::from_secs(30),
            verify_responses: true,
        }
    }
}

impl ClientConfig {
    /// Parses the configured public key.
    ///
    /// # Errors
    ///
    /// `PublicKeyMissing` when empty, `PublicKeyInvalid` when malformed.
    pub fn verify_key(&self) -> LicenseResult<PublicKey> {
        PublicKey::from_hex(&self.public_key).map_err(LicenseError::from)
    }

    /// Returns the `Authorization` header value, preferring the token.
    #[must_use]
    pub fn authorization(&self) -> Option<String> {
        if let Some(token) = self.token.as_deref().filter(|t| !t.is_empty()) {
            return Some(format!("Bearer {token}"));
        }
        self.license_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .map(|key| format!("License {key}"))
    }

    /// Returns the `User-Agent` header value.
    #[must_use]
    pub fn user_agent(&self) -> String {
        let base = format!(
            "keyward/{} ({}; {})",
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS,
            std::env::consts::ARCH
        );
        match self.user_agent.as_deref() {
            Some(extra) if !extra.is_empty() => format!("{base} {extra}"),
            _ => base,
        }
    }
}
