//! License validation and validation-code mapping.
//!
//! The server answers a validation with one constant. Many constants
//! collapse onto the same domain error; `VALID` is the only success and
//! anything unrecognized fails closed as `LicenseInvalid`.

use crate::config::ClientConfig;
use crate::error::{LicenseError, LicenseResult};
use crate::resource::{Document, License};
use crate::transport::{Method, Transport};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// A validation constant returned by the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ValidationCode {
    /// `VALID`
    Valid,
    /// `NOT_FOUND`
    NotFound,
    /// `SUSPENDED`
    Suspended,
    /// `EXPIRED`
    Expired,
    /// `OVERDUE`
    Overdue,
    /// `NO_MACHINE`
    NoMachine,
    /// `NO_MACHINES`
    NoMachines,
    /// `TOO_MANY_MACHINES`
    TooManyMachines,
    /// `TOO_MANY_CORES`
    TooManyCores,
    /// `TOO_MANY_PROCESSES`
    TooManyProcesses,
    /// `FINGERPRINT_SCOPE_REQUIRED`
    FingerprintScopeRequired,
    /// `FINGERPRINT_SCOPE_MISMATCH`
    FingerprintScopeMismatch,
    /// `FINGERPRINT_SCOPE_EMPTY`
    FingerprintScopeEmpty,
    /// `COMPONENTS_SCOPE_REQUIRED`
    ComponentsScopeRequired,
    /// `COMPONENTS_SCOPE_MISMATCH`
    ComponentsScopeMismatch,
    /// `COMPONENTS_SCOPE_EMPTY`
    ComponentsScopeEmpty,
    /// `HEARTBEAT_NOT_STARTED`
    HeartbeatNotStarted,
    /// `HEARTBEAT_DEAD`
    HeartbeatDead,
    /// `PRODUCT_SCOPE_REQUIRED`
    ProductScopeRequired,
    /// `PRODUCT_SCOPE_MISMATCH`
    ProductScopeMismatch,
    /// `POLICY_SCOPE_REQUIRED`
    PolicyScopeRequired,
    /// `POLICY_SCOPE_MISMATCH`
    PolicyScopeMismatch,
    /// `MACHINE_SCOPE_REQUIRED`
    MachineScopeRequired,
    /// `MACHINE_SCOPE_MISMATCH`
    MachineScopeMismatch,
    /// `ENTITLEMENTS_MISSING`
    EntitlementsMissing,
    /// `ENTITLEMENTS_SCOPE_EMPTY`
    EntitlementsScopeEmpty,
    /// Any constant this crate does not know.
    Unknown(String),
}

impl ValidationCode {
    /// Every known constant, in declaration order.
    pub const KNOWN: [ValidationCode; 26] = [
        Self::Valid,
        Self::NotFound,
        Self::Suspended,
        Self::Expired,
        Self::Overdue,
        Self::NoMachine,
        Self::NoMachines,
        Self::TooManyMachines,
        Self::TooManyCores,
        Self::TooManyProcesses,
        Self::FingerprintScopeRequired,
        Self::FingerprintScopeMismatch,
        Self::FingerprintScopeEmpty,
        Self::ComponentsScopeRequired,
        Self::ComponentsScopeMismatch,
        Self::ComponentsScopeEmpty,
        Self::HeartbeatNotStarted,
        Self::HeartbeatDead,
        Self::ProductScopeRequired,
        Self::ProductScopeMismatch,
        Self::PolicyScopeRequired,
        Self::PolicyScopeMismatch,
        Self::MachineScopeRequired,
        Self::MachineScopeMismatch,
        Self::EntitlementsMissing,
        Self::EntitlementsScopeEmpty,
    ];

    /// Returns the wire constant.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Valid => "VALID",
            Self::NotFound => "NOT_FOUND",
            Self::Suspended => "SUSPENDED",
            Self::Expired => "EXPIRED",
            Self::Overdue => "OVERDUE",
            Self::NoMachine => "NO_MACHINE",
            Self::NoMachines => "NO_MACHINES",
            Self::TooManyMachines => "TOO_MANY_MACHINES",
            Self::TooManyCores => "TOO_MANY_CORES",
            Self::TooManyProcesses => "TOO_MANY_PROCESSES",
            Self::FingerprintScopeRequired => "FINGERPRINT_SCOPE_REQUIRED",
            Self::FingerprintScopeMismatch => "FINGERPRINT_SCOPE_MISMATCH",
            Self::FingerprintScopeEmpty => "FINGERPRINT_SCOPE_EMPTY",
            Self::ComponentsScopeRequired => "COMPONENTS_SCOPE_REQUIRED",
            Self::ComponentsScopeMismatch => "COMPONENTS_SCOPE_MISMATCH",
            Self::ComponentsScopeEmpty => "COMPONENTS_SCOPE_EMPTY",
            Self::HeartbeatNotStarted => "HEARTBEAT_NOT_STARTED",
            Self::HeartbeatDead => "HEARTBEAT_DEAD",
            Self::ProductScopeRequired => "PRODUCT_SCOPE_REQUIRED",
            Self::ProductScopeMismatch => "PRODUCT_SCOPE_MISMATCH",
            Self::PolicyScopeRequired => "POLICY_SCOPE_REQUIRED",
            Self::PolicyScopeMismatch => "POLICY_SCOPE_MISMATCH",
            Self::MachineScopeRequired => "MACHINE_SCOPE_REQUIRED",
            Self::MachineScopeMismatch => "MACHINE_SCOPE_MISMATCH",
            Self::EntitlementsMissing => "ENTITLEMENTS_MISSING",
            Self::EntitlementsScopeEmpty => "ENTITLEMENTS_SCOPE_EMPTY",
            Self::Unknown(code) => code,
        }
    }

    /// Maps the constant onto the domain vocabulary.
    ///
    /// # Errors
    ///
    /// Every code except `VALID` is an error. Codes meaning "not
    /// activated here" share `LicenseNotActivated`; unmapped and unknown
    /// codes are `LicenseInvalid`.
    pub fn to_result(&self) -> LicenseResult<()> {
        let err = match self {
            Self::Valid => return Ok(()),
            Self::NoMachine | Self::NoMachines | Self::FingerprintScopeMismatch => {
                LicenseError::LicenseNotActivated
            }
            Self::Expired => LicenseError::LicenseExpired,
            Self::Suspended => LicenseError::LicenseSuspended,
            Self::TooManyMachines => LicenseError::LicenseTooManyMachines,
            Self::TooManyCores => LicenseError::LicenseTooManyCores,
            Self::TooManyProcesses => LicenseError::LicenseTooManyProcesses,
            Self::FingerprintScopeRequired | Self::FingerprintScopeEmpty => {
                LicenseError::ValidationFingerprintMissing
            }
            Self::ComponentsScopeRequired | Self::ComponentsScopeEmpty => {
                LicenseError::ValidationComponentsMissing
            }
            Self::ComponentsScopeMismatch => LicenseError::ComponentNotActivated,
            Self::HeartbeatNotStarted => LicenseError::HeartbeatRequired,
            Self::HeartbeatDead => LicenseError::HeartbeatDead,
            Self::ProductScopeRequired | Self::ProductScopeMismatch => {
                LicenseError::ValidationProductMissing
            }
            Self::NotFound
            | Self::Overdue
            | Self::PolicyScopeRequired
            | Self::PolicyScopeMismatch
            | Self::MachineScopeRequired
            | Self::MachineScopeMismatch
            | Self::EntitlementsMissing
            | Self::EntitlementsScopeEmpty
            | Self::Unknown(_) => LicenseError::LicenseInvalid,
        };
        Err(err)
    }
}

impl From<&str> for ValidationCode {
    fn from(code: &str) -> Self {
        Self::KNOWN
            .iter()
            .find(|known| known.as_str() == code)
            .cloned()
            .unwrap_or_else(|| Self::Unknown(code.to_string()))
    }
}

impl From<String> for ValidationCode {
    fn from(code: String) -> Self {
        Self::from(code.as_str())
    }
}

impl From<ValidationCode> for String {
    fn from(code: ValidationCode) -> Self {
        code.as_str().to_string()
    }
}

impl fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifiers a validation is restricted to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationScope {
    /// Machine fingerprint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    /// Component fingerprints.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<String>,
    /// Product id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    /// Environment id or code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
}

impl ValidationScope {
    /// Builds a scope from fingerprints: the first is the machine, the
    /// rest are components.
    #[must_use]
    pub fn from_fingerprints(config: &ClientConfig, fingerprints: &[&str]) -> Self {
        let (fingerprint, components) = match fingerprints.split_first() {
            Some((first, rest)) => (
                Some((*first).to_string()),
                rest.iter().map(|c| (*c).to_string()).collect(),
            ),
            None => (None, Vec::new()),
        };

        Self {
            fingerprint,
            components,
            product: Some(config.product.clone()).filter(|p| !p.is_empty()),
            environment: config.environment.clone(),
        }
    }
}

/// The outcome of one validation, as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Validation constant.
    #[serde(alias = "constant")]
    pub code: ValidationCode,
    /// Whether the license is valid for the scope.
    pub valid: bool,
    /// Human-readable detail.
    #[serde(default)]
    pub detail: String,
    /// The scope the server validated against.
    #[serde(default)]
    pub scope: Option<ValidationScope>,
}

impl ValidationResult {
    /// Maps the result onto the domain vocabulary.
    pub fn to_result(&self) -> LicenseResult<()> {
        self.code.to_result()
    }
}

/// A validated license with the raw server outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct Validation {
    /// The license, with `last_validation` set.
    pub license: License,
    /// The server outcome.
    pub result: ValidationResult,
}

impl Validation {
    /// Returns the license if valid, else the mapped error.
    pub fn into_license(self) -> LicenseResult<License> {
        self.result.to_result()?;
        Ok(self.license)
    }
}

/// Validates licenses against the API.
pub struct Validator {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
}

impl Validator {
    /// Creates a validator.
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    /// Validates a license by id, scoped to `fingerprints`.
    ///
    /// # Errors
    ///
    /// The mapped validation error, `LicenseInvalid` if the license does
    /// not exist, or a transport error.
    pub async fn validate(&self, license_id: &str, fingerprints: &[&str]) -> LicenseResult<License> {
        self.validate_detailed(license_id, fingerprints)
            .await?
            .into_license()
    }

    /// Like [`Self::validate`] but returns the license and raw outcome
    /// even when the license is not valid.
    pub async fn validate_detailed(
        &self,
        license_id: &str,
        fingerprints: &[&str],
    ) -> LicenseResult<Validation> {
        let scope = ValidationScope::from_fingerprints(&self.config, fingerprints);
        let body = json!({ "meta": { "scope": scope } });
        self.send(&format!("licenses/{license_id}/actions/validate"), body)
            .await
    }

    /// Validates a license by key, scoped to `fingerprints`.
    pub async fn validate_key(&self, key: &str, fingerprints: &[&str]) -> LicenseResult<License> {
        if key.trim().is_empty() {
            return Err(LicenseError::LicenseKeyMissing);
        }
        let scope = ValidationScope::from_fingerprints(&self.config, fingerprints);
        let body = json!({ "meta": { "key": key, "scope": scope } });
        self.send("licenses/actions/validate-key", body)
            .await?
            .into_license()
    }

    async fn send(&self, path: &str, body: serde_json::Value) -> LicenseResult<Validation> {
        let response = match self.transport.call(Method::Post, path, Some(body)).await {
            Ok(response) => response,
            Err(LicenseError::NotFound) => return Err(LicenseError::LicenseInvalid),
            Err(e) => return Err(e),
        };

        let document: Document<License, Option<ValidationResult>> = response.json()?;
        let result = document.meta.clone().ok_or(LicenseError::LicenseInvalid)?;
        let mut license = document.into_primary();
        license.last_validation = Some(result.clone());

        if result.valid {
            info!(license = %license.id, code = %result.code, "license validated");
        } else {
            debug!(license = %license.id, code = %result.code, "license not valid");
        }

        Ok(Validation { license, result })
    }
}
