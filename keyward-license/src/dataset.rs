//! Dataset materialization and time policy.
//!
//! A decrypted (or plain) license or machine file holds a JSON:API
//! document. Its `meta` carries `issued`, `expiry` and `ttl`. A `ttl` of
//! zero means the dataset never expires, whatever `expiry` says.

use crate::clock::Clock;
use crate::config::ClientConfig;
use crate::error::{LicenseError, LicenseResult};
use crate::resource::{Component, Document, Entitlement, License, Machine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use tracing::debug;

/// Validity window of a dataset.
///
/// A file checked out without a TTL carries `"expiry": null` and
/// `"ttl": null`; null reads as the field's default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DatasetMeta {
    /// When the file was checked out.
    #[serde(deserialize_with = "null_as_default")]
    pub issued: DateTime<Utc>,
    /// When the file stops being valid (only when `ttl != 0`).
    #[serde(deserialize_with = "null_as_default")]
    pub expiry: DateTime<Utc>,
    /// Time to live in seconds. Zero disables expiry.
    #[serde(deserialize_with = "null_as_default")]
    pub ttl: u64,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// The instant and drift tolerance a dataset is judged against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetPolicy {
    /// Current time.
    pub now: DateTime<Utc>,
    /// Allowed distance of `issued` into the future. `None` disables.
    pub max_clock_drift: Option<Duration>,
}

impl DatasetPolicy {
    /// Policy at `now` with an explicit drift tolerance.
    #[must_use]
    pub fn new(now: DateTime<Utc>, max_clock_drift: Option<Duration>) -> Self {
        Self {
            now,
            max_clock_drift,
        }
    }

    /// Policy from a clock and the configured drift tolerance.
    #[must_use]
    pub fn from_config(clock: &dyn Clock, config: &ClientConfig) -> Self {
        Self::new(clock.now(), config.max_clock_drift)
    }
}

/// Outcome of the time policy for a parsed dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetStatus {
    /// Within its validity window.
    Valid,
    /// Past `expiry` with a nonzero `ttl`.
    Expired,
}

impl DatasetMeta {
    /// Applies the time policy.
    ///
    /// # Errors
    ///
    /// `SystemClockUnsynced` when a drift tolerance is set and `issued`
    /// lies further than that in the future.
    pub fn check(&self, policy: &DatasetPolicy) -> LicenseResult<DatasetStatus> {
        let now = policy.now;
        if let Some(max_drift) = policy.max_clock_drift {
            if let Ok(ahead) = self.issued.signed_duration_since(now).to_std() {
                if ahead > max_drift {
                    debug!(issued = %self.issued, %now, "dataset issued in the future");
                    return Err(LicenseError::SystemClockUnsynced);
                }
            }
        }

        if self.ttl != 0 && now > self.expiry {
            return Ok(DatasetStatus::Expired);
        }

        Ok(DatasetStatus::Valid)
    }
}

/// The contents of a license file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LicenseFileDataset {
    /// The license.
    pub license: License,
    /// Entitlements included with the license.
    pub entitlements: Vec<Entitlement>,
    /// Validity window.
    pub meta: DatasetMeta,
}

impl LicenseFileDataset {
    /// Parses a license file document. Unknown included types are skipped.
    pub fn from_json(data: &[u8]) -> LicenseResult<Self> {
        let document: Document<License, DatasetMeta> = serde_json::from_slice(data)?;

        let mut entitlements = Vec::new();
        for included in &document.included {
            if let Some(entitlement) = included.decode::<Entitlement>() {
                entitlements.push(entitlement?);
            }
        }

        Ok(Self {
            meta: document.meta.clone(),
            license: document.into_primary(),
            entitlements,
        })
    }
}

/// The contents of a machine file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MachineFileDataset {
    /// The machine.
    pub machine: Machine,
    /// The license, when included.
    pub license: Option<License>,
    /// Entitlements included with the license.
    pub entitlements: Vec<Entitlement>,
    /// Components included with the machine.
    pub components: Vec<Component>,
    /// Validity window.
    pub meta: DatasetMeta,
}

impl MachineFileDataset {
    /// Parses a machine file document. Unknown included types are skipped.
    pub fn from_json(data: &[u8]) -> LicenseResult<Self> {
        let document: Document<Machine, DatasetMeta> = serde_json::from_slice(data)?;

        let mut license = None;
        let mut entitlements = Vec::new();
        let mut components = Vec::new();
        for included in &document.included {
            if let Some(decoded) = included.decode::<License>() {
                license = Some(decoded?);
            } else if let Some(decoded) = included.decode::<Entitlement>() {
                entitlements.push(decoded?);
            } else if let Some(decoded) = included.decode::<Component>() {
                components.push(decoded?);
            }
        }

        Ok(Self {
            meta: document.meta.clone(),
            machine: document.into_primary(),
            license,
            entitlements,
            components,
        })
    }
}

/// Materializes a license file dataset and applies the time policy.
///
/// # Errors
///
/// `SystemClockUnsynced`, or `LicenseFileExpired` carrying the parsed
/// dataset.
pub fn materialize_license_file(
    data: &[u8],
    policy: &DatasetPolicy,
) -> LicenseResult<LicenseFileDataset> {
    let dataset = LicenseFileDataset::from_json(data)?;
    match dataset.meta.check(policy)? {
        DatasetStatus::Valid => Ok(dataset),
        DatasetStatus::Expired => Err(LicenseError::LicenseFileExpired(Box::new(dataset))),
    }
}

/// Materializes a machine file dataset and applies the time policy.
///
/// # Errors
///
/// `SystemClockUnsynced`, or `MachineFileExpired` carrying the parsed
/// dataset.
pub fn materialize_machine_file(
    data: &[u8],
    policy: &DatasetPolicy,
) -> LicenseResult<MachineFileDataset> {
    let dataset = MachineFileDataset::from_json(data)?;
    match dataset.meta.check(policy)? {
        DatasetStatus::Valid => Ok(dataset),
        DatasetStatus::Expired => Err(LicenseError::MachineFileExpired(Box::new(dataset))),
    }
}
