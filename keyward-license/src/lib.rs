//! Client-side licensing for keyward.
//!
//! This crate handles:
//! - License and machine files: verification, decryption, expiry policy
//! - Signed license keys (`ED25519_SIGN`)
//! - Online validation and mapping of validation codes to errors
//! - Heartbeat monitoring of machines and processes
//! - Machine fingerprinting
//!
//! Offline checks need only a [`ClientConfig`] with the account public
//! key. Online operations go through a [`Transport`]; [`HttpTransport`]
//! is the reqwest implementation behind the default `online` feature.
//!
//! # Example
//!
//! ```no_run
//! use keyward_license::{ClientConfig, DatasetPolicy, LicenseFile, SystemClock};
//!
//! # fn main() -> keyward_license::LicenseResult<()> {
//! let config = ClientConfig {
//!     account: "acme".into(),
//!     public_key: "e8601e48b69383ba520245fd07971e983d06d22c4257cfd82304601479cee788".into(),
//!     ..ClientConfig::default()
//! };
//!
//! let file = LicenseFile::from_certificate(std::fs::read_to_string("license.lic").unwrap_or_default());
//! let policy = DatasetPolicy::from_config(&SystemClock, &config);
//! let dataset = file.verify_and_decrypt(&config.verify_key()?, "LICENSE-KEY", &policy)?;
//! println!("licensed to {:?}", dataset.license.name);
//! # Ok(())
//! # }
//! ```

mod clock;
mod config;
mod dataset;
mod device;
mod error;
mod file;
mod key;
mod monitor;
mod resource;
mod transport;
mod validation;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ClientConfig, DEFAULT_API_URL, DEFAULT_API_VERSION};
pub use dataset::{
    DatasetMeta, DatasetPolicy, DatasetStatus, LicenseFileDataset, MachineFileDataset,
    materialize_license_file, materialize_machine_file,
};
pub use device::{DeviceInfo, fingerprint_from, machine_fingerprint};
pub use error::{LicenseError, LicenseResult};
pub use file::{LicenseFile, MachineFile};
pub use key::{LicenseKey, verify_license_key};
pub use monitor::{
    DEFAULT_EVENT_BUFFER, DEFAULT_HEARTBEAT_DURATION, HeartbeatEvent, Monitor, MonitorConfig,
    MonitorError, MonitorHandle, MonitoredEntity, PingFailurePolicy, StopReason,
};
pub use resource::{
    Component, Document, Entitlement, HeartbeatStatus, IncludedResource, License, Linkage,
    Machine, Metadata, MetadataValue, Process, ProcessStatus, Relationship, Relationships,
    Resource, ResourceIdentifier, ResourceType, SCHEME_ED25519_SIGN, decode_primary,
};
pub use transport::{
    ACCEPT_SIGNATURE_HEADER, JSONAPI_MEDIA_TYPE, Method, Response, Transport, account_url,
    api_error, verify_request, verify_request_at, verify_response, verify_response_at,
};
pub use validation::{
    Validation, ValidationCode, ValidationResult, ValidationScope, Validator,
};

#[cfg(any(test, feature = "test-util"))]
pub use transport::mock;

#[cfg(feature = "online")]
pub use transport::HttpTransport;
