//! Self-update for programs licensed with keyward.
//!
//! An [`Upgrader`] asks the API for the newest release above the running
//! version, resolves the artifact for this platform, and hands it to an
//! [`Installer`] that downloads it, checks its SHA-512 checksum and
//! Ed25519ph signature, and atomically replaces the target binary.
//!
//! Releases are signed with a personal key, never the account key used
//! to verify licenses; [`Upgrader::new`] refuses the account key.
//!
//! # Example
//!
//! ```no_run
//! use keyward_license::{ClientConfig, HttpTransport};
//! use keyward_upgrade::{HttpArtifactSource, UpgradeError, UpgradeOptions, Upgrader};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), UpgradeError> {
//! let config = ClientConfig {
//!     account: "acme".into(),
//!     product: "prod-1".into(),
//!     ..ClientConfig::default()
//! };
//! let transport = Arc::new(HttpTransport::new(config.clone())?);
//! let options = UpgradeOptions {
//!     current_version: "1.0.0".into(),
//!     public_key: "d8b2ba1a4e6c4b3f2f4f0b1c5a7e9d3c1b2a4f6e8d0c2b4a6f8e0d2c4b6a8f0e".into(),
//!     ..UpgradeOptions::default()
//! };
//!
//! let upgrader = Upgrader::new(&config, transport, options)?;
//! match upgrader.check_for_upgrade().await {
//!     Ok(release) => {
//!         let source = Arc::new(HttpArtifactSource::new(Duration::from_secs(300))?);
//!         let target = std::env::current_exe()?;
//!         upgrader.install(&release, source, &target).await?;
//!     }
//!     Err(UpgradeError::NotAvailable) => {}
//!     Err(e) => return Err(e),
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod installer;
mod options;
mod release;
mod signing;

pub use error::{UpgradeError, UpgradeResult};
pub use installer::{ArtifactSource, HttpArtifactSource, Installer, replace_file};
pub use options::{
    DEFAULT_CHANNEL, DEFAULT_FILENAME_TEMPLATE, FilenameVars, UpgradeOptions, release_arch,
    release_platform, render_filename,
};
pub use release::{Artifact, Release, Upgrader};
pub use signing::{ReleaseSignature, checksum, sign_release, verify_checksum, verify_release};
