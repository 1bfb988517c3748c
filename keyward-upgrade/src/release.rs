//! Release lookup and artifact resolution.

use crate::error::{UpgradeError, UpgradeResult};
use crate::installer::{ArtifactSource, Installer};
use crate::options::{FilenameVars, UpgradeOptions, render_filename};
use chrono::{DateTime, Utc};
use keyward_crypto::PublicKey;
use keyward_license::{
    ClientConfig, LicenseError, Metadata, Method, Resource, ResourceType, Transport, api_error,
};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use url::form_urlencoded;

/// A published release.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Release {
    /// Release id.
    #[serde(skip)]
    pub id: String,
    /// Display name.
    pub name: Option<String>,
    /// Release notes.
    pub description: Option<String>,
    /// Semantic version.
    pub version: String,
    /// Release channel.
    pub channel: String,
    /// Creation time.
    pub created: Option<DateTime<Utc>>,
    /// Update time.
    pub updated: Option<DateTime<Utc>>,
    /// Free-form metadata.
    pub metadata: Metadata,
}

impl ResourceType for Release {
    const TYPE: &'static str = "releases";

    fn from_resource(resource: Resource<Self>) -> Self {
        let mut release = resource.attributes;
        release.id = resource.id;
        release
    }
}

/// A downloadable file of a release.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Artifact {
    /// Artifact id.
    #[serde(skip)]
    pub id: String,
    /// Filename the artifact was looked up by.
    pub filename: String,
    /// File type, e.g. `exe`.
    pub filetype: Option<String>,
    /// Size in bytes.
    pub filesize: Option<u64>,
    /// Target platform.
    pub platform: Option<String>,
    /// Target architecture.
    pub arch: Option<String>,
    /// Base64 Ed25519ph signature, if signed.
    pub signature: Option<String>,
    /// Base64 SHA-512 checksum, if recorded.
    pub checksum: Option<String>,
    /// Creation time.
    pub created: Option<DateTime<Utc>>,
    /// Update time.
    pub updated: Option<DateTime<Utc>>,
    /// Owning release id.
    #[serde(skip)]
    pub release_id: Option<String>,
    /// Download URL from the lookup's `Location` header.
    #[serde(skip)]
    pub url: String,
}

impl ResourceType for Artifact {
    const TYPE: &'static str = "artifacts";

    fn from_resource(resource: Resource<Self>) -> Self {
        let mut artifact = resource.attributes;
        artifact.id = resource.id;
        artifact.release_id = resource.relationships.release.id().map(String::from);
        artifact
    }
}

/// Checks for and installs upgrades of the running program.
pub struct Upgrader {
    transport: Arc<dyn Transport>,
    options: UpgradeOptions,
    personal_key: Option<PublicKey>,
}

impl std::fmt::Debug for Upgrader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upgrader")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Upgrader {
    /// Creates an upgrader.
    ///
    /// An empty `options.product` takes the config's product.
    ///
    /// # Errors
    ///
    /// `PersonalKeyReused` if the personal key equals the account public
    /// key, or a key parsing error for a malformed personal key. Nothing
    /// is sent before these checks.
    pub fn new(
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
        mut options: UpgradeOptions,
    ) -> UpgradeResult<Self> {
        let personal = options.public_key.trim();
        let personal_key = if personal.is_empty() {
            None
        } else {
            if personal.eq_ignore_ascii_case(config.public_key.trim()) {
                return Err(UpgradeError::PersonalKeyReused);
            }
            let key = PublicKey::from_hex(personal)?;
            if config.verify_key().ok() == Some(key) {
                return Err(UpgradeError::PersonalKeyReused);
            }
            Some(key)
        };

        if options.product.is_empty() {
            options.product = config.product.clone();
        }

        Ok(Self {
            transport,
            options,
            personal_key,
        })
    }

    /// Returns the effective options.
    #[must_use]
    pub fn options(&self) -> &UpgradeOptions {
        &self.options
    }

    /// Asks for the newest release above the current version.
    ///
    /// # Errors
    ///
    /// `NotAvailable` when already up to date, or an API error.
    pub async fn check_for_upgrade(&self) -> UpgradeResult<Release> {
        let mut query = form_urlencoded::Serializer::new(String::new());
        if !self.options.product.is_empty() {
            query.append_pair("product", &self.options.product);
        }
        if let Some(package) = self.options.package.as_deref() {
            query.append_pair("package", package);
        }
        if let Some(constraint) = self.options.constraint.as_deref() {
            query.append_pair("constraint", constraint);
        }
        query.append_pair("channel", &self.options.channel);

        let path = format!(
            "releases/{}/upgrade?{}",
            self.options.current_version,
            query.finish()
        );

        let release: Release = match self.transport.call(Method::Get, &path, None).await {
            Ok(response) => response.primary()?,
            Err(LicenseError::NotFound) => {
                debug!(version = %self.options.current_version, "no upgrade available");
                return Err(UpgradeError::NotAvailable);
            }
            Err(e) => return Err(e.into()),
        };

        info!(from = %self.options.current_version, to = %release.version, "upgrade available");
        Ok(release)
    }

    /// Returns the artifact filename for `release` on this platform.
    pub fn artifact_filename(&self, release: &Release) -> UpgradeResult<String> {
        let vars = FilenameVars::current(self.options.program(), &release.channel, &release.version);
        render_filename(&self.options.filename, &vars)
    }

    /// Looks up this platform's artifact of `release`.
    ///
    /// # Errors
    ///
    /// `LocationMissing` when the lookup carries no download URL, or an
    /// API error.
    pub async fn release_artifact(&self, release: &Release) -> UpgradeResult<Artifact> {
        let filename = self.artifact_filename(release)?;
        let path = format!("releases/{}/artifacts/{filename}", release.id);

        let response = self.transport.request(Method::Get, &path, None).await?;
        if !response.is_success() && !response.is_redirect() {
            return Err(api_error(&response).into());
        }

        let mut artifact: Artifact = response.primary()?;
        artifact.url = response
            .headers
            .get("location")
            .map(str::to_string)
            .filter(|url| !url.is_empty())
            .ok_or(UpgradeError::LocationMissing)?;

        debug!(release = %release.id, %filename, "artifact resolved");
        Ok(artifact)
    }

    /// Builds an installer that checks signatures with the personal key
    /// and this upgrade's product as context.
    pub fn installer(&self, source: Arc<dyn ArtifactSource>) -> Installer {
        let installer = Installer::new(source);
        match &self.personal_key {
            Some(key) => installer.with_signature_key(*key, &self.options.product),
            None => installer,
        }
    }

    /// Resolves the artifact of `release` and installs it over `target`.
    pub async fn install(
        &self,
        release: &Release,
        source: Arc<dyn ArtifactSource>,
        target: &Path,
    ) -> UpgradeResult<Artifact> {
        let artifact = self.release_artifact(release).await?;
        self.installer(source).install(&artifact, target).await?;
        Ok(artifact)
    }
}
