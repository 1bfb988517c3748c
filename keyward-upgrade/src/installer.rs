//! Artifact download, integrity checks and atomic replacement.

use crate::error::{UpgradeError, UpgradeResult};
use crate::release::Artifact;
use crate::signing::{ReleaseSignature, verify_checksum, verify_release};
use async_trait::async_trait;
use keyward_crypto::PublicKey;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Where artifact bytes come from.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Downloads the body at `url`.
    async fn fetch(&self, url: &str) -> UpgradeResult<Vec<u8>>;
}

/// Downloads artifacts over HTTP, following redirects to storage.
#[derive(Debug, Clone)]
pub struct HttpArtifactSource {
    client: reqwest::Client,
}

impl HttpArtifactSource {
    /// Creates a source with a whole-download timeout.
    pub fn new(timeout: Duration) -> UpgradeResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ArtifactSource for HttpArtifactSource {
    async fn fetch(&self, url: &str) -> UpgradeResult<Vec<u8>> {
        debug!(%url, "downloading artifact");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpgradeError::Download(format!("unexpected status {status}")));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Downloads an artifact, checks it, and swaps it in for a target file.
///
/// An installer that checks signatures comes from
/// [`Upgrader::installer`](crate::Upgrader::installer), which has already
/// refused the account key. Callers cannot attach a key themselves:
///
/// ```compile_fail
/// use keyward_crypto::PublicKey;
/// use keyward_upgrade::{HttpArtifactSource, Installer};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// fn attach(key: PublicKey) -> Installer {
///     let source = Arc::new(HttpArtifactSource::new(Duration::from_secs(5)).unwrap());
///     Installer::new(source).with_signature_key(key, "prod-1")
/// }
/// ```
pub struct Installer {
    source: Arc<dyn ArtifactSource>,
    signature_key: Option<(PublicKey, String)>,
}

impl Installer {
    /// Creates an installer that checks checksums only.
    pub fn new(source: Arc<dyn ArtifactSource>) -> Self {
        Self {
            source,
            signature_key: None,
        }
    }

    /// Also checks signatures with `key`, bound to `context` (the product id).
    #[must_use]
    pub(crate) fn with_signature_key(mut self, key: PublicKey, context: &str) -> Self {
        self.signature_key = Some((key, context.to_string()));
        self
    }

    /// Checks `binary` against the artifact's checksum and signature.
    ///
    /// Each check runs when the artifact carries its value. A signature
    /// is only checked when a signature key is set.
    ///
    /// # Errors
    ///
    /// `ChecksumInvalid`, `ChecksumMismatch` or `SignatureInvalid`.
    pub fn verify(&self, artifact: &Artifact, binary: &[u8]) -> UpgradeResult<()> {
        if let Some(expected) = artifact.checksum.as_deref().filter(|c| !c.is_empty()) {
            verify_checksum(expected, binary)
                .inspect_err(|e| warn!(artifact = %artifact.id, error = %e, "checksum check failed"))?;
        }

        if let Some(encoded) = artifact.signature.as_deref().filter(|s| !s.is_empty()) {
            match &self.signature_key {
                Some((key, context)) => {
                    let signature = ReleaseSignature::from_base64(encoded)?;
                    verify_release(key, context, binary, &signature).inspect_err(
                        |e| warn!(artifact = %artifact.id, error = %e, "signature check failed"),
                    )?;
                }
                None => debug!(artifact = %artifact.id, "no personal key, signature not checked"),
            }
        }

        Ok(())
    }

    /// Downloads `artifact`, verifies it and replaces `target` with it.
    ///
    /// `target` is untouched unless every check passes.
    ///
    /// # Errors
    ///
    /// `LocationMissing` without a download URL, a download error, an
    /// integrity error from [`Self::verify`], or an I/O error.
    pub async fn install(&self, artifact: &Artifact, target: &Path) -> UpgradeResult<()> {
        if artifact.url.is_empty() {
            return Err(UpgradeError::LocationMissing);
        }

        let binary = self.source.fetch(&artifact.url).await?;
        self.verify(artifact, &binary)?;
        replace_file(target, &binary)?;

        info!(artifact = %artifact.id, target = %target.display(), bytes = binary.len(), "artifact installed");
        Ok(())
    }
}

/// Atomically replaces `target` with `contents`.
///
/// Writes a temp file in the target's directory, copies the target's
/// permissions onto it, then renames it over the target.
pub fn replace_file(target: &Path, contents: &[u8]) -> UpgradeResult<()> {
    let dir = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;

    if let Ok(metadata) = fs::metadata(target) {
        fs::set_permissions(tmp.path(), metadata.permissions())?;
    }

    tmp.persist(target).map_err(|e| UpgradeError::Io(e.error))?;
    Ok(())
}
