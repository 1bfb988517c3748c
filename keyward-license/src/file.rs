//! License and machine files.
//!
//! A file is a certificate checked out from the API. Verifying it needs
//! only the account public key; reading it needs the secret it was
//! encrypted for (the license key, or license key + fingerprint for
//! machine files) unless it was issued unencrypted.

use crate::dataset::{
    DatasetPolicy, LicenseFileDataset, MachineFileDataset, materialize_license_file,
    materialize_machine_file,
};
use crate::error::{LicenseError, LicenseResult};
use crate::resource::{Resource, ResourceType};
use keyward_crypto::{
    Certificate, CertificateKind, CryptoError, PublicKey, decrypt_certificate, verify_certificate,
};
use serde::Deserialize;
use tracing::debug;

/// Maps a verification-layer failure onto the file's own vocabulary.
fn file_error(kind: CertificateKind, err: CryptoError) -> LicenseError {
    match (kind, err) {
        (CertificateKind::License, CryptoError::CertificateInvalid) => {
            LicenseError::LicenseFileInvalid
        }
        (CertificateKind::License, CryptoError::UnsupportedAlgorithm(alg)) => {
            LicenseError::LicenseFileNotSupported(alg)
        }
        (CertificateKind::License, CryptoError::NotEncrypted) => {
            LicenseError::LicenseFileNotEncrypted
        }
        (CertificateKind::License, CryptoError::NotGenuine | CryptoError::Decryption) => {
            LicenseError::LicenseFileNotGenuine
        }
        (CertificateKind::Machine, CryptoError::CertificateInvalid) => {
            LicenseError::MachineFileInvalid
        }
        (CertificateKind::Machine, CryptoError::UnsupportedAlgorithm(alg)) => {
            LicenseError::MachineFileNotSupported(alg)
        }
        (CertificateKind::Machine, CryptoError::NotEncrypted) => {
            LicenseError::MachineFileNotEncrypted
        }
        (CertificateKind::Machine, CryptoError::NotGenuine | CryptoError::Decryption) => {
            LicenseError::MachineFileNotGenuine
        }
        (_, other) => LicenseError::Crypto(other),
    }
}

fn parse(text: &str, kind: CertificateKind) -> LicenseResult<Certificate> {
    Certificate::parse_kind(text, kind).map_err(|e| file_error(kind, e))
}

fn verify(text: &str, kind: CertificateKind, public_key: &PublicKey) -> LicenseResult<()> {
    let cert = parse(text, kind)?;
    verify_certificate(&cert, kind, public_key).map_err(|e| file_error(kind, e))
}

fn decrypt(text: &str, kind: CertificateKind, secret: &str) -> LicenseResult<Vec<u8>> {
    let cert = parse(text, kind)?;
    decrypt_certificate(&cert, secret).map_err(|e| {
        debug!(kind = kind.signing_prefix(), error = %e, "file decryption failed");
        file_error(kind, e)
    })
}

fn decode(text: &str, kind: CertificateKind) -> LicenseResult<Vec<u8>> {
    let cert = parse(text, kind)?;
    cert.plain_payload().map_err(|e| file_error(kind, e))
}

// ── License file ─────────────────────────────────────────────────

/// A checked-out license file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LicenseFile {
    /// License file id.
    #[serde(skip)]
    pub id: String,
    /// Framed certificate text.
    pub certificate: String,
    /// The license the file was checked out from.
    #[serde(skip)]
    pub license_id: Option<String>,
}

impl ResourceType for LicenseFile {
    const TYPE: &'static str = "license-files";

    fn from_resource(resource: Resource<Self>) -> Self {
        let mut file = resource.attributes;
        file.id = resource.id;
        file.license_id = resource.relationships.license.id().map(String::from);
        file
    }
}

impl LicenseFile {
    /// Wraps certificate text read from disk.
    pub fn from_certificate(certificate: impl Into<String>) -> Self {
        Self {
            certificate: certificate.into(),
            ..Self::default()
        }
    }

    /// Parses the certificate.
    pub fn certificate(&self) -> LicenseResult<Certificate> {
        parse(&self.certificate, CertificateKind::License)
    }

    /// Checks the file signature.
    ///
    /// # Errors
    ///
    /// `LicenseFileInvalid`, `LicenseFileNotSupported` or
    /// `LicenseFileNotGenuine`.
    pub fn verify(&self, public_key: &PublicKey) -> LicenseResult<()> {
        verify(&self.certificate, CertificateKind::License, public_key)
    }

    /// Decrypts with the license key and materializes the dataset.
    ///
    /// Does not verify the signature; see [`Self::verify_and_decrypt`].
    ///
    /// # Errors
    ///
    /// `LicenseFileSecretMissing`, `LicenseFileNotEncrypted`,
    /// `LicenseFileNotSupported`, `LicenseFileNotGenuine`,
    /// `SystemClockUnsynced`, or `LicenseFileExpired` with the dataset.
    pub fn decrypt(&self, secret: &str, policy: &DatasetPolicy) -> LicenseResult<LicenseFileDataset> {
        if secret.is_empty() {
            return Err(LicenseError::LicenseFileSecretMissing);
        }

        let data = decrypt(&self.certificate, CertificateKind::License, secret)?;
        materialize_license_file(&data, policy)
    }

    /// Reads an unencrypted (`base64+ed25519`) license file.
    pub fn decode(&self, policy: &DatasetPolicy) -> LicenseResult<LicenseFileDataset> {
        let data = decode(&self.certificate, CertificateKind::License)?;
        materialize_license_file(&data, policy)
    }

    /// Verifies, then decrypts.
    pub fn verify_and_decrypt(
        &self,
        public_key: &PublicKey,
        secret: &str,
        policy: &DatasetPolicy,
    ) -> LicenseResult<LicenseFileDataset> {
        self.verify(public_key)?;
        self.decrypt(secret, policy)
    }
}

// ── Machine file ─────────────────────────────────────────────────

/// A checked-out machine file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MachineFile {
    /// Machine file id.
    #[serde(skip)]
    pub id: String,
    /// Framed certificate text.
    pub certificate: String,
    /// The machine the file was checked out from.
    #[serde(skip)]
    pub machine_id: Option<String>,
    /// The machine's license.
    #[serde(skip)]
    pub license_id: Option<String>,
}

impl ResourceType for MachineFile {
    const TYPE: &'static str = "machine-files";

    fn from_resource(resource: Resource<Self>) -> Self {
        let mut file = resource.attributes;
        file.id = resource.id;
        file.machine_id = resource.relationships.machine.id().map(String::from);
        file.license_id = resource.relationships.license.id().map(String::from);
        file
    }
}

impl MachineFile {
    /// Wraps certificate text read from disk.
    pub fn from_certificate(certificate: impl Into<String>) -> Self {
        Self {
            certificate: certificate.into(),
            ..Self::default()
        }
    }

    /// The secret a machine file is encrypted for.
    #[must_use]
    pub fn secret_for(license_key: &str, fingerprint: &str) -> String {
        format!("{license_key}{fingerprint}")
    }

    /// Parses the certificate.
    pub fn certificate(&self) -> LicenseResult<Certificate> {
        parse(&self.certificate, CertificateKind::Machine)
    }

    /// Checks the file signature.
    pub fn verify(&self, public_key: &PublicKey) -> LicenseResult<()> {
        verify(&self.certificate, CertificateKind::Machine, public_key)
    }

    /// Decrypts with `secret` (see [`Self::secret_for`]) and materializes
    /// the dataset.
    ///
    /// # Errors
    ///
    /// The machine-file counterparts of [`LicenseFile::decrypt`].
    pub fn decrypt(&self, secret: &str, policy: &DatasetPolicy) -> LicenseResult<MachineFileDataset> {
        if secret.is_empty() {
            return Err(LicenseError::MachineFileSecretMissing);
        }

        let data = decrypt(&self.certificate, CertificateKind::Machine, secret)?;
        materialize_machine_file(&data, policy)
    }

    /// Reads an unencrypted (`base64+ed25519`) machine file.
    pub fn decode(&self, policy: &DatasetPolicy) -> LicenseResult<MachineFileDataset> {
        let data = decode(&self.certificate, CertificateKind::Machine)?;
        materialize_machine_file(&data, policy)
    }

    /// Verifies, then decrypts.
    pub fn verify_and_decrypt(
        &self,
        public_key: &PublicKey,
        secret: &str,
        policy: &DatasetPolicy,
    ) -> LicenseResult<MachineFileDataset> {
        self.verify(public_key)?;
        self.decrypt(secret, policy)
    }
}
