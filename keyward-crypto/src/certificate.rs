//! Certificate codec for license and machine files.
//!
//! A certificate is framed text:
//!
//! ```text
//! -----BEGIN LICENSE FILE-----
//! <base64 of {"enc": "...", "sig": "...", "alg": "..."}>
//! -----END LICENSE FILE-----
//! ```
//!
//! Parsing only decodes. Whether the certificate is genuine is decided by
//! the verifier, so every decode failure here collapses into the single
//! `CertificateInvalid` error.

use crate::error::{CryptoError, CryptoResult};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of file a certificate was issued as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CertificateKind {
    /// A license file (checked out from a license).
    License,
    /// A machine file (checked out from an activated machine).
    Machine,
}

impl CertificateKind {
    /// Opening marker, including the issuer's trailing newline.
    #[must_use]
    pub fn header(&self) -> &'static str {
        match self {
            Self::License => "-----BEGIN LICENSE FILE-----\n",
            Self::Machine => "-----BEGIN MACHINE FILE-----\n",
        }
    }

    /// Closing marker, including the issuer's trailing newline.
    #[must_use]
    pub fn footer(&self) -> &'static str {
        match self {
            Self::License => "-----END LICENSE FILE-----\n",
            Self::Machine => "-----END MACHINE FILE-----\n",
        }
    }

    /// Prefix bound into the signed message (`<prefix>/<enc>`).
    #[must_use]
    pub fn signing_prefix(&self) -> &'static str {
        match self {
            Self::License => "license",
            Self::Machine => "machine",
        }
    }
}

/// Certificate algorithm identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// `aes-256-gcm+ed25519`: encrypted dataset, Ed25519 signature.
    Aes256GcmEd25519,
    /// `base64+ed25519`: plain base64 dataset, Ed25519 signature.
    Base64Ed25519,
    /// `aes-256-gcm+rsa-pss-sha256`
    Aes256GcmRsaPssSha256,
    /// `aes-256-gcm+rsa-sha256`
    Aes256GcmRsaSha256,
    /// `base64+rsa-pss-sha256`
    Base64RsaPssSha256,
    /// `base64+rsa-sha256`
    Base64RsaSha256,
    /// Anything else the issuer may send in the future.
    Other(String),
}

impl Algorithm {
    /// Returns the wire identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Aes256GcmEd25519 => "aes-256-gcm+ed25519",
            Self::Base64Ed25519 => "base64+ed25519",
            Self::Aes256GcmRsaPssSha256 => "aes-256-gcm+rsa-pss-sha256",
            Self::Aes256GcmRsaSha256 => "aes-256-gcm+rsa-sha256",
            Self::Base64RsaPssSha256 => "base64+rsa-pss-sha256",
            Self::Base64RsaSha256 => "base64+rsa-sha256",
            Self::Other(alg) => alg,
        }
    }

    /// Returns true if the signature half is Ed25519.
    #[must_use]
    pub fn is_ed25519(&self) -> bool {
        matches!(self, Self::Aes256GcmEd25519 | Self::Base64Ed25519)
    }

    /// Returns true if the payload half is AES-256-GCM ciphertext.
    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        matches!(
            self,
            Self::Aes256GcmEd25519 | Self::Aes256GcmRsaPssSha256 | Self::Aes256GcmRsaSha256
        )
    }

    /// Returns true for the RSA variants, which are recognized but not
    /// implemented.
    #[must_use]
    pub fn is_rsa(&self) -> bool {
        matches!(
            self,
            Self::Aes256GcmRsaPssSha256
                | Self::Aes256GcmRsaSha256
                | Self::Base64RsaPssSha256
                | Self::Base64RsaSha256
        )
    }
}

impl From<&str> for Algorithm {
    fn from(alg: &str) -> Self {
        match alg {
            "aes-256-gcm+ed25519" => Self::Aes256GcmEd25519,
            "base64+ed25519" => Self::Base64Ed25519,
            "aes-256-gcm+rsa-pss-sha256" => Self::Aes256GcmRsaPssSha256,
            "aes-256-gcm+rsa-sha256" => Self::Aes256GcmRsaSha256,
            "base64+rsa-pss-sha256" => Self::Base64RsaPssSha256,
            "base64+rsa-sha256" => Self::Base64RsaSha256,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire shape of the decoded envelope.
#[derive(Serialize, Deserialize)]
struct Envelope {
    enc: String,
    sig: String,
    alg: String,
}

/// A parsed certificate.
///
/// `enc` and `sig` are kept exactly as issued: the signature covers the
/// still-encoded `enc` string, and decoding `sig` is the verifier's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    alg: Algorithm,
    enc: String,
    sig: String,
}

impl Certificate {
    /// Creates a certificate from its parts.
    pub fn new(alg: Algorithm, enc: impl Into<String>, sig: impl Into<String>) -> Self {
        Self {
            alg,
            enc: enc.into(),
            sig: sig.into(),
        }
    }

    /// Parses framed certificate text.
    ///
    /// `header` must open the text exactly. `footer` must close it, either
    /// exactly or without its final newline. The remainder is trimmed,
    /// line breaks are dropped, and the result is base64 then JSON decoded.
    ///
    /// # Errors
    ///
    /// Returns `CertificateInvalid` for any framing or decoding failure.
    pub fn parse(text: &str, header: &str, footer: &str) -> CryptoResult<Self> {
        let body = text
            .strip_prefix(header)
            .ok_or(CryptoError::CertificateInvalid)?;

        let body = body
            .strip_suffix(footer)
            .or_else(|| body.strip_suffix(footer.trim_end_matches('\n')))
            .ok_or(CryptoError::CertificateInvalid)?;

        let encoded: String = body
            .trim()
            .chars()
            .filter(|c| *c != '\n' && *c != '\r')
            .collect();

        let decoded = STANDARD
            .decode(encoded.as_bytes())
            .map_err(|_| CryptoError::CertificateInvalid)?;

        let envelope: Envelope =
            serde_json::from_slice(&decoded).map_err(|_| CryptoError::CertificateInvalid)?;

        Ok(Self {
            alg: Algorithm::from(envelope.alg.as_str()),
            enc: envelope.enc,
            sig: envelope.sig,
        })
    }

    /// Parses certificate text framed for `kind`.
    pub fn parse_kind(text: &str, kind: CertificateKind) -> CryptoResult<Self> {
        Self::parse(text, kind.header(), kind.footer())
    }

    /// Encodes the certificate into framed text for `kind`.
    pub fn encode(&self, kind: CertificateKind) -> String {
        let envelope = Envelope {
            enc: self.enc.clone(),
            sig: self.sig.clone(),
            alg: self.alg.as_str().to_string(),
        };
        // Serializing three owned strings cannot fail.
        let json = serde_json::to_vec(&envelope).unwrap_or_default();

        format!(
            "{}{}\n{}",
            kind.header(),
            STANDARD.encode(json),
            kind.footer()
        )
    }

    /// Returns the algorithm.
    #[must_use]
    pub fn alg(&self) -> &Algorithm {
        &self.alg
    }

    /// Returns the raw `enc` field, exactly as signed.
    #[must_use]
    pub fn enc(&self) -> &str {
        &self.enc
    }

    /// Returns the raw base64 `sig` field.
    #[must_use]
    pub fn sig(&self) -> &str {
        &self.sig
    }

    /// Decodes the payload of an unencrypted (`base64+...`) certificate.
    ///
    /// # Errors
    ///
    /// Encrypted or unknown algorithms are `UnsupportedAlgorithm`, since
    /// their `enc` is not a plain dataset. Bad base64 is `CertificateInvalid`.
    pub fn plain_payload(&self) -> CryptoResult<Vec<u8>> {
        if self.alg.is_encrypted() || matches!(self.alg, Algorithm::Other(_)) {
            return Err(CryptoError::UnsupportedAlgorithm(self.alg.to_string()));
        }

        STANDARD
            .decode(self.enc.as_bytes())
            .map_err(|_| CryptoError::CertificateInvalid)
    }
}
