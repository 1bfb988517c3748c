//! Signed HTTP message verification.
//!
//! The licensing API signs responses (and webhook requests) with Ed25519
//! over a canonical string built from pseudo-headers:
//!
//! ```text
//! (request-target): get /v1/accounts/acme/licenses/1?limit=1
//! host: api.keygen.sh
//! date: Wed, 09 Jun 2021 16:08:15 GMT
//! digest: sha-256=...
//! ```
//!
//! Three checks run in order and fail independently: the body digest,
//! the date age (replay window), then the signature itself.

use crate::error::{CryptoError, CryptoResult};
use crate::key::PublicKey;
use crate::signature::verify_detached;
use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Header carrying the body digest.
pub const DIGEST_HEADER: &str = "digest";

/// Header carrying the message date.
pub const DATE_HEADER: &str = "date";

/// Header carrying the signature parameters.
pub const SIGNATURE_HEADER: &str = "keygen-signature";

/// Default replay window for signed messages.
pub const DEFAULT_MAX_CLOCK_DRIFT: Duration = Duration::from_secs(5 * 60);

/// Pseudo-headers every signature must cover, in signing order.
///
/// A signature header listing anything else is rejected, so the signer
/// cannot leave the target, host or digest out of the signed string.
pub const SIGNED_HEADERS: [&str; 4] = ["(request-target)", "host", "date", "digest"];

/// Case-insensitive header map. Names are stored lowercased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(BTreeMap<String, String>);

impl Headers {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a header, replacing any previous value.
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.0.insert(name.as_ref().to_ascii_lowercase(), value.into());
    }

    /// Returns a header value by case-insensitive name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Returns true if no headers are present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over `(lowercased name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

/// The parts of an HTTP exchange that are covered by the signature.
///
/// For a response, `method` and `target` are those of the request that
/// produced it.
#[derive(Debug, Clone, Copy)]
pub struct HttpMessage<'a> {
    /// Request method, any case.
    pub method: &'a str,
    /// Host (with port when non-default).
    pub host: &'a str,
    /// Path plus `?query` when present.
    pub target: &'a str,
    /// Message headers.
    pub headers: &'a Headers,
    /// Raw body bytes.
    pub body: &'a [u8],
}

/// Parsed `Keygen-Signature` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureParams {
    /// Identifier of the signing key (the account id).
    pub keyid: Option<String>,
    /// Signature algorithm, expected to be `ed25519`.
    pub algorithm: Option<String>,
    /// Base64 signature.
    pub signature: String,
    /// Ordered list of signed (pseudo-)headers.
    pub headers: Vec<String>,
}

impl SignatureParams {
    /// Parses `key="value"` pairs separated by commas.
    ///
    /// # Errors
    ///
    /// Returns `SignatureMissing` when there is no `signature` parameter.
    pub fn parse(header: &str) -> CryptoResult<Self> {
        let mut params: BTreeMap<&str, &str> = BTreeMap::new();
        for pair in header.split(',') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            params.insert(key.trim(), value.trim().trim_matches('"'));
        }

        let signature = params
            .get("signature")
            .filter(|s| !s.is_empty())
            .ok_or(CryptoError::SignatureMissing)?
            .to_string();

        let headers = match params.get("headers") {
            Some(list) if !list.trim().is_empty() => {
                list.split_whitespace().map(str::to_ascii_lowercase).collect()
            }
            _ => SIGNED_HEADERS.iter().map(|h| h.to_string()).collect(),
        };

        Ok(Self {
            keyid: params.get("keyid").map(|s| s.to_string()),
            algorithm: params.get("algorithm").map(|s| s.to_string()),
            signature,
            headers,
        })
    }
}

/// Computes the `Digest` header value for a body: `sha-256=<base64>`.
pub fn body_digest(body: &[u8]) -> String {
    format!("sha-256={}", STANDARD.encode(Sha256::digest(body)))
}

/// Formats a timestamp as an RFC 1123 HTTP date.
pub fn format_http_date(date: DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Parses an RFC 1123 HTTP date.
pub fn parse_http_date(value: &str) -> CryptoResult<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .map(|d| d.with_timezone(&Utc))
        .map_err(|_| CryptoError::DateInvalid)
}

/// Builds the canonical signing string for `message`.
///
/// # Errors
///
/// Returns `SignatureInvalid` if a listed header is absent from the
/// message, since the signature cannot cover it.
pub fn signing_string(message: &HttpMessage<'_>, signed_headers: &[String]) -> CryptoResult<String> {
    let lines = signed_headers
        .iter()
        .map(|name| match name.as_str() {
            "(request-target)" => Ok(format!(
                "(request-target): {} {}",
                message.method.to_ascii_lowercase(),
                message.target
            )),
            "host" => Ok(format!("host: {}", message.host)),
            other => message
                .headers
                .get(other)
                .map(|value| format!("{other}: {value}"))
                .ok_or(CryptoError::SignatureInvalid),
        })
        .collect::<CryptoResult<Vec<_>>>()?;

    Ok(lines.join("\n"))
}

/// Verifies a signed message against the current time.
pub fn verify_message(
    message: &HttpMessage<'_>,
    public_key: &PublicKey,
    max_clock_drift: Option<Duration>,
) -> CryptoResult<()> {
    verify_message_at(message, public_key, max_clock_drift, Utc::now())
}

/// Verifies a signed message as of `now`.
///
/// A `max_clock_drift` of `None` disables the age check; the date must
/// still parse.
///
/// # Errors
///
/// In check order: `DigestMissing`/`DigestInvalid`,
/// `DateInvalid`/`DateTooOld`, then `SignatureMissing`,
/// `SignatureAlgorithmUnsupported` or `SignatureInvalid`. A signature
/// whose `headers` list is not exactly [`SIGNED_HEADERS`] is
/// `SignatureInvalid`.
pub fn verify_message_at(
    message: &HttpMessage<'_>,
    public_key: &PublicKey,
    max_clock_drift: Option<Duration>,
    now: DateTime<Utc>,
) -> CryptoResult<()> {
    let digest_header = message
        .headers
        .get(DIGEST_HEADER)
        .ok_or(CryptoError::DigestMissing)?;

    if body_digest(message.body) != digest_header {
        debug!(target = message.target, "message digest does not match body");
        return Err(CryptoError::DigestInvalid);
    }

    let date_header = message
        .headers
        .get(DATE_HEADER)
        .ok_or(CryptoError::DateInvalid)?;
    let date = parse_http_date(date_header)?;

    if let Some(max_drift) = max_clock_drift {
        // A negative age (date ahead of us) is within the window.
        if let Ok(age) = now.signed_duration_since(date).to_std() {
            if age > max_drift {
                debug!(?age, ?max_drift, "message date is outside the replay window");
                return Err(CryptoError::DateTooOld);
            }
        }
    }

    let params = message
        .headers
        .get(SIGNATURE_HEADER)
        .ok_or(CryptoError::SignatureMissing)
        .and_then(SignatureParams::parse)?;

    if let Some(algorithm) = params.algorithm.as_deref() {
        if !algorithm.eq_ignore_ascii_case("ed25519") {
            return Err(CryptoError::SignatureAlgorithmUnsupported(algorithm.to_string()));
        }
    }

    if params.headers != SIGNED_HEADERS {
        debug!(headers = ?params.headers, "signature does not cover the required headers");
        return Err(CryptoError::SignatureInvalid);
    }

    let signing = signing_string(message, &params.headers)?;
    let signature = STANDARD
        .decode(params.signature.as_bytes())
        .map_err(|_| CryptoError::SignatureInvalid)?;

    verify_detached(public_key, signing.as_bytes(), &signature)
        .map_err(|_| CryptoError::SignatureInvalid)
}
