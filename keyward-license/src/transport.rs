//! Transport layer abstraction.
//!
//! The licensing API is reached through [`Transport`], so validation,
//! heartbeats and upgrades work against any backend: the reqwest-backed
//! [`HttpTransport`] in production and [`mock::MockTransport`] in tests.

use crate::error::{LicenseError, LicenseResult};
use crate::resource::{ResourceType, decode_primary};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keyward_crypto::{Headers, HttpMessage, PublicKey, verify_message_at};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
use url::Url;

/// JSON:API media type.
pub const JSONAPI_MEDIA_TYPE: &str = "application/vnd.api+json";

/// Header asking the API to sign its responses.
pub const ACCEPT_SIGNATURE_HEADER: &str = "Keygen-Accept-Signature";

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
}

impl Method {
    /// Returns the uppercase method name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A response from the licensing API.
#[derive(Debug, Clone)]
pub struct Response {
    /// Method of the originating request.
    pub method: Method,
    /// Full URL of the originating request.
    pub url: Url,
    /// HTTP status.
    pub status: u16,
    /// Response headers.
    pub headers: Headers,
    /// Raw body.
    pub body: Vec<u8>,
}

impl Response {
    /// Returns true for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns true for 3xx statuses.
    #[must_use]
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    /// Deserializes the body.
    pub fn json<T: DeserializeOwned>(&self) -> LicenseResult<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Decodes the primary resource of a JSON:API body.
    pub fn primary<T: ResourceType>(&self) -> LicenseResult<T> {
        Ok(decode_primary(&self.body)?)
    }

    /// Returns the request target (`path?query`).
    #[must_use]
    pub fn target(&self) -> String {
        request_target(&self.url)
    }

    /// Returns the `Host` value the request was sent with.
    #[must_use]
    pub fn host(&self) -> String {
        request_host(&self.url)
    }
}

fn request_target(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_string(),
    }
}

fn request_host(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

/// A connection to the licensing API.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a request and returns the response, whatever its status.
    ///
    /// `path` is relative to the account, e.g. `licenses/{id}/actions/validate`.
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> LicenseResult<Response>;

    /// Sends a request and maps unsuccessful statuses to errors.
    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> LicenseResult<Response> {
        let response = self.request(method, path, body).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(api_error(&response))
        }
    }
}

// ── Error classification ─────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct ErrorDocument {
    #[serde(default)]
    errors: Vec<ErrorObject>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorObject {
    code: Option<String>,
    detail: Option<String>,
}

/// Classifies an unsuccessful response by status and first error code.
#[must_use]
pub fn api_error(response: &Response) -> LicenseError {
    let first = serde_json::from_slice::<ErrorDocument>(&response.body)
        .ok()
        .and_then(|doc| doc.errors.into_iter().next())
        .unwrap_or_default();

    match (response.status, first.code.as_deref()) {
        (_, Some("FINGERPRINT_TAKEN")) => LicenseError::MachineAlreadyActivated,
        (_, Some("MACHINE_LIMIT_EXCEEDED")) => LicenseError::MachineLimitExceeded,
        (_, Some("MACHINE_PROCESS_LIMIT_EXCEEDED")) => LicenseError::ProcessLimitExceeded,
        (_, Some("MACHINE_HEARTBEAT_DEAD" | "PROCESS_HEARTBEAT_DEAD")) => {
            LicenseError::HeartbeatDead
        }
        (401, Some("TOKEN_INVALID")) => LicenseError::LicenseTokenInvalid,
        (401, Some("LICENSE_INVALID")) => LicenseError::LicenseKeyInvalid,
        (403, _) => LicenseError::NotAuthorized,
        (404, _) => LicenseError::NotFound,
        (429, _) => LicenseError::RateLimited {
            retry_after_secs: response
                .headers
                .get("retry-after")
                .and_then(|v| v.trim().parse().ok()),
        },
        (status, _) => LicenseError::Api {
            status,
            code: first.code,
            detail: first.detail,
        },
    }
}

// ── Signature checks ─────────────────────────────────────────────

/// Verifies a response signature as of `now`.
///
/// The digest, date and signature checks fail independently; see
/// [`keyward_crypto::verify_message_at`].
pub fn verify_response_at(
    response: &Response,
    public_key: &PublicKey,
    max_clock_drift: Option<Duration>,
    now: DateTime<Utc>,
) -> LicenseResult<()> {
    let host = response.host();
    let target = response.target();
    let message = HttpMessage {
        method: response.method.as_str(),
        host: &host,
        target: &target,
        headers: &response.headers,
        body: &response.body,
    };

    verify_message_at(&message, public_key, max_clock_drift, now).map_err(LicenseError::from)
}

/// Verifies a response signature against the current time.
pub fn verify_response(
    response: &Response,
    public_key: &PublicKey,
    max_clock_drift: Option<Duration>,
) -> LicenseResult<()> {
    verify_response_at(response, public_key, max_clock_drift, Utc::now())
}

/// Verifies an inbound signed request (a webhook) as of `now`.
///
/// `url` is the URL the request was received on, as the sender
/// addressed it.
pub fn verify_request_at(
    method: &str,
    url: &Url,
    headers: &Headers,
    body: &[u8],
    public_key: &PublicKey,
    max_clock_drift: Option<Duration>,
    now: DateTime<Utc>,
) -> LicenseResult<()> {
    let host = request_host(url);
    let target = request_target(url);
    let message = HttpMessage {
        method,
        host: &host,
        target: &target,
        headers,
        body,
    };

    verify_message_at(&message, public_key, max_clock_drift, now).map_err(LicenseError::from)
}

/// Verifies an inbound signed request against the current time.
pub fn verify_request(
    method: &str,
    url: &Url,
    headers: &Headers,
    body: &[u8],
    public_key: &PublicKey,
    max_clock_drift: Option<Duration>,
) -> LicenseResult<()> {
    verify_request_at(method, url, headers, body, public_key, max_clock_drift, Utc::now())
}

/// Builds `{api_url}/{api_version}/accounts/{account}/{path}`.
pub fn account_url(config: &crate::config::ClientConfig, path: &str) -> LicenseResult<Url> {
    let base = config.api_url.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    Ok(Url::parse(&format!(
        "{base}/{}/accounts/{}/{path}",
        config.api_version, config.account
    ))?)
}

// ── HTTP transport ───────────────────────────────────────────────

#[cfg(feature = "online")]
pub use http::HttpTransport;

#[cfg(feature = "online")]
mod http {
    use super::*;
    use crate::config::ClientConfig;
    use reqwest::Client;
    use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
    use tracing::{debug, warn};

    /// Reqwest-backed transport sharing one pooled client.
    pub struct HttpTransport {
        config: ClientConfig,
        client: Client,
        public_key: Option<PublicKey>,
    }

    impl HttpTransport {
        /// Creates a transport for `config`.
        ///
        /// # Errors
        ///
        /// `PublicKeyInvalid` for a malformed configured key, or a
        /// network error if the client cannot be built.
        pub fn new(config: ClientConfig) -> LicenseResult<Self> {
            // Artifact lookups answer 303 with the download URL in Location.
            let client = Client::builder()
                .timeout(config.request_timeout)
                .user_agent(config.user_agent())
                .redirect(reqwest::redirect::Policy::none())
                .build()?;

            let public_key = if config.verify_responses && !config.public_key.is_empty() {
                Some(config.verify_key()?)
            } else {
                None
            };

            Ok(Self {
                config,
                client,
                public_key,
            })
        }

        /// Returns the configuration.
        pub fn config(&self) -> &ClientConfig {
            &self.config
        }
    }

    #[async_trait]
    impl Transport for HttpTransport {
        async fn request(
            &self,
            method: Method,
            path: &str,
            body: Option<serde_json::Value>,
        ) -> LicenseResult<Response> {
            let url = account_url(&self.config, path)?;
            let reqwest_method = match method {
                Method::Get => reqwest::Method::GET,
                Method::Post => reqwest::Method::POST,
                Method::Put => reqwest::Method::PUT,
                Method::Patch => reqwest::Method::PATCH,
                Method::Delete => reqwest::Method::DELETE,
            };

            let mut request = self
                .client
                .request(reqwest_method, url.clone())
                .header(ACCEPT, JSONAPI_MEDIA_TYPE)
                .header(CONTENT_TYPE, JSONAPI_MEDIA_TYPE)
                .header(ACCEPT_SIGNATURE_HEADER, r#"algorithm="ed25519""#);

            if let Some(authorization) = self.config.authorization() {
                request = request.header(AUTHORIZATION, authorization);
            }
            if let Some(body) = body {
                request = request.body(serde_json::to_vec(&body)?);
            }

            debug!(%method, %url, "sending api request");
            let response = request.send().await?;
            let status = response.status().as_u16();
            let headers: Headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string()))
                })
                .collect();
            let body = response.bytes().await?.to_vec();

            let response = Response {
                method,
                url,
                status,
                headers,
                body,
            };
            debug!(%method, status, "api response received");

            if let Some(public_key) = &self.public_key {
                verify_response(&response, public_key, self.config.max_clock_drift).inspect_err(
                    |e| warn!(%method, status, error = %e, "response signature check failed"),
                )?;
            }

            Ok(response)
        }
    }
}

// ── Mock ─────────────────────────────────────────────────────────

/// A mock transport for testing. Enabled by the `test-util` feature.
#[cfg(any(test, feature = "test-util"))]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Mutex, PoisonError};

    /// A request seen by the mock.
    #[derive(Debug, Clone, PartialEq)]
    pub struct RecordedCall {
        /// Method.
        pub method: Method,
        /// Account-relative path.
        pub path: String,
        /// JSON body, if any.
        pub body: Option<serde_json::Value>,
    }

    #[derive(Debug, Clone)]
    enum Reply {
        Response {
            status: u16,
            headers: Headers,
            body: Vec<u8>,
        },
        NetworkError(String),
    }

    /// Replays scripted responses in order and records every call.
    ///
    /// Once the script is exhausted, the fallback reply (if any) is
    /// repeated; otherwise requests fail with a network error.
    #[derive(Debug)]
    pub struct MockTransport {
        base: String,
        replies: Mutex<VecDeque<Reply>>,
        fallback: Mutex<Option<Reply>>,
        calls: Mutex<Vec<RecordedCall>>,
    }

    impl Default for MockTransport {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockTransport {
        /// Creates an empty mock for account `test`.
        pub fn new() -> Self {
            Self {
                base: "https://api.keygen.sh/v1/accounts/test".to_string(),
                replies: Mutex::new(VecDeque::new()),
                fallback: Mutex::new(None),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Queues a JSON response.
        pub fn push_json(&self, status: u16, body: serde_json::Value) -> &Self {
            self.push_response(status, Headers::new(), body.to_string().into_bytes())
        }

        /// Queues a raw response.
        pub fn push_response(&self, status: u16, headers: Headers, body: Vec<u8>) -> &Self {
            self.replies
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push_back(Reply::Response {
                    status,
                    headers,
                    body,
                });
            self
        }

        /// Queues a network failure.
        pub fn push_network_error(&self, message: impl Into<String>) -> &Self {
            self.replies
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push_back(Reply::NetworkError(message.into()));
            self
        }

        /// Sets the JSON response repeated after the script runs out.
        pub fn set_fallback_json(&self, status: u16, body: serde_json::Value) -> &Self {
            *self.fallback.lock().unwrap_or_else(PoisonError::into_inner) =
                Some(Reply::Response {
                    status,
                    headers: Headers::new(),
                    body: body.to_string().into_bytes(),
                });
            self
        }

        /// Returns every call made so far.
        pub fn calls(&self) -> Vec<RecordedCall> {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Returns the number of calls made so far.
        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn request(
            &self,
            method: Method,
            path: &str,
            body: Option<serde_json::Value>,
        ) -> LicenseResult<Response> {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(RecordedCall {
                    method,
                    path: path.to_string(),
                    body,
                });

            let scripted = self
                .replies
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            let reply = match scripted {
                Some(reply) => reply,
                None => self
                    .fallback
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone()
                    .ok_or_else(|| LicenseError::Network("no scripted response".into()))?,
            };

            match reply {
                Reply::Response {
                    status,
                    headers,
                    body,
                } => Ok(Response {
                    method,
                    url: Url::parse(&format!("{}/{}", self.base, path.trim_start_matches('/')))?,
                    status,
                    headers,
                    body,
                }),
                Reply::NetworkError(message) => Err(LicenseError::Network(message)),
            }
        }
    }
}
