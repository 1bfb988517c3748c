//! Shared test helpers for upgrade tests.

#![allow(dead_code)]

use async_trait::async_trait;
use ed25519_dalek::SigningKey;
use keyward_crypto::PublicKey;
use keyward_license::ClientConfig;
use keyward_upgrade::{ArtifactSource, UpgradeError, UpgradeResult};
use serde_json::{Value, json};
use std::sync::Mutex;

/// The account key that verifies licenses.
pub fn account_keypair() -> (SigningKey, PublicKey) {
    let signing_key = SigningKey::from_bytes(&[1u8; 32]);
    let public_key = PublicKey::from(signing_key.verifying_key());
    (signing_key, public_key)
}

/// The publisher's personal release-signing key.
pub fn personal_keypair() -> (SigningKey, PublicKey) {
    let signing_key = SigningKey::from_bytes(&[42u8; 32]);
    let public_key = PublicKey::from(signing_key.verifying_key());
    (signing_key, public_key)
}

pub fn test_config() -> ClientConfig {
    let (_, public_key) = account_keypair();
    ClientConfig {
        account: "test".into(),
        product: "prod-1".into(),
        public_key: public_key.to_hex(),
        ..ClientConfig::default()
    }
}

pub fn release_document(id: &str, version: &str) -> Value {
    json!({
        "data": {
            "id": id,
            "type": "releases",
            "attributes": {
                "name": format!("v{version}"),
                "version": version,
                "channel": "stable",
                "metadata": {}
            }
        }
    })
}

pub fn artifact_document(id: &str, filename: &str, checksum: Option<&str>, signature: Option<&str>) -> Value {
    json!({
        "data": {
            "id": id,
            "type": "artifacts",
            "attributes": {
                "filename": filename,
                "filetype": null,
                "filesize": 11,
                "platform": "linux",
                "arch": "amd64",
                "checksum": checksum,
                "signature": signature
            },
            "relationships": {
                "release": { "data": { "type": "releases", "id": "rel-2" } }
            }
        }
    })
}

/// Serves fixed bytes and records requested URLs.
#[derive(Debug, Default)]
pub struct StaticSource {
    body: Option<Vec<u8>>,
    pub urls: Mutex<Vec<String>>,
}

impl StaticSource {
    pub fn new(body: &[u8]) -> Self {
        Self {
            body: Some(body.to_vec()),
            urls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub fn fetched(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactSource for StaticSource {
    async fn fetch(&self, url: &str) -> UpgradeResult<Vec<u8>> {
        self.urls.lock().unwrap().push(url.to_string());
        self.body
            .clone()
            .ok_or_else(|| UpgradeError::Download("connection refused".into()))
    }
}
