//! Resource model for API documents and decrypted datasets.
//!
//! Documents follow JSON:API: a primary `data` resource, optional
//! `included` resources and a `meta` object. Each resource type
//! deserializes its attributes directly and then takes its id and typed
//! relationship ids from the envelope in [`ResourceType::from_resource`].

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Scheme of a license key signed with Ed25519.
pub const SCHEME_ED25519_SIGN: &str = "ED25519_SIGN";

// ── Metadata ─────────────────────────────────────────────────────

/// A metadata value. Server-added keys round-trip without loss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    /// JSON `null`.
    Null,
    /// JSON boolean.
    Bool(bool),
    /// JSON number.
    Number(serde_json::Number),
    /// JSON string.
    String(String),
    /// JSON array.
    Array(Vec<MetadataValue>),
    /// JSON object.
    Object(BTreeMap<String, MetadataValue>),
}

impl MetadataValue {
    /// Returns the string value, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the boolean value, if this is a boolean.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value as `i64`, if this is an integral number.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    /// Returns the value as `f64`, if this is a number.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    /// Returns true for `null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// Free-form key-value metadata attached to a resource.
pub type Metadata = BTreeMap<String, MetadataValue>;

// ── Envelope ─────────────────────────────────────────────────────

/// A `{type, id}` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    /// Resource type, e.g. `licenses`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Resource id.
    pub id: String,
}

/// Linkage data of one relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Linkage {
    /// To-one relationship.
    One(ResourceIdentifier),
    /// To-many relationship.
    Many(Vec<ResourceIdentifier>),
}

/// A relationship object. `data` is absent for unloaded to-many links.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    /// Linkage data.
    #[serde(default)]
    pub data: Option<Linkage>,
}

impl Relationship {
    /// Returns the id of a to-one relationship.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match &self.data {
            Some(Linkage::One(identifier)) => Some(&identifier.id),
            _ => None,
        }
    }
}

/// The relationships this crate follows. Others are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Relationships {
    /// Owning policy.
    pub policy: Relationship,
    /// Owning license.
    pub license: Relationship,
    /// Owning machine.
    pub machine: Relationship,
    /// Owning product.
    pub product: Relationship,
    /// Owning release.
    pub release: Relationship,
}

/// A resource object with attributes of type `A`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Resource<A> {
    /// Resource id.
    pub id: String,
    /// Resource type.
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-specific attributes.
    pub attributes: A,
    /// Typed relationships.
    #[serde(default)]
    pub relationships: Relationships,
}

/// An included resource whose type is only known at runtime.
pub type IncludedResource = Resource<serde_json::Value>;

impl IncludedResource {
    /// Decodes into `T` if this resource has `T`'s type.
    ///
    /// Returns `None` for any other type, so unknown kinds can be skipped.
    pub fn decode<T: ResourceType>(&self) -> Option<serde_json::Result<T>> {
        if self.kind != T::TYPE {
            return None;
        }

        Some(
            serde_json::from_value::<T>(self.attributes.clone()).map(|attributes| {
                T::from_resource(Resource {
                    id: self.id.clone(),
                    kind: self.kind.clone(),
                    attributes,
                    relationships: self.relationships.clone(),
                })
            }),
        )
    }
}

/// A JSON:API document with primary data of type `A` and meta `M`.
#[derive(Debug, Clone, Deserialize)]
pub struct Document<A, M = serde_json::Value> {
    /// Primary resource.
    pub data: Resource<A>,
    /// Side-loaded resources.
    #[serde(default)]
    pub included: Vec<IncludedResource>,
    /// Document meta.
    #[serde(default)]
    pub meta: M,
}

impl<A: ResourceType, M> Document<A, M> {
    /// Returns the primary resource with its id and relationships applied.
    pub fn into_primary(self) -> A {
        A::from_resource(self.data)
    }
}

/// Decodes the primary resource of a document body.
pub fn decode_primary<T: ResourceType>(body: &[u8]) -> serde_json::Result<T> {
    let document: Document<T> = serde_json::from_slice(body)?;
    Ok(document.into_primary())
}

/// A resource type that can be materialized from a [`Resource`].
pub trait ResourceType: DeserializeOwned + Sized {
    /// JSON:API type name.
    const TYPE: &'static str;

    /// Builds the value from its envelope.
    fn from_resource(resource: Resource<Self>) -> Self;
}

// ── Resources ────────────────────────────────────────────────────

/// Machine heartbeat status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HeartbeatStatus {
    /// No heartbeat received yet.
    #[default]
    NotStarted,
    /// Heartbeats arrive within the window.
    Alive,
    /// The window passed without a heartbeat.
    Dead,
    /// Dead, then revived by a late heartbeat.
    Resurrected,
    /// A status this crate does not know.
    #[serde(other)]
    Unknown,
}

/// Process liveness status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessStatus {
    /// Heartbeats arrive within the interval.
    #[default]
    Alive,
    /// The interval passed without a heartbeat.
    Dead,
    /// A status this crate does not know.
    #[serde(other)]
    Unknown,
}

/// A license.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct License {
    /// License id.
    #[serde(skip)]
    pub id: String,
    /// Display name.
    pub name: Option<String>,
    /// License key (possibly signed).
    pub key: String,
    /// Expiry, if the policy has a duration.
    pub expiry: Option<DateTime<Utc>>,
    /// Key signing scheme, e.g. [`SCHEME_ED25519_SIGN`].
    pub scheme: Option<String>,
    /// Server-side status, e.g. `ACTIVE`.
    pub status: Option<String>,
    /// Machines must send heartbeats.
    pub require_heartbeat: bool,
    /// Last server-side validation time.
    pub last_validated: Option<DateTime<Utc>>,
    /// Creation time.
    pub created: Option<DateTime<Utc>>,
    /// Update time.
    pub updated: Option<DateTime<Utc>>,
    /// Free-form metadata.
    pub metadata: Metadata,
    /// Owning policy id.
    #[serde(skip)]
    pub policy_id: Option<String>,
    /// Result of the most recent validation through this crate.
    #[serde(skip)]
    pub last_validation: Option<crate::validation::ValidationResult>,
}

impl ResourceType for License {
    const TYPE: &'static str = "licenses";

    fn from_resource(resource: Resource<Self>) -> Self {
        let mut license = resource.attributes;
        license.id = resource.id;
        license.policy_id = resource.relationships.policy.id().map(String::from);
        license
    }
}

/// An activated machine.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Machine {
    /// Machine id.
    #[serde(skip)]
    pub id: String,
    /// Display name.
    pub name: Option<String>,
    /// Machine fingerprint.
    pub fingerprint: String,
    /// Hostname at activation.
    pub hostname: Option<String>,
    /// Platform at activation.
    pub platform: Option<String>,
    /// IP address at activation.
    pub ip: Option<String>,
    /// CPU core count.
    pub cores: Option<u32>,
    /// Heartbeats are required for this machine.
    pub require_heartbeat: bool,
    /// Current heartbeat status.
    pub heartbeat_status: HeartbeatStatus,
    /// Heartbeat window in seconds.
    pub heartbeat_duration: Option<u64>,
    /// Creation time.
    pub created: Option<DateTime<Utc>>,
    /// Update time.
    pub updated: Option<DateTime<Utc>>,
    /// Free-form metadata.
    pub metadata: Metadata,
    /// Owning license id.
    #[serde(skip)]
    pub license_id: Option<String>,
}

impl ResourceType for Machine {
    const TYPE: &'static str = "machines";

    fn from_resource(resource: Resource<Self>) -> Self {
        let mut machine = resource.attributes;
        machine.id = resource.id;
        machine.license_id = resource.relationships.license.id().map(String::from);
        machine
    }
}

/// A process running on a machine.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Process {
    /// Process id.
    #[serde(skip)]
    pub id: String,
    /// Caller-chosen process identifier.
    pub pid: String,
    /// Liveness status.
    pub status: ProcessStatus,
    /// Heartbeat interval in seconds.
    pub interval: u64,
    /// Creation time.
    pub created: Option<DateTime<Utc>>,
    /// Update time.
    pub updated: Option<DateTime<Utc>>,
    /// Free-form metadata.
    pub metadata: Metadata,
    /// Owning machine id.
    #[serde(skip)]
    pub machine_id: Option<String>,
}

impl ResourceType for Process {
    const TYPE: &'static str = "processes";

    fn from_resource(resource: Resource<Self>) -> Self {
        let mut process = resource.attributes;
        process.id = resource.id;
        process.machine_id = resource.relationships.machine.id().map(String::from);
        process
    }
}

/// A hardware component of a machine.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Component {
    /// Component id.
    #[serde(skip)]
    pub id: String,
    /// Component fingerprint.
    pub fingerprint: String,
    /// Display name.
    pub name: String,
    /// Creation time.
    pub created: Option<DateTime<Utc>>,
    /// Update time.
    pub updated: Option<DateTime<Utc>>,
    /// Free-form metadata.
    pub metadata: Metadata,
    /// Owning machine id.
    #[serde(skip)]
    pub machine_id: Option<String>,
}

impl ResourceType for Component {
    const TYPE: &'static str = "components";

    fn from_resource(resource: Resource<Self>) -> Self {
        let mut component = resource.attributes;
        component.id = resource.id;
        component.machine_id = resource.relationships.machine.id().map(String::from);
        component
    }
}

/// A feature entitlement attached to a license.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Entitlement {
    /// Entitlement id.
    #[serde(skip)]
    pub id: String,
    /// Display name.
    pub name: Option<String>,
    /// Machine-readable code.
    pub code: String,
    /// Creation time.
    pub created: Option<DateTime<Utc>>,
    /// Update time.
    pub updated: Option<DateTime<Utc>>,
    /// Free-form metadata.
    pub metadata: Metadata,
}

impl ResourceType for Entitlement {
    const TYPE: &'static str = "entitlements";

    fn from_resource(resource: Resource<Self>) -> Self {
        let mut entitlement = resource.attributes;
        entitlement.id = resource.id;
        entitlement
    }
}
