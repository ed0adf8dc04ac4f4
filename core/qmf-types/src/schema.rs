//! Schema identity types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// 128-bit schema fingerprint that disambiguates schema versions.
///
/// Carried on the wire as a UUID under `_hash`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaHash(Uuid);

impl SchemaHash {
    /// Wraps a raw 16-byte fingerprint.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// The raw fingerprint bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for SchemaHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SchemaHash({})", self.0)
    }
}

impl fmt::Display for SchemaHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Schema identity as carried in wire payloads:
/// `{_package_name, _class_name, _hash}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaId {
    #[serde(rename = "_package_name")]
    package_name: String,
    #[serde(rename = "_class_name")]
    class_name: String,
    #[serde(rename = "_hash")]
    hash: SchemaHash,
}

impl SchemaId {
    /// Creates a schema identity.
    #[must_use]
    pub fn new(
        package_name: impl Into<String>,
        class_name: impl Into<String>,
        hash: SchemaHash,
    ) -> Self {
        Self {
            package_name: package_name.into(),
            class_name: class_name.into(),
            hash,
        }
    }

    /// The package the class belongs to.
    #[must_use]
    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    /// The class (or event) name.
    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// The schema fingerprint.
    #[must_use]
    pub fn hash(&self) -> SchemaHash {
        self.hash
    }

    /// The in-package lookup key for this schema.
    #[must_use]
    pub fn class_key(&self) -> SchemaClassKey {
        SchemaClassKey {
            name: self.class_name.clone(),
            hash: self.hash,
        }
    }

    /// Encodes the identity as its wire map.
    #[must_use]
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Key identifying a schema class within a package.
///
/// Equality requires both the name and the hash to match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaClassKey {
    /// Class or event name.
    pub name: String,
    /// Schema fingerprint.
    pub hash: SchemaHash,
}

/// Whether a schema describes a table of objects or an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    /// Object schema with properties and statistics.
    Table,
    /// Event schema.
    Event,
}
