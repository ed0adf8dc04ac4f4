//! Object identifier type.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Identifies a managed object across the fleet.
///
/// Non-persistent objects embed the agent's boot sequence as their epoch so
/// consoles can detect agent restarts; persistent objects use epoch 0. The
/// wire form is the ordered map `{_agent_epoch, _object_name}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectId {
    #[serde(rename = "_agent_epoch")]
    agent_epoch: u64,
    #[serde(rename = "_object_name")]
    object_name: String,
}

impl ObjectId {
    /// Creates an identifier from its components.
    #[must_use]
    pub fn new(agent_epoch: u64, object_name: impl Into<String>) -> Self {
        Self {
            agent_epoch,
            object_name: object_name.into(),
        }
    }

    /// The boot-sequence epoch (0 for persistent objects).
    #[must_use]
    pub fn agent_epoch(&self) -> u64 {
        self.agent_epoch
    }

    /// The object's V2 key.
    #[must_use]
    pub fn object_name(&self) -> &str {
        &self.object_name
    }

    /// Encodes the identifier as its wire map.
    #[must_use]
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Reconstructs an identifier from its wire map.
    pub fn from_map(map: &Map<String, Value>) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(map.clone()))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.agent_epoch, self.object_name)
    }
}
