//! The managed-event capability interface.

use crate::SchemaId;
use serde_json::{Map, Value};

/// Severity ladder for raised events (syslog levels), plus a marker that
/// defers to the event's own default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Severity {
    /// Use the event's default severity.
    #[default]
    Default,
    Emergency,
    Alert,
    Critical,
    Error,
    Warning,
    Notice,
    Info,
    Debug,
}

impl Severity {
    /// The numeric severity level, or `None` for [`Severity::Default`].
    #[must_use]
    pub fn level(self) -> Option<u8> {
        match self {
            Severity::Default => None,
            Severity::Emergency => Some(0),
            Severity::Alert => Some(1),
            Severity::Critical => Some(2),
            Severity::Error => Some(3),
            Severity::Warning => Some(4),
            Severity::Notice => Some(5),
            Severity::Info => Some(6),
            Severity::Debug => Some(7),
        }
    }
}

/// Capability interface for an event raised through the agent.
pub trait ManagedEvent {
    /// Schema identity (package, event name, hash) of this event.
    fn schema_id(&self) -> SchemaId;

    /// The event's default severity level.
    fn severity(&self) -> u8 {
        6
    }

    /// Serializes the event arguments.
    fn encode(&self) -> Map<String, Value>;
}
