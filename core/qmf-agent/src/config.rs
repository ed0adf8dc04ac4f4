//! Agent configuration.

use std::path::PathBuf;

/// Connection settings for the broker link.
///
/// Authentication is delegated to the transport; the agent only carries the
/// credentials through.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Broker hostname.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Optional username.
    pub username: Option<String>,
    /// Optional password.
    pub password: Option<String>,
    /// Optional SASL mechanism.
    pub mechanism: Option<String>,
    /// Wire protocol ("tcp" or "ssl").
    pub protocol: String,
}

impl ConnectionSettings {
    /// Settings for a broker at the given address.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5672,
            username: None,
            password: None,
            mechanism: None,
            protocol: "tcp".to_string(),
        }
    }
}

/// Host-facing agent configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Publish interval in seconds.
    pub interval_secs: u16,
    /// Queue method invocations for an external host thread instead of
    /// invoking them on the connection task.
    pub external_thread: bool,
    /// Path of the bank/boot-sequence store (`None` disables persistence).
    pub store_file: Option<PathBuf>,
    /// Broker connection settings.
    pub connection: ConnectionSettings,
    /// Vendor component of the agent's name-address.
    pub vendor: String,
    /// Product component of the agent's name-address.
    pub product: String,
    /// Instance component; a UUID is synthesized when absent.
    pub instance: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            external_thread: false,
            store_file: None,
            connection: ConnectionSettings::default(),
            vendor: "vendor".to_string(),
            product: "product".to_string(),
            instance: None,
        }
    }
}
