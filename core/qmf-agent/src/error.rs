//! Error types for the agent runtime.

use thiserror::Error;

/// Result type for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;

/// Errors that can occur in the agent runtime.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Broker transport failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// A wire payload could not be decoded.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
