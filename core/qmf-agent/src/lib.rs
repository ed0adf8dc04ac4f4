//! Embeddable QMF management agent for AMQP 0-10 brokers.
//!
//! A host process embeds [`ManagementAgent`] to expose telemetry,
//! configuration and invocable operations to a message-bus broker. Remote
//! consoles discover the agent, query its objects, subscribe to events and
//! invoke methods; the agent publishes periodic data indications and
//! heartbeats.
//!
//! # Architecture
//!
//! - **Engine**: [`AgentEngine`] is a pure state machine — it consumes
//!   decoded broker messages and produces [`Command`]s; no I/O.
//! - **Transport**: [`BrokerTransport`] / [`BrokerSession`] abstract the
//!   AMQP 0-10 client; `transport::mock` backs the tests.
//! - **Tasks**: the connection supervisor (connect, bind, pump, reconnect
//!   with exponential backoff) and the periodic publisher (snapshot +
//!   heartbeat every interval).
//! - **Handoff**: in external-thread mode, method invocations queue for the
//!   host, announced via a self-pipe descriptor or a callback.
//!
//! # Example
//!
//! ```no_run
//! use qmf_agent::{AgentConfig, ManagementAgent};
//! use qmf_agent::transport::mock::MockBroker;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let config = AgentConfig {
//!     vendor: "acme".to_string(),
//!     product: "svc".to_string(),
//!     ..AgentConfig::default()
//! };
//! let agent = ManagementAgent::init(config, Arc::new(MockBroker::new()));
//! // register schemata, add objects…
//! agent.close().await;
//! # }
//! ```

mod agent;
mod config;
mod connection;
mod engine;
mod error;
pub mod protocol;
mod publisher;
mod registry;
mod schema;
mod signal;
mod singleton;
mod store;
pub mod transport;

pub use agent::ManagementAgent;
pub use config::{AgentConfig, ConnectionSettings};
pub use connection::Backoff;
pub use engine::{AgentEngine, Command, Dispatch, PostAction, QueuedMethod};
pub use error::{AgentError, AgentResult};
pub use registry::PendingSet;
pub use schema::{SchemaClass, SchemaRegistry, SchemaWriter};
pub use signal::{Notifiable, NotifyTarget, SignalMode, SignalPipe};
pub use singleton::AgentSingleton;
pub use store::{BankStore, STORE_MAGIC};
pub use transport::{BrokerSession, BrokerTransport, ReplyTo, WireMessage};
