//! Broker transport abstraction.
//!
//! The AMQP 0-10 client library is an external collaborator; these traits
//! cover exactly what the agent needs from it: open a session, declare and
//! bind the agent queue, transfer messages, and pump the subscription. The
//! [`mock`] module implements them over in-process channels for tests.

use crate::config::ConnectionSettings;
use crate::error::AgentResult;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Reply-to address carried on a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTo {
    /// Exchange to reply through.
    pub exchange: String,
    /// Routing key to reply with.
    pub routing_key: String,
}

impl ReplyTo {
    /// Creates a reply-to address.
    #[must_use]
    pub fn new(exchange: impl Into<String>, routing_key: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            routing_key: routing_key.into(),
        }
    }
}

/// A message as transferred to or received from the broker.
#[derive(Debug, Clone, Default)]
pub struct WireMessage {
    /// Correlation id echoed on responses.
    pub correlation_id: Option<String>,
    /// Application id (`"qmf2"` for V2 map messages).
    pub app_id: Option<String>,
    /// Content type (`"amqp/list"` for list bodies).
    pub content_type: Option<String>,
    /// Where responses should be routed.
    pub reply_to: Option<ReplyTo>,
    /// Application headers.
    pub headers: Map<String, Value>,
    /// Encoded body.
    pub body: Vec<u8>,
}

impl WireMessage {
    /// A string-valued application header, if present.
    #[must_use]
    pub fn header_str(&self, key: &str) -> Option<&str> {
        self.headers.get(key).and_then(Value::as_str)
    }
}

/// Factory for broker sessions.
#[async_trait]
pub trait BrokerTransport: Send + Sync {
    /// Opens a connection and a session named `session_name`.
    async fn connect(
        &self,
        settings: &ConnectionSettings,
        session_name: &str,
    ) -> AgentResult<Box<dyn BrokerSession>>;
}

/// One open session with the broker.
///
/// Methods take `&self` so the pump can wait for inbound messages while the
/// same session transfers outbound ones; implementations keep their own
/// interior channels.
#[async_trait]
pub trait BrokerSession: Send + Sync {
    /// Declares the agent queue.
    async fn declare_queue(&self, queue: &str, auto_delete: bool, exclusive: bool)
        -> AgentResult<()>;

    /// Binds the queue to an exchange.
    async fn bind(&self, exchange: &str, queue: &str, binding_key: &str) -> AgentResult<()>;

    /// Transfers a message to an exchange.
    async fn transfer(
        &self,
        exchange: &str,
        routing_key: &str,
        message: WireMessage,
    ) -> AgentResult<()>;

    /// Waits for the next inbound message. `Ok(None)` when the subscription
    /// ends; `Err` on a transport failure.
    async fn next_message(&self) -> AgentResult<Option<WireMessage>>;
}

/// A channel-backed broker for tests.
pub mod mock {
    use super::*;
    use crate::error::AgentError;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    /// A message the agent transferred to the mock broker.
    #[derive(Debug, Clone)]
    pub struct Transfer {
        pub exchange: String,
        pub routing_key: String,
        pub message: WireMessage,
    }

    /// A binding the agent declared.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Binding {
        pub exchange: String,
        pub queue: String,
        pub binding_key: String,
    }

    #[derive(Default)]
    struct MockState {
        fail_connects: Mutex<u32>,
        connect_attempts: Mutex<u32>,
        transfers: Mutex<Vec<Transfer>>,
        bindings: Mutex<Vec<Binding>>,
        inbound: Mutex<Option<mpsc::UnboundedSender<WireMessage>>>,
    }

    /// In-process broker double: records what the agent does and lets tests
    /// deliver messages to its subscription.
    #[derive(Clone, Default)]
    pub struct MockBroker {
        state: Arc<MockState>,
    }

    impl MockBroker {
        /// Creates a mock broker.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Makes the next `n` connect attempts fail.
        pub fn fail_next_connects(&self, n: u32) {
            *self.state.fail_connects.lock() = n;
        }

        /// Number of connect attempts observed so far.
        #[must_use]
        pub fn connect_attempts(&self) -> u32 {
            *self.state.connect_attempts.lock()
        }

        /// Everything the agent has transferred.
        #[must_use]
        pub fn transfers(&self) -> Vec<Transfer> {
            self.state.transfers.lock().clone()
        }

        /// Takes (and clears) the recorded transfers.
        pub fn take_transfers(&self) -> Vec<Transfer> {
            std::mem::take(&mut *self.state.transfers.lock())
        }

        /// Bindings declared on the current session.
        #[must_use]
        pub fn bindings(&self) -> Vec<Binding> {
            self.state.bindings.lock().clone()
        }

        /// Delivers a message to the agent's subscription, if connected.
        pub fn deliver(&self, message: WireMessage) {
            if let Some(tx) = &*self.state.inbound.lock() {
                let _ = tx.send(message);
            }
        }

        /// Ends the current subscription, as a broker-side close would.
        pub fn drop_connection(&self) {
            self.state.inbound.lock().take();
        }
    }

    #[async_trait]
    impl BrokerTransport for MockBroker {
        async fn connect(
            &self,
            _settings: &ConnectionSettings,
            _session_name: &str,
        ) -> AgentResult<Box<dyn BrokerSession>> {
            *self.state.connect_attempts.lock() += 1;
            {
                let mut failures = self.state.fail_connects.lock();
                if *failures > 0 {
                    *failures -= 1;
                    return Err(AgentError::Transport("mock connect refused".to_string()));
                }
            }
            let (tx, rx) = mpsc::unbounded_channel();
            *self.state.inbound.lock() = Some(tx);
            Ok(Box::new(MockSession {
                state: self.state.clone(),
                inbound: tokio::sync::Mutex::new(rx),
            }))
        }
    }

    struct MockSession {
        state: Arc<MockState>,
        inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<WireMessage>>,
    }

    #[async_trait]
    impl BrokerSession for MockSession {
        async fn declare_queue(
            &self,
            _queue: &str,
            _auto_delete: bool,
            _exclusive: bool,
        ) -> AgentResult<()> {
            Ok(())
        }

        async fn bind(&self, exchange: &str, queue: &str, binding_key: &str) -> AgentResult<()> {
            self.state.bindings.lock().push(Binding {
                exchange: exchange.to_string(),
                queue: queue.to_string(),
                binding_key: binding_key.to_string(),
            });
            Ok(())
        }

        async fn transfer(
            &self,
            exchange: &str,
            routing_key: &str,
            message: WireMessage,
        ) -> AgentResult<()> {
            self.state.transfers.lock().push(Transfer {
                exchange: exchange.to_string(),
                routing_key: routing_key.to_string(),
                message,
            });
            Ok(())
        }

        async fn next_message(&self) -> AgentResult<Option<WireMessage>> {
            Ok(self.inbound.lock().await.recv().await)
        }
    }
}
