//! Connection supervisor — connect, bind, pump, reconnect with backoff.
//!
//! The supervisor cycles through Disconnected → Connecting → Operational,
//! falling back through Backoff on any failure, until shutdown. Backoff
//! sleeps happen in 1-second shutdown-checked increments so `close()` never
//! waits for a full backoff window.

use crate::agent::AgentShared;
use crate::config::ConnectionSettings;
use crate::engine::Command;
use crate::error::AgentResult;
use crate::protocol::{exchange, header, routing};
use crate::transport::{BrokerSession, BrokerTransport, ReplyTo};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Reconnect backoff: starts at 1 s, doubles per failed connect attempt
/// while below the cap, resets on success.
#[derive(Debug, Clone)]
pub struct Backoff {
    delay: u64,
}

impl Backoff {
    /// Initial and post-success delay, seconds.
    pub const MIN_SECS: u64 = 1;
    /// Delay cap, seconds.
    pub const MAX_SECS: u64 = 128;

    /// A fresh backoff at the minimum delay.
    #[must_use]
    pub fn new() -> Self {
        Self {
            delay: Self::MIN_SECS,
        }
    }

    /// Records a failed connect attempt; returns the sleep to take.
    /// The doubling happens before the cap test, so the observed sequence
    /// is 2, 4, 8, …, 64, 128, 128, ….
    pub fn on_failure(&mut self) -> u64 {
        if self.delay < Self::MAX_SECS {
            self.delay *= 2;
        }
        self.delay
    }

    /// Resets after a successful connection.
    pub fn on_success(&mut self) {
        self.delay = Self::MIN_SECS;
    }

    /// The current delay in seconds.
    #[must_use]
    pub fn delay(&self) -> u64 {
        self.delay
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

/// The connection supervisor task.
pub(crate) async fn run(
    shared: Arc<AgentShared>,
    transport: Arc<dyn BrokerTransport>,
    settings: ConnectionSettings,
    mut outbound: mpsc::UnboundedReceiver<Command>,
    mut shutdown: watch::Receiver<bool>,
) {
    let queue_name = format!("qmfagent-{}", Uuid::new_v4());
    let mut backoff = Backoff::new();

    loop {
        if *shutdown.borrow() {
            return;
        }

        match establish(&shared, transport.as_ref(), &settings, &queue_name).await {
            Ok(session) => {
                info!("connection established with broker");
                backoff.on_success();
                shared.connected.store(true, Ordering::SeqCst);
                for command in shared.engine.lock().start_protocol() {
                    shared.send(command);
                }

                pump(&shared, session.as_ref(), &queue_name, &mut outbound, &mut shutdown).await;

                shared.connected.store(false, Ordering::SeqCst);
                // Queued commands belong to the dead session.
                while outbound.try_recv().is_ok() {}
                drop(session);
                if *shutdown.borrow() {
                    return;
                }
                warn!("connection to the broker has been lost");
            }
            Err(e) => {
                debug!("connection failed: {}", e);
                backoff.on_failure();
            }
        }

        let mut slept = 0u64;
        while slept < backoff.delay() {
            if *shutdown.borrow() {
                return;
            }
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(1)) => slept += 1,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    }
}

/// Opens a session and wires up the agent queue and its bindings.
async fn establish(
    shared: &AgentShared,
    transport: &dyn BrokerTransport,
    settings: &ConnectionSettings,
    queue_name: &str,
) -> AgentResult<Box<dyn BrokerSession>> {
    debug!("attempting to connect to the broker...");
    let session = transport.connect(settings, queue_name).await?;
    session.declare_queue(queue_name, true, true).await?;
    session
        .bind(exchange::DIRECT, queue_name, queue_name)
        .await?;
    let name_address = shared.engine.lock().name_address().to_string();
    session
        .bind(exchange::QMF_DIRECT, queue_name, &name_address)
        .await?;
    session
        .bind(exchange::QMF_TOPIC, queue_name, routing::CONSOLE_WILDCARD)
        .await?;
    Ok(session)
}

/// Runs the subscription pump until the session fails, the subscription
/// ends, or shutdown is requested.
async fn pump(
    shared: &AgentShared,
    session: &dyn BrokerSession,
    queue_name: &str,
    outbound: &mut mpsc::UnboundedReceiver<Command>,
    shutdown: &mut watch::Receiver<bool>,
) {
    let name_address = shared.engine.lock().name_address().to_string();
    loop {
        tokio::select! {
            inbound = session.next_message() => {
                match inbound {
                    Ok(Some(message)) => shared.dispatch_message(&message),
                    Ok(None) => {
                        debug!("subscription closed by the broker");
                        return;
                    }
                    Err(e) => {
                        warn!("subscription pump failed: {}", e);
                        return;
                    }
                }
            }
            command = outbound.recv() => {
                let Some(command) = command else { return };
                match command {
                    Command::Publish { exchange, routing_key, mut message } => {
                        message.reply_to =
                            Some(ReplyTo::new(exchange::DIRECT, queue_name));
                        message
                            .headers
                            .entry(header::AGENT.to_string())
                            .or_insert_with(|| json!(name_address));
                        if let Err(e) = session.transfer(&exchange, &routing_key, message).await {
                            // Bounce the connection.
                            error!("message transfer failed: {}", e);
                            return;
                        }
                    }
                    Command::Bind { exchange, binding_key } => {
                        if let Err(e) = session.bind(&exchange, queue_name, &binding_key).await {
                            warn!("bank binding failed: {}", e);
                            return;
                        }
                    }
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return;
                }
            }
        }
    }
}
