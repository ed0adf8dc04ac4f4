//! The host-facing management agent.
//!
//! [`ManagementAgent`] owns the protocol engine (behind the agent lock),
//! the pending-object set (behind the add lock), the outbound command
//! channel, and the two long-lived tasks: the connection supervisor and the
//! periodic publisher.

use crate::config::AgentConfig;
use crate::connection;
use crate::engine::{AgentEngine, Command, PostAction, QueuedMethod};
use crate::publisher;
use crate::registry::PendingSet;
use crate::schema::SchemaWriter;
use crate::signal::{Notifiable, NotifyTarget, SignalMode};
use crate::store::BankStore;
use crate::transport::{BrokerTransport, WireMessage};
use parking_lot::Mutex;
use qmf_types::{
    status, ClassKind, ManagedEvent, ManagedObject, ObjectId, SchemaHash, Severity,
};
use serde_json::{json, Map, Value};
use std::os::fd::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, trace};

/// State shared between the host API and the worker tasks.
pub(crate) struct AgentShared {
    /// The agent lock and everything behind it.
    pub engine: Mutex<AgentEngine>,
    /// The add lock: pending objects and the id counter.
    pub pending: Arc<Mutex<PendingSet>>,
    /// Whether the broker link is operational.
    pub connected: Arc<AtomicBool>,
    /// Outbound path into the connection task.
    pub outbound: mpsc::UnboundedSender<Command>,
}

impl AgentShared {
    /// Enqueues a command for the connection task; dropped while offline.
    pub fn send(&self, command: Command) {
        if !self.connected.load(Ordering::SeqCst) {
            trace!("dropping outbound message while disconnected");
            return;
        }
        let _ = self.outbound.send(command);
    }

    /// Subscription callback: classify, handle, then perform any follow-up
    /// outside the agent lock.
    pub fn dispatch_message(&self, message: &WireMessage) {
        let dispatch = self.engine.lock().handle_message(message);
        for command in dispatch.commands {
            self.send(command);
        }
        match dispatch.action {
            Some(PostAction::Invoke(item)) => self.invoke_method_request(item),
            Some(PostAction::Notify(target)) => {
                // The engine set the in-callback guard before handing the
                // target out; fire with the lock released, then clear it.
                target.notify();
                self.engine.lock().set_in_callback(false);
            }
            None => {}
        }
    }

    /// Decodes, validates and executes one method request, then sends the
    /// response. Runs without the agent lock so host method bodies may call
    /// back into the agent.
    pub fn invoke_method_request(&self, item: QueuedMethod) {
        let mut failed_values = Map::new();
        let mut out_args: Option<Map<String, Value>> = None;

        let in_map: Map<String, Value> = match serde_json::from_slice::<Value>(&item.body) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };

        let fail = |values: &mut Map<String, Value>, code: u32, text: String| {
            values.insert("_status_code".to_string(), json!(code));
            values.insert("_status_text".to_string(), json!(text));
        };

        match (in_map.get("_object_id"), in_map.get("_method_name")) {
            (Some(Value::Object(oid_map)), Some(name_value)) => {
                let parsed = ObjectId::from_map(oid_map)
                    .map_err(|e| e.to_string())
                    .and_then(|object_id| {
                        name_value
                            .as_str()
                            .map(|name| (object_id, name.to_string()))
                            .ok_or_else(|| "_method_name is not a string".to_string())
                    });
                match parsed {
                    Err(text) => fail(&mut failed_values, status::EXCEPTION, text),
                    Ok((object_id, method_name)) => {
                        let in_args = in_map
                            .get("_arguments")
                            .and_then(Value::as_object)
                            .cloned()
                            .unwrap_or_default();
                        // Unknown or deleted objects skip the invocation
                        // path outright.
                        match self.engine.lock().resolve_object(&object_id) {
                            None => fail(
                                &mut failed_values,
                                status::UNKNOWN_OBJECT,
                                status::text(status::UNKNOWN_OBJECT).to_string(),
                            ),
                            Some(object) => {
                                let result = object.do_method(&method_name, &in_args);
                                if result.status == status::OK {
                                    let mut args = result.out_args;
                                    args.remove("_status_code");
                                    args.remove("_status_text");
                                    out_args = Some(args);
                                } else {
                                    fail(&mut failed_values, result.status, result.text);
                                }
                            }
                        }
                    }
                }
            }
            _ => fail(
                &mut failed_values,
                status::PARAMETER_INVALID,
                status::text(status::PARAMETER_INVALID).to_string(),
            ),
        }

        let failed = out_args.is_none();
        let mut body = Map::new();
        if let Some(args) = out_args {
            body.insert("_values".to_string(), Value::Object(Map::new()));
            body.insert("_arguments".to_string(), Value::Object(args));
        } else {
            body.insert("_values".to_string(), Value::Object(failed_values));
        }

        let command =
            self.engine
                .lock()
                .method_reply(&item.correlation_id, &item.reply_to, failed, body);
        self.send(command);
    }
}

/// Embeddable QMF management agent.
///
/// Created with [`ManagementAgent::init`], which loads the bank store,
/// advances the boot sequence, and starts the connection and publish tasks
/// on the current tokio runtime.
pub struct ManagementAgent {
    shared: Arc<AgentShared>,
    external_thread: bool,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ManagementAgent {
    /// Initializes the agent and starts its worker tasks.
    pub fn init(config: AgentConfig, transport: Arc<dyn BrokerTransport>) -> Self {
        let store = BankStore::open(config.store_file.clone());
        info!(
            "management agent initialized: broker={}:{} interval={}s epoch={}",
            config.connection.host,
            config.connection.port,
            config.interval_secs,
            store.boot_sequence()
        );

        let connected = Arc::new(AtomicBool::new(false));
        let pending = Arc::new(Mutex::new(PendingSet::new(u64::from(store.boot_sequence()))));
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let engine = AgentEngine::new(&config, store, pending.clone(), connected.clone());
        let shared = Arc::new(AgentShared {
            engine: Mutex::new(engine),
            pending,
            connected,
            outbound: outbound_tx,
        });

        let connection_task = tokio::spawn(connection::run(
            shared.clone(),
            transport,
            config.connection.clone(),
            outbound_rx,
            shutdown_rx.clone(),
        ));
        let publish_task = tokio::spawn(publisher::run(
            shared.clone(),
            config.interval_secs,
            shutdown_rx,
        ));

        Self {
            shared,
            external_thread: config.external_thread,
            shutdown: shutdown_tx,
            tasks: Mutex::new(vec![connection_task, publish_task]),
        }
    }

    /// Rebrands the agent's name-address. An empty instance gets a
    /// synthesized UUID.
    pub fn set_name(&self, vendor: &str, product: &str, instance: Option<&str>) {
        self.shared.engine.lock().set_name(vendor, product, instance);
    }

    /// The agent's name-address `<vendor>:<product>:<instance>`.
    #[must_use]
    pub fn name_address(&self) -> String {
        self.shared.engine.lock().name_address().to_string()
    }

    /// The boot-sequence epoch for this process lifetime.
    #[must_use]
    pub fn epoch(&self) -> u32 {
        self.shared.engine.lock().epoch()
    }

    /// Whether the broker link is operational.
    #[must_use]
    pub fn connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Registers an object schema class.
    pub fn register_class(
        &self,
        package: &str,
        name: &str,
        hash: SchemaHash,
        writer: SchemaWriter,
    ) {
        let command =
            self.shared
                .engine
                .lock()
                .register_schema(package, name, hash, ClassKind::Table, writer);
        if let Some(command) = command {
            self.shared.send(command);
        }
    }

    /// Registers an event schema.
    pub fn register_event(
        &self,
        package: &str,
        name: &str,
        hash: SchemaHash,
        writer: SchemaWriter,
    ) {
        let command =
            self.shared
                .engine
                .lock()
                .register_schema(package, name, hash, ClassKind::Event, writer);
        if let Some(command) = command {
            self.shared.send(command);
        }
    }

    /// Adds a managed object. It becomes visible to queries and the
    /// publisher at the next promotion. The registry owns the object from
    /// here on; the returned identifier addresses it.
    pub fn add_object(
        &self,
        object: Arc<dyn ManagedObject>,
        key: &str,
        persistent: bool,
    ) -> ObjectId {
        self.shared.pending.lock().add(object, key, persistent)
    }

    /// Raises an event toward subscribed consoles.
    pub fn raise_event(&self, event: &dyn ManagedEvent, severity: Severity) {
        let command = self.shared.engine.lock().raise_event(event, severity);
        self.shared.send(command);
    }

    /// Drains up to `limit` queued method invocations (0 = all), then
    /// consumes pending signal bytes. Returns the number still queued.
    pub fn poll_callbacks(&self, limit: u32) -> u32 {
        if self.shared.engine.lock().in_callback() {
            error!("poll_callbacks invoked from the agent's callback thread");
            return 0;
        }

        let mut handled = 0u32;
        while limit == 0 || handled < limit {
            let item = self.shared.engine.lock().pop_queued_method();
            let Some(item) = item else { break };
            self.shared.invoke_method_request(item);
            handled += 1;
        }

        let engine = self.shared.engine.lock();
        engine.drain_signal_pipe();
        engine.queued_methods() as u32
    }

    /// The self-pipe descriptor the host polls for queued invocations.
    /// `None` unless the agent was initialized for an external thread.
    pub fn signal_fd(&self) -> Option<RawFd> {
        if !self.external_thread {
            return None;
        }
        self.shared.engine.lock().signal_fd()
    }

    /// Installs a callback fired when a method request is queued.
    pub fn set_signal_callback(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.shared
            .engine
            .lock()
            .set_signal(SignalMode::Callback(NotifyTarget::Callback(Arc::new(
                callback,
            ))));
    }

    /// Installs a notifiable object fired when a method request is queued.
    pub fn set_signal_notifiable(&self, notifiable: Arc<dyn Notifiable>) {
        self.shared
            .engine
            .lock()
            .set_signal(SignalMode::Callback(NotifyTarget::Notifiable(notifiable)));
    }

    /// The subscription callback: handles one inbound broker message.
    /// Exposed so transports (and tests) can feed messages directly.
    pub fn handle_message(&self, message: &WireMessage) {
        self.shared.dispatch_message(message);
    }

    /// Stops both tasks and releases every managed object.
    pub async fn close(&self) {
        let _ = self.shutdown.send(true);
        let handles: Vec<_> = self.tasks.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
        let mut engine = self.shared.engine.lock();
        engine.promote_pending();
        engine.clear_objects();
    }
}

impl Drop for ManagementAgent {
    fn drop(&mut self) {
        // Best effort: tasks observe the flag within a second of sleep.
        let _ = self.shutdown.send(true);
    }
}
