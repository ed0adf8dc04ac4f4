//! Agent protocol engine — QMF state and handlers without I/O.
//!
//! The engine is a pure state machine. It consumes decoded wire messages
//! and produces [`Command`]s; the connection and publish tasks perform the
//! actual broker I/O. All engine state lives behind the agent lock; the
//! pending set has its own lock so object registration never blocks on a
//! publish cycle.

use crate::config::AgentConfig;
use crate::protocol::{self, exchange, header, opcode, routing, v1};
use crate::registry::PendingSet;
use crate::schema::{SchemaRegistry, SchemaWriter};
use crate::signal::{NotifyTarget, SignalMode, SignalPipe};
use crate::store::BankStore;
use crate::transport::WireMessage;
use parking_lot::Mutex;
use qmf_types::timestamp::now_ns;
use qmf_types::{
    ClassKind, ManagedEvent, ManagedObject, ObjectId, SchemaClassKey, SchemaHash, Severity,
};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, VecDeque};
use std::os::fd::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{trace, warn};
use uuid::Uuid;

/// An I/O action produced by the engine for the connection task.
#[derive(Debug, Clone)]
pub enum Command {
    /// Publish a message to an exchange.
    Publish {
        exchange: String,
        routing_key: String,
        message: WireMessage,
    },
    /// Bind the agent queue to an exchange.
    Bind {
        exchange: String,
        binding_key: String,
    },
}

/// A method invocation parked for the host's thread.
#[derive(Debug, Clone)]
pub struct QueuedMethod {
    /// Correlation id to echo on the response.
    pub correlation_id: String,
    /// Routing key of the caller's reply queue.
    pub reply_to: String,
    /// Encoded request body.
    pub body: Vec<u8>,
}

/// Follow-up work the orchestrator performs after a dispatch, outside the
/// agent lock.
#[derive(Debug)]
pub enum PostAction {
    /// Invoke the method inline (internal-thread mode).
    Invoke(QueuedMethod),
    /// Fire the host's notification callback. The engine has already set
    /// the in-callback guard; the caller clears it after the notify.
    Notify(NotifyTarget),
}

/// Result of dispatching one inbound message.
#[derive(Debug, Default)]
pub struct Dispatch {
    /// I/O to perform.
    pub commands: Vec<Command>,
    /// Work to perform outside the agent lock.
    pub action: Option<PostAction>,
}

impl Dispatch {
    fn commands(commands: Vec<Command>) -> Self {
        Self {
            commands,
            action: None,
        }
    }

    fn one(command: Command) -> Self {
        Self::commands(vec![command])
    }
}

/// The QMF protocol state machine.
pub struct AgentEngine {
    interval: u16,
    external_thread: bool,
    name_address: String,
    attributes: Map<String, Value>,
    store: BankStore,
    schemata: SchemaRegistry,
    objects: HashMap<ObjectId, Arc<dyn ManagedObject>>,
    pending: Arc<Mutex<PendingSet>>,
    method_queue: VecDeque<QueuedMethod>,
    signal: SignalMode,
    in_callback: bool,
    client_was_added: bool,
    connected: Arc<AtomicBool>,
}

impl AgentEngine {
    /// Creates the engine. `connected` is shared with the connection task;
    /// `pending` with the host-facing registration path.
    pub fn new(
        config: &AgentConfig,
        store: BankStore,
        pending: Arc<Mutex<PendingSet>>,
        connected: Arc<AtomicBool>,
    ) -> Self {
        let mut engine = Self {
            interval: config.interval_secs,
            external_thread: config.external_thread,
            name_address: String::new(),
            attributes: Map::new(),
            store,
            schemata: SchemaRegistry::new(),
            objects: HashMap::new(),
            pending,
            method_queue: VecDeque::new(),
            signal: SignalMode::None,
            in_callback: false,
            // Force-publish everything on the first cycle.
            client_was_added: true,
            connected,
        };
        engine.set_name(&config.vendor, &config.product, config.instance.as_deref());
        engine
    }

    /// The agent's name-address `<vendor>:<product>:<instance>`.
    #[must_use]
    pub fn name_address(&self) -> &str {
        &self.name_address
    }

    /// The boot-sequence epoch.
    #[must_use]
    pub fn epoch(&self) -> u32 {
        self.store.boot_sequence()
    }

    /// Number of published objects.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Sets the agent's identity. An empty or absent instance gets a
    /// synthesized UUID.
    pub fn set_name(&mut self, vendor: &str, product: &str, instance: Option<&str>) {
        let instance = match instance {
            Some(i) if !i.is_empty() => i.to_string(),
            _ => Uuid::new_v4().to_string(),
        };
        self.name_address = format!("{vendor}:{product}:{instance}");
        self.attributes
            .insert("_vendor".to_string(), json!(vendor));
        self.attributes
            .insert("_product".to_string(), json!(product));
        self.attributes
            .insert("_instance".to_string(), json!(instance));
        self.attributes
            .insert("_name".to_string(), json!(self.name_address));
    }

    // ── Schema registration ──────────────────────────────────────

    /// Registers a class or event schema. A new package yields a V1
    /// package-indication when connected; classes themselves are announced
    /// only on schema-request.
    pub fn register_schema(
        &mut self,
        package: &str,
        name: &str,
        hash: SchemaHash,
        kind: ClassKind,
        writer: SchemaWriter,
    ) -> Option<Command> {
        let key = SchemaClassKey {
            name: name.to_string(),
            hash,
        };
        let new_package = self.schemata.register(package, key, kind, writer);
        if new_package && self.connected.load(Ordering::SeqCst) {
            let mut body = protocol::encode_header(v1::PACKAGE_INDICATION, 0);
            protocol::put_short_string(&mut body, package);
            trace!("sent package indication: package={}", package);
            Some(Command::Publish {
                exchange: exchange::MANAGEMENT.to_string(),
                routing_key: routing::SCHEMA_PACKAGE.to_string(),
                message: WireMessage {
                    body,
                    ..WireMessage::default()
                },
            })
        } else {
            None
        }
    }

    // ── Message producers ────────────────────────────────────────

    /// The opening protocol exchange after a connection: one heartbeat.
    pub fn start_protocol(&self) -> Vec<Command> {
        vec![self.heartbeat()]
    }

    /// Builds the periodic heartbeat indication.
    #[must_use]
    pub fn heartbeat(&self) -> Command {
        let mut body = Map::new();
        body.insert("_values".to_string(), Value::Object(self.identity_values()));
        trace!("sent agent heartbeat: name={}", self.name_address);
        Command::Publish {
            exchange: exchange::QMF_TOPIC.to_string(),
            routing_key: routing::HEARTBEAT.to_string(),
            message: self.v2_message(
                "indication",
                opcode::AGENT_HEARTBEAT_INDICATION,
                None,
                None,
                None,
                &Value::Object(body),
            ),
        }
    }

    /// Builds a generic exception indication.
    #[must_use]
    pub fn exception(&self, reply_to: &str, cid: &str, text: &str, code: u32) -> Command {
        let mut values = Map::new();
        values.insert("error_code".to_string(), json!(code));
        values.insert("error_text".to_string(), json!(text));
        let mut body = Map::new();
        body.insert("_values".to_string(), Value::Object(values));
        trace!("sent exception: code={} text={}", code, text);
        Command::Publish {
            exchange: exchange::QMF_DIRECT.to_string(),
            routing_key: reply_to.to_string(),
            message: self.v2_message(
                "indication",
                opcode::EXCEPTION,
                Some(cid),
                None,
                None,
                &Value::Object(body),
            ),
        }
    }

    /// Builds an event data indication routed to
    /// `console.event.<brokerBank>.<agentBank>.<pkg>.<evt>`.
    pub fn raise_event(&self, event: &dyn ManagedEvent, severity: Severity) -> Command {
        let schema_id = event.schema_id();
        let level = severity.level().unwrap_or_else(|| event.severity());
        let routing_key = format!(
            "console.event.{}.{}.{}.{}",
            self.store.assigned_broker_bank(),
            self.store.assigned_agent_bank(),
            schema_id.package_name(),
            schema_id.class_name()
        );

        let mut body = Map::new();
        body.insert(
            "_schema_id".to_string(),
            Value::Object(schema_id.to_map()),
        );
        body.insert("_values".to_string(), Value::Object(event.encode()));
        body.insert("_timestamp".to_string(), json!(now_ns()));
        body.insert("_severity".to_string(), json!(level));

        trace!(
            "sent event indication: key={} severity={}",
            routing_key,
            level
        );
        Command::Publish {
            exchange: exchange::QMF_TOPIC.to_string(),
            routing_key,
            message: self.v2_message(
                "indication",
                opcode::DATA_INDICATION,
                None,
                Some("_event"),
                None,
                &Value::Object(body),
            ),
        }
    }

    /// Builds a method response or exception reply.
    #[must_use]
    pub fn method_reply(
        &self,
        cid: &str,
        reply_to: &str,
        failed: bool,
        body: Map<String, Value>,
    ) -> Command {
        let op = if failed {
            opcode::EXCEPTION
        } else {
            opcode::METHOD_RESPONSE
        };
        trace!("sent method reply: opcode={} reply_to={}", op, reply_to);
        Command::Publish {
            exchange: exchange::QMF_DIRECT.to_string(),
            routing_key: reply_to.to_string(),
            message: self.v2_message("response", op, Some(cid), None, None, &Value::Object(body)),
        }
    }

    // ── Inbound dispatch ─────────────────────────────────────────

    /// Classifies and handles one inbound message (the subscription
    /// callback path).
    pub fn handle_message(&mut self, message: &WireMessage) -> Dispatch {
        let reply_to = message
            .reply_to
            .as_ref()
            .map(|r| r.routing_key.clone())
            .unwrap_or_default();

        if message.app_id.as_deref() == Some(protocol::APP_ID) {
            let op = message
                .header_str(header::OPCODE)
                .unwrap_or_default()
                .to_string();
            let cid = message.correlation_id.clone().unwrap_or_default();
            return match op.as_str() {
                opcode::AGENT_LOCATE_REQUEST => self.handle_locate_request(&cid, &reply_to),
                opcode::METHOD_REQUEST => {
                    self.handle_method_request(&message.body, &cid, &reply_to)
                }
                opcode::QUERY_REQUEST => self.handle_get_query(&message.body, &cid, &reply_to),
                other => {
                    warn!("unsupported qmf v2 opcode: {}", other);
                    Dispatch::default()
                }
            };
        }

        match protocol::check_header(&message.body) {
            Some((v1::SCHEMA_REQUEST, sequence, body)) => {
                self.handle_schema_request(body, sequence, &reply_to)
            }
            Some((v1::CONSOLE_ADDED, _, _)) => {
                trace!("received console-added indication");
                self.client_was_added = true;
                Dispatch::default()
            }
            Some((v1::BANK_ASSIGNMENT, _, body)) => self.handle_bank_assignment(body),
            Some((op, _, _)) => {
                warn!("ignoring v1 request: opcode={}", op as char);
                Dispatch::default()
            }
            None => {
                warn!("dropping malformed frame ({} bytes)", message.body.len());
                Dispatch::default()
            }
        }
    }

    fn handle_locate_request(&mut self, cid: &str, reply_to: &str) -> Dispatch {
        trace!("received agent locate request");
        let mut body = Map::new();
        body.insert("_values".to_string(), Value::Object(self.identity_values()));
        let command = Command::Publish {
            exchange: exchange::QMF_DIRECT.to_string(),
            routing_key: reply_to.to_string(),
            message: self.v2_message(
                "indication",
                opcode::AGENT_LOCATE_RESPONSE,
                Some(cid),
                None,
                None,
                &Value::Object(body),
            ),
        };
        trace!("sent agent locate response: reply_to={}", reply_to);
        self.client_was_added = true;
        Dispatch::one(command)
    }

    fn handle_method_request(&mut self, body: &[u8], cid: &str, reply_to: &str) -> Dispatch {
        trace!("received method request");
        let item = QueuedMethod {
            correlation_id: cid.to_string(),
            reply_to: reply_to.to_string(),
            body: body.to_vec(),
        };
        if !self.external_thread {
            return Dispatch {
                commands: Vec::new(),
                action: Some(PostAction::Invoke(item)),
            };
        }

        self.method_queue.push_back(item);
        match &self.signal {
            SignalMode::Pipe(pipe) => {
                pipe.signal();
                Dispatch::default()
            }
            SignalMode::Callback(target) => {
                self.in_callback = true;
                Dispatch {
                    commands: Vec::new(),
                    action: Some(PostAction::Notify(target.clone())),
                }
            }
            SignalMode::None => Dispatch::default(),
        }
    }

    fn handle_schema_request(&mut self, body: &[u8], sequence: u32, reply_to: &str) -> Dispatch {
        let mut reader = protocol::V1Reader::new(body);
        let (Some(package), Some(class), Some(hash)) = (
            reader.short_string(),
            reader.short_string(),
            reader.bin128(),
        ) else {
            warn!("dropping malformed schema request");
            return Dispatch::default();
        };
        trace!(
            "received schema request: package={} class={}",
            package,
            class
        );

        let key = SchemaClassKey {
            name: class.clone(),
            hash: SchemaHash::from_bytes(hash),
        };
        // Unknown classes are a tolerated protocol race: no reply.
        let Some(writer) = self.schemata.writer(&package, &key) else {
            return Dispatch::default();
        };

        let mut out = protocol::encode_header(v1::SCHEMA_INDICATION, sequence);
        out.extend_from_slice(&writer());
        trace!("sent schema indication: package={} class={}", package, class);
        Dispatch::one(Command::Publish {
            exchange: exchange::DIRECT.to_string(),
            routing_key: reply_to.to_string(),
            message: WireMessage {
                body: out,
                ..WireMessage::default()
            },
        })
    }

    fn handle_bank_assignment(&mut self, body: &[u8]) -> Dispatch {
        let mut reader = protocol::V1Reader::new(body);
        let (Some(broker_bank), Some(agent_bank)) = (reader.u32(), reader.u32()) else {
            warn!("dropping malformed bank assignment");
            return Dispatch::default();
        };
        trace!(
            "received bank assignment: broker={} agent={}",
            broker_bank,
            agent_bank
        );
        self.store.set_assigned_banks(broker_bank, agent_bank);
        Dispatch::one(Command::Bind {
            exchange: exchange::MANAGEMENT.to_string(),
            binding_key: format!("agent.{broker_bank}.{agent_bank}"),
        })
    }

    fn handle_get_query(&mut self, body: &[u8], cid: &str, reply_to: &str) -> Dispatch {
        self.promote_pending();

        let in_map: Map<String, Value> = match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(map)) => map,
            _ => {
                return Dispatch::one(self.exception(reply_to, cid, "failed to parse query", 1));
            }
        };
        trace!("received get query: cid={}", cid);

        // Only OBJECT queries are supported.
        match in_map.get("_what") {
            None => {
                return Dispatch::one(self.exception(
                    reply_to,
                    cid,
                    "_what element missing in Query",
                    1,
                ));
            }
            Some(Value::String(what)) if what == "OBJECT" => {}
            Some(Value::String(what)) => {
                return Dispatch::one(self.exception(
                    reply_to,
                    cid,
                    &format!("Query for _what => '{what}' not supported"),
                    1,
                ));
            }
            Some(_) => {
                return Dispatch::one(self.exception(
                    reply_to,
                    cid,
                    "_what element is not a string",
                    1,
                ));
            }
        }

        let mut class_name = String::new();
        let mut package_name = String::new();
        if let Some(Value::Object(schema_id)) = in_map.get("_schema_id") {
            if let Some(Value::String(name)) = schema_id.get("_class_name") {
                class_name = name.clone();
            }
            if let Some(Value::String(name)) = schema_id.get("_package_name") {
                package_name = name.clone();
            }
        }

        let mut commands = Vec::new();
        match in_map.get("_object_id") {
            Some(Value::Object(oid_map)) => {
                // Single-object query: on a hit, one non-partial response
                // and no terminal message.
                if let Ok(object_id) = ObjectId::from_map(oid_map) {
                    if let Some(object) = self.objects.get(&object_id) {
                        let entry = Self::encode_object_entry(object.as_ref(), &object_id);
                        commands.push(self.query_response(
                            cid,
                            reply_to,
                            Value::Array(vec![entry]),
                            false,
                        ));
                        trace!("sent query response (by object id): reply_to={}", reply_to);
                        return Dispatch::commands(commands);
                    }
                }
                // Miss: fall through to the bare terminal.
            }
            Some(_) => {
                // Present but not a map: neither lookup path runs.
            }
            None => {
                for (object_id, object) in &self.objects {
                    let schema_id = object.schema_id();
                    if schema_id.class_name() == class_name
                        && (package_name.is_empty() || schema_id.package_name() == package_name)
                    {
                        let entry = Self::encode_object_entry(object.as_ref(), object_id);
                        commands.push(self.query_response(
                            cid,
                            reply_to,
                            Value::Array(vec![entry]),
                            true,
                        ));
                    }
                }
                trace!(
                    "sent {} query responses (by schema id): reply_to={}",
                    commands.len(),
                    reply_to
                );
            }
        }

        // Empty non-partial response signals command-complete.
        commands.push(self.query_response(cid, reply_to, Value::Array(Vec::new()), false));
        Dispatch::commands(commands)
    }

    // ── Periodic publication ─────────────────────────────────────

    /// One publish cycle: promotion, force-publish handling, same-class
    /// batching, deletion reaping, heartbeat. Returns nothing when the
    /// agent is disconnected.
    pub fn periodic_processing(&mut self) -> Vec<Command> {
        if !self.connected.load(Ordering::SeqCst) {
            return Vec::new();
        }

        self.promote_pending();

        for object in self.objects.values() {
            let state = object.state();
            state.set_publish_flag(0);
            if self.client_was_added {
                state.set_force_publish(true);
            }
        }
        self.client_was_added = false;

        let ids: Vec<ObjectId> = self.objects.keys().cloned().collect();
        let mut commands = Vec::new();
        let mut reap: Vec<ObjectId> = Vec::new();

        for (index, base_id) in ids.iter().enumerate() {
            let Some(base) = self.objects.get(base_id) else {
                continue;
            };
            let base_state = base.state();
            if base_state.publish_flag() == 1
                || (!base_state.config_changed()
                    && !base_state.inst_changed()
                    && !base_state.force_publish()
                    && !base_state.is_deleted())
            {
                continue;
            }

            // Batch every not-yet-visited object of the same class.
            let base = base.clone();
            let mut batch = Vec::new();
            for object_id in &ids[index..] {
                let Some(object) = self.objects.get(object_id) else {
                    continue;
                };
                let state = object.state();
                if !base.is_same_class(object.as_ref()) || state.publish_flag() != 0 {
                    continue;
                }
                state.set_publish_flag(1);
                if state.config_changed() || state.inst_changed() {
                    state.touch_update_time();
                }

                let send_props =
                    state.config_changed() || state.force_publish() || state.is_deleted();
                let send_stats =
                    object.has_statistics() && (state.inst_changed() || state.force_publish());

                if send_props || send_stats {
                    batch.push(Self::encode_batch_entry(
                        object.as_ref(),
                        object_id,
                        send_props,
                        send_stats,
                    ));
                }
                if state.is_deleted() {
                    reap.push(object_id.clone());
                }
                state.set_force_publish(false);
            }

            if !batch.is_empty() {
                trace!("sent data indication: {} objects", batch.len());
                commands.push(Command::Publish {
                    exchange: exchange::QMF_TOPIC.to_string(),
                    routing_key: routing::DATA.to_string(),
                    message: self.v2_message(
                        "indication",
                        opcode::DATA_INDICATION,
                        None,
                        Some("_data"),
                        Some(protocol::CONTENT_TYPE_LIST),
                        &Value::Array(batch),
                    ),
                });
            }
        }

        // A deleted object gets its final indication above, then goes away.
        for object_id in reap.iter().rev() {
            self.objects.remove(object_id);
        }

        commands.push(self.heartbeat());
        commands
    }

    // ── Object registry bridge ───────────────────────────────────

    /// Moves pending objects into the published map (last writer wins on
    /// identifier collision). Called at query start, publish-cycle start
    /// and shutdown, always under the agent lock.
    pub fn promote_pending(&mut self) {
        let drained = self.pending.lock().drain();
        for (object_id, object) in drained {
            self.objects.insert(object_id, object);
        }
    }

    /// Drops every published object (shutdown cleanup).
    pub fn clear_objects(&mut self) {
        self.objects.clear();
    }

    /// Resolves a live (not deleted) published object for invocation.
    #[must_use]
    pub fn resolve_object(&self, object_id: &ObjectId) -> Option<Arc<dyn ManagedObject>> {
        self.objects
            .get(object_id)
            .filter(|object| !object.state().is_deleted())
            .cloned()
    }

    // ── Method queue & notification ──────────────────────────────

    /// Whether a notification callback is currently running.
    #[must_use]
    pub fn in_callback(&self) -> bool {
        self.in_callback
    }

    /// Sets or clears the in-callback guard.
    pub fn set_in_callback(&mut self, value: bool) {
        self.in_callback = value;
    }

    /// Pops the next queued method invocation.
    pub fn pop_queued_method(&mut self) -> Option<QueuedMethod> {
        self.method_queue.pop_front()
    }

    /// Number of queued method invocations.
    #[must_use]
    pub fn queued_methods(&self) -> usize {
        self.method_queue.len()
    }

    /// Installs a notification strategy.
    pub fn set_signal(&mut self, mode: SignalMode) {
        self.signal = mode;
    }

    /// The self-pipe read descriptor, creating the pipe on first use.
    pub fn signal_fd(&mut self) -> Option<RawFd> {
        if let SignalMode::Pipe(pipe) = &self.signal {
            return Some(pipe.read_fd());
        }
        match SignalPipe::new() {
            Ok(pipe) => {
                let fd = pipe.read_fd();
                self.signal = SignalMode::Pipe(pipe);
                Some(fd)
            }
            Err(e) => {
                warn!("failed to create signal pipe: {}", e);
                None
            }
        }
    }

    /// Consumes pending self-pipe bytes after a poll pass.
    pub fn drain_signal_pipe(&self) {
        if let SignalMode::Pipe(pipe) = &self.signal {
            pipe.drain();
        }
    }

    // ── Encoding helpers ─────────────────────────────────────────

    fn identity_values(&self) -> Map<String, Value> {
        let mut values = self.attributes.clone();
        values.insert("timestamp".to_string(), json!(now_ns()));
        values.insert("heartbeat_interval".to_string(), json!(self.interval));
        values.insert("epoch".to_string(), json!(self.store.boot_sequence()));
        values
    }

    fn v2_message(
        &self,
        method: &str,
        op: &str,
        cid: Option<&str>,
        content: Option<&str>,
        content_type: Option<&str>,
        body: &Value,
    ) -> WireMessage {
        let mut headers = Map::new();
        headers.insert(header::METHOD.to_string(), json!(method));
        headers.insert(header::OPCODE.to_string(), json!(op));
        if let Some(content) = content {
            headers.insert(header::CONTENT.to_string(), json!(content));
        }
        headers.insert(header::AGENT.to_string(), json!(self.name_address));
        WireMessage {
            correlation_id: cid.filter(|c| !c.is_empty()).map(str::to_string),
            app_id: Some(protocol::APP_ID.to_string()),
            content_type: content_type.map(str::to_string),
            reply_to: None,
            headers,
            body: body.to_string().into_bytes(),
        }
    }

    fn query_response(&self, cid: &str, reply_to: &str, list: Value, partial: bool) -> Command {
        let mut message = self.v2_message(
            "response",
            opcode::QUERY_RESPONSE,
            Some(cid),
            Some("_data"),
            Some(protocol::CONTENT_TYPE_LIST),
            &list,
        );
        if partial {
            message
                .headers
                .insert(header::PARTIAL.to_string(), Value::Null);
        }
        Command::Publish {
            exchange: exchange::QMF_DIRECT.to_string(),
            routing_key: reply_to.to_string(),
            message,
        }
    }

    /// Serializes object values, clearing the change flags the write
    /// covers.
    fn encode_values(
        object: &dyn ManagedObject,
        send_props: bool,
        send_stats: bool,
    ) -> Map<String, Value> {
        let mut values = Map::new();
        if send_props {
            values.extend(object.encode_properties());
            object.state().clear_config_changed();
        }
        if send_stats {
            values.extend(object.encode_statistics());
            object.state().clear_inst_changed();
        }
        values
    }

    /// Full encoding used by query responses (properties and statistics).
    fn encode_object_entry(object: &dyn ManagedObject, object_id: &ObjectId) -> Value {
        let state = object.state();
        if state.config_changed() || state.inst_changed() {
            state.touch_update_time();
        }
        let values = Self::encode_values(object, true, true);
        let mut entry = Map::new();
        entry.insert("_values".to_string(), Value::Object(values));
        entry.insert("_object_id".to_string(), Value::Object(object_id.to_map()));
        state.write_timestamps(&mut entry);
        entry.insert(
            "_schema_id".to_string(),
            Value::Object(object.schema_id().to_map()),
        );
        Value::Object(entry)
    }

    /// Partial encoding used by data indications.
    fn encode_batch_entry(
        object: &dyn ManagedObject,
        object_id: &ObjectId,
        send_props: bool,
        send_stats: bool,
    ) -> Value {
        let mut entry = Map::new();
        entry.insert("_object_id".to_string(), Value::Object(object_id.to_map()));
        entry.insert(
            "_schema_id".to_string(),
            Value::Object(object.schema_id().to_map()),
        );
        object.state().write_timestamps(&mut entry);
        let values = Self::encode_values(object, send_props, send_stats);
        entry.insert("_values".to_string(), Value::Object(values));
        Value::Object(entry)
    }
}
