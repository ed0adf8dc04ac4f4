//! Shared test helpers for agent tests.

#![allow(dead_code)]

use parking_lot::Mutex;
use qmf_agent::{AgentConfig, AgentEngine, BankStore, Command, PendingSet, WireMessage};
use qmf_types::{
    status, ManagedObject, MethodResult, ObjectState, SchemaHash, SchemaId,
};
use serde_json::{json, Map, Value};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// A managed object with canned properties and statistics.
pub struct TestObject {
    state: ObjectState,
    package: String,
    class: String,
    hash: SchemaHash,
    has_stats: bool,
    pub props: Mutex<Map<String, Value>>,
    pub stats: Mutex<Map<String, Value>>,
}

impl TestObject {
    pub fn new(package: &str, class: &str, hash_byte: u8) -> Arc<Self> {
        let mut props = Map::new();
        props.insert("name".to_string(), json!(class));
        Arc::new(Self {
            state: ObjectState::new(),
            package: package.to_string(),
            class: class.to_string(),
            hash: SchemaHash::from_bytes([hash_byte; 16]),
            has_stats: false,
            props: Mutex::new(props),
            stats: Mutex::new(Map::new()),
        })
    }

    pub fn with_stats(package: &str, class: &str, hash_byte: u8) -> Arc<Self> {
        let mut props = Map::new();
        props.insert("name".to_string(), json!(class));
        let mut stats = Map::new();
        stats.insert("count".to_string(), json!(0));
        Arc::new(Self {
            state: ObjectState::new(),
            package: package.to_string(),
            class: class.to_string(),
            hash: SchemaHash::from_bytes([hash_byte; 16]),
            has_stats: true,
            props: Mutex::new(props),
            stats: Mutex::new(stats),
        })
    }
}

impl ManagedObject for TestObject {
    fn schema_id(&self) -> SchemaId {
        SchemaId::new(&self.package, &self.class, self.hash)
    }

    fn state(&self) -> &ObjectState {
        &self.state
    }

    fn default_key(&self) -> String {
        self.class.clone()
    }

    fn encode_properties(&self) -> Map<String, Value> {
        self.props.lock().clone()
    }

    fn encode_statistics(&self) -> Map<String, Value> {
        self.stats.lock().clone()
    }

    fn has_statistics(&self) -> bool {
        self.has_stats
    }

    fn do_method(&self, name: &str, in_args: &Map<String, Value>) -> MethodResult {
        match name {
            "echo" => MethodResult::ok(in_args.clone()),
            "double" => {
                let x = in_args.get("x").and_then(Value::as_i64).unwrap_or(0);
                let mut out = Map::new();
                out.insert("y".to_string(), json!(x * 2));
                MethodResult::ok(out)
            }
            "refuse" => MethodResult::error(status::FORBIDDEN, "refused"),
            _ => MethodResult::error(status::UNKNOWN_METHOD, status::text(status::UNKNOWN_METHOD)),
        }
    }
}

/// An event with canned arguments.
pub struct TestEvent {
    package: String,
    name: String,
    hash: SchemaHash,
    pub severity: u8,
}

impl TestEvent {
    pub fn new(package: &str, name: &str, hash_byte: u8) -> Self {
        Self {
            package: package.to_string(),
            name: name.to_string(),
            hash: SchemaHash::from_bytes([hash_byte; 16]),
            severity: 6,
        }
    }
}

impl qmf_types::ManagedEvent for TestEvent {
    fn schema_id(&self) -> SchemaId {
        SchemaId::new(&self.package, &self.name, self.hash)
    }

    fn severity(&self) -> u8 {
        self.severity
    }

    fn encode(&self) -> Map<String, Value> {
        let mut args = Map::new();
        args.insert("what".to_string(), json!("happened"));
        args
    }
}

/// An engine wired to a fresh pending set, with its connected flag exposed.
pub struct EngineHarness {
    pub engine: AgentEngine,
    pub pending: Arc<Mutex<PendingSet>>,
    pub connected: Arc<AtomicBool>,
}

/// Builds an engine for `acme:svc:i1` with a 10-second interval.
pub fn make_engine(connected: bool) -> EngineHarness {
    make_engine_with(connected, false)
}

/// Builds an engine, optionally in external-thread mode.
pub fn make_engine_with(connected: bool, external_thread: bool) -> EngineHarness {
    let config = AgentConfig {
        interval_secs: 10,
        external_thread,
        vendor: "acme".to_string(),
        product: "svc".to_string(),
        instance: Some("i1".to_string()),
        ..AgentConfig::default()
    };
    let store = BankStore::open(None);
    let pending = Arc::new(Mutex::new(PendingSet::new(u64::from(store.boot_sequence()))));
    let connected = Arc::new(AtomicBool::new(connected));
    let engine = AgentEngine::new(&config, store, pending.clone(), connected.clone());
    EngineHarness {
        engine,
        pending,
        connected,
    }
}

/// A V2 request message with the given opcode, correlation id and body.
pub fn v2_request(opcode: &str, cid: &str, reply_to: &str, body: Value) -> WireMessage {
    let mut headers = Map::new();
    headers.insert("qmf.opcode".to_string(), json!(opcode));
    WireMessage {
        correlation_id: Some(cid.to_string()),
        app_id: Some("qmf2".to_string()),
        content_type: None,
        reply_to: Some(qmf_agent::ReplyTo::new("amq.direct", reply_to)),
        headers,
        body: body.to_string().into_bytes(),
    }
}

/// A V1 binary request frame wrapped in a wire message.
pub fn v1_request(frame: Vec<u8>, reply_to: &str) -> WireMessage {
    WireMessage {
        reply_to: Some(qmf_agent::ReplyTo::new("amq.direct", reply_to)),
        body: frame,
        ..WireMessage::default()
    }
}

/// Unpacks a publish command.
pub fn as_publish(command: &Command) -> (&str, &str, &WireMessage) {
    match command {
        Command::Publish {
            exchange,
            routing_key,
            message,
        } => (exchange, routing_key, message),
        other => panic!("expected Publish, got {other:?}"),
    }
}

/// Parses a JSON map body.
pub fn body_map(message: &WireMessage) -> Map<String, Value> {
    match serde_json::from_slice::<Value>(&message.body) {
        Ok(Value::Object(map)) => map,
        other => panic!("expected map body, got {other:?}"),
    }
}

/// Parses a JSON list body.
pub fn body_list(message: &WireMessage) -> Vec<Value> {
    match serde_json::from_slice::<Value>(&message.body) {
        Ok(Value::Array(list)) => list,
        other => panic!("expected list body, got {other:?}"),
    }
}
