mod common;

use common::{body_map, v2_request, TestEvent, TestObject};
use qmf_agent::transport::mock::{MockBroker, Transfer};
use qmf_agent::{AgentConfig, ManagementAgent};
use qmf_types::Severity;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn make_config() -> AgentConfig {
    AgentConfig {
        interval_secs: 10,
        vendor: "acme".to_string(),
        product: "svc".to_string(),
        instance: Some("i1".to_string()),
        ..AgentConfig::default()
    }
}

fn start_agent(config: AgentConfig) -> (ManagementAgent, MockBroker) {
    let broker = MockBroker::new();
    let agent = ManagementAgent::init(config, Arc::new(broker.clone()));
    (agent, broker)
}

async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..500 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    false
}

fn find_response<'a>(transfers: &'a [Transfer], opcode: &str) -> Option<&'a Transfer> {
    transfers
        .iter()
        .find(|t| t.message.header_str("qmf.opcode") == Some(opcode))
}

/// Promotes pending objects by running an empty class query.
async fn promote_via_query(broker: &MockBroker) {
    broker.deliver(v2_request(
        "_query_request",
        "promote",
        "unused",
        json!({"_what": "OBJECT"}),
    ));
    assert!(
        wait_until(|| find_response(&broker.transfers(), "_query_response").is_some()).await
    );
    broker.take_transfers();
}

// ── Connection establishment ─────────────────────────────────────

#[tokio::test]
async fn connect_binds_queue_and_sends_opening_heartbeat() {
    let (agent, broker) = start_agent(make_config());
    assert!(wait_until(|| agent.connected()).await);

    let bindings = broker.bindings();
    let queue = bindings
        .first()
        .map(|b| b.queue.clone())
        .expect("at least one binding");
    assert!(queue.starts_with("qmfagent-"));
    assert!(bindings
        .iter()
        .any(|b| b.exchange == "amq.direct" && b.binding_key == queue));
    assert!(bindings
        .iter()
        .any(|b| b.exchange == "qmf.default.direct" && b.binding_key == "acme:svc:i1"));
    assert!(bindings
        .iter()
        .any(|b| b.exchange == "qmf.default.topic" && b.binding_key == "console.#"));

    assert!(
        wait_until(|| {
            find_response(&broker.transfers(), "_agent_heartbeat_indication").is_some()
        })
        .await
    );
    let transfers = broker.transfers();
    let heartbeat = find_response(&transfers, "_agent_heartbeat_indication").unwrap();
    assert_eq!(heartbeat.exchange, "qmf.default.topic");
    assert_eq!(heartbeat.routing_key, "agent.ind.heartbeat");
    let reply_to = heartbeat.message.reply_to.as_ref().unwrap();
    assert_eq!(reply_to.exchange, "amq.direct");
    assert_eq!(reply_to.routing_key, queue);

    agent.close().await;
    assert!(!agent.connected());
}

// ── Locate ───────────────────────────────────────────────────────

#[tokio::test]
async fn locate_round_trip() {
    let (agent, broker) = start_agent(make_config());
    assert!(wait_until(|| agent.connected()).await);
    broker.take_transfers();

    broker.deliver(v2_request("_agent_locate_request", "loc-1", "console-q", json!({})));
    assert!(
        wait_until(|| find_response(&broker.transfers(), "_agent_locate_response").is_some())
            .await
    );

    let transfers = broker.transfers();
    let response = find_response(&transfers, "_agent_locate_response").unwrap();
    assert_eq!(response.exchange, "qmf.default.direct");
    assert_eq!(response.routing_key, "console-q");
    assert_eq!(response.message.correlation_id.as_deref(), Some("loc-1"));
    assert_eq!(response.message.header_str("qmf.agent"), Some("acme:svc:i1"));

    let body = body_map(&response.message);
    let values = body.get("_values").and_then(Value::as_object).unwrap();
    assert_eq!(values.get("heartbeat_interval"), Some(&json!(10)));
    assert_eq!(values.get("epoch"), Some(&json!(agent.epoch())));
    assert!(values.contains_key("timestamp"));

    agent.close().await;
}

// ── Method invocation (internal thread) ──────────────────────────

#[tokio::test]
async fn method_success_round_trip() {
    let (agent, broker) = start_agent(make_config());
    assert!(wait_until(|| agent.connected()).await);

    let object = TestObject::new("org.acme", "C", 1);
    let object_id = agent.add_object(object, "c1", false);
    promote_via_query(&broker).await;

    broker.deliver(v2_request(
        "_method_request",
        "m-1",
        "console-q",
        json!({
            "_object_id": Value::Object(object_id.to_map()),
            "_method_name": "double",
            "_arguments": {"x": 21},
        }),
    ));
    assert!(
        wait_until(|| find_response(&broker.transfers(), "_method_response").is_some()).await
    );

    let transfers = broker.transfers();
    let response = find_response(&transfers, "_method_response").unwrap();
    assert_eq!(response.exchange, "qmf.default.direct");
    assert_eq!(response.routing_key, "console-q");
    assert_eq!(response.message.correlation_id.as_deref(), Some("m-1"));
    assert_eq!(response.message.header_str("method"), Some("response"));

    let body = body_map(&response.message);
    let args = body.get("_arguments").and_then(Value::as_object).unwrap();
    assert_eq!(args.get("y"), Some(&json!(42)));

    agent.close().await;
}

#[tokio::test]
async fn method_unknown_object_is_an_exception() {
    let (agent, broker) = start_agent(make_config());
    assert!(wait_until(|| agent.connected()).await);
    broker.take_transfers();

    broker.deliver(v2_request(
        "_method_request",
        "m-2",
        "console-q",
        json!({
            "_object_id": {"_agent_epoch": 1, "_object_name": "missing"},
            "_method_name": "double",
        }),
    ));
    assert!(wait_until(|| find_response(&broker.transfers(), "_exception").is_some()).await);

    let transfers = broker.transfers();
    let response = find_response(&transfers, "_exception").unwrap();
    assert_eq!(response.message.correlation_id.as_deref(), Some("m-2"));
    let body = body_map(&response.message);
    let values = body.get("_values").and_then(Value::as_object).unwrap();
    assert_eq!(values.get("_status_code"), Some(&json!(1)));
    assert_eq!(values.get("_status_text"), Some(&json!("UnknownObject")));

    agent.close().await;
}

#[tokio::test]
async fn method_missing_name_is_parameter_invalid() {
    let (agent, broker) = start_agent(make_config());
    assert!(wait_until(|| agent.connected()).await);
    broker.take_transfers();

    broker.deliver(v2_request(
        "_method_request",
        "m-3",
        "console-q",
        json!({"_object_id": {"_agent_epoch": 1, "_object_name": "x"}}),
    ));
    assert!(wait_until(|| find_response(&broker.transfers(), "_exception").is_some()).await);

    let transfers = broker.transfers();
    let body = body_map(&find_response(&transfers, "_exception").unwrap().message);
    let values = body.get("_values").and_then(Value::as_object).unwrap();
    assert_eq!(values.get("_status_code"), Some(&json!(4)));

    agent.close().await;
}

#[tokio::test]
async fn method_failure_maps_to_exception_response() {
    let (agent, broker) = start_agent(make_config());
    assert!(wait_until(|| agent.connected()).await);

    let object = TestObject::new("org.acme", "C", 1);
    let object_id = agent.add_object(object, "c1", false);
    promote_via_query(&broker).await;

    broker.deliver(v2_request(
        "_method_request",
        "m-4",
        "console-q",
        json!({
            "_object_id": Value::Object(object_id.to_map()),
            "_method_name": "refuse",
        }),
    ));
    assert!(wait_until(|| find_response(&broker.transfers(), "_exception").is_some()).await);

    let transfers = broker.transfers();
    let body = body_map(&find_response(&transfers, "_exception").unwrap().message);
    let values = body.get("_values").and_then(Value::as_object).unwrap();
    assert_eq!(values.get("_status_code"), Some(&json!(6)));
    assert_eq!(values.get("_status_text"), Some(&json!("refused")));

    agent.close().await;
}

// ── External-thread handoff ──────────────────────────────────────

#[tokio::test]
async fn external_thread_queues_until_polled() {
    let mut config = make_config();
    config.external_thread = true;
    let (agent, broker) = start_agent(config);
    assert!(wait_until(|| agent.connected()).await);

    let fd = agent.signal_fd();
    assert!(fd.is_some());

    let object = TestObject::new("org.acme", "C", 1);
    let object_id = agent.add_object(object, "c1", false);
    promote_via_query(&broker).await;

    broker.deliver(v2_request(
        "_method_request",
        "m-5",
        "console-q",
        json!({
            "_object_id": Value::Object(object_id.to_map()),
            "_method_name": "double",
            "_arguments": {"x": 2},
        }),
    ));

    // Drain from the host side; the response appears only after polling.
    assert!(
        wait_until(|| {
            agent.poll_callbacks(0);
            find_response(&broker.transfers(), "_method_response").is_some()
        })
        .await
    );
    assert_eq!(agent.poll_callbacks(0), 0);

    agent.close().await;
}

#[tokio::test]
async fn signal_callback_fires_on_queued_method() {
    let mut config = make_config();
    config.external_thread = true;
    let (agent, broker) = start_agent(config);
    assert!(wait_until(|| agent.connected()).await);

    let notified = Arc::new(AtomicBool::new(false));
    let flag = notified.clone();
    agent.set_signal_callback(move || flag.store(true, Ordering::SeqCst));

    broker.deliver(v2_request(
        "_method_request",
        "m-6",
        "console-q",
        json!({"_method_name": "double"}),
    ));
    assert!(wait_until(|| notified.load(Ordering::SeqCst)).await);

    // One queued invocation; draining answers it.
    assert_eq!(agent.poll_callbacks(0), 0);
    assert!(
        wait_until(|| find_response(&broker.transfers(), "_exception").is_some()).await
    );

    agent.close().await;
}

#[tokio::test]
async fn signal_fd_absent_without_external_thread() {
    let (agent, _broker) = start_agent(make_config());
    assert!(agent.signal_fd().is_none());
    agent.close().await;
}

// ── Events & schemata ────────────────────────────────────────────

#[tokio::test]
async fn raise_event_routes_to_event_topic() {
    let (agent, broker) = start_agent(make_config());
    assert!(wait_until(|| agent.connected()).await);
    broker.take_transfers();

    agent.raise_event(&TestEvent::new("org.acme", "alarm", 4), Severity::Warning);
    assert!(
        wait_until(|| {
            broker
                .transfers()
                .iter()
                .any(|t| t.routing_key == "console.event.0.0.org.acme.alarm")
        })
        .await
    );

    agent.close().await;
}

#[tokio::test]
async fn registering_a_package_announces_it() {
    let (agent, broker) = start_agent(make_config());
    assert!(wait_until(|| agent.connected()).await);
    broker.take_transfers();

    agent.register_class(
        "org.acme",
        "C",
        qmf_types::SchemaHash::from_bytes([1; 16]),
        Arc::new(|| b"schema".to_vec()),
    );
    assert!(
        wait_until(|| {
            broker
                .transfers()
                .iter()
                .any(|t| t.exchange == "qpid.management" && t.routing_key == "schema.package")
        })
        .await
    );

    agent.close().await;
}

// ── Reconnect backoff ────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn reconnect_backoff_doubles_per_failed_attempt() {
    let broker = MockBroker::new();
    broker.fail_next_connects(3);
    let agent = ManagementAgent::init(make_config(), Arc::new(broker.clone()));

    // Attempt 1 fails at t=0; the next attempts follow 2 s, 4 s, 8 s later.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(broker.connect_attempts(), 1);

    tokio::time::sleep(Duration::from_millis(1000)).await; // t = 2.5 s
    assert_eq!(broker.connect_attempts(), 2);

    tokio::time::sleep(Duration::from_millis(4000)).await; // t = 6.5 s
    assert_eq!(broker.connect_attempts(), 3);

    tokio::time::sleep(Duration::from_millis(8000)).await; // t = 14.5 s
    assert_eq!(broker.connect_attempts(), 4);
    assert!(agent.connected());

    agent.close().await;
}

#[tokio::test(start_paused = true)]
async fn reconnect_after_connection_loss_waits_one_second() {
    let broker = MockBroker::new();
    let agent = ManagementAgent::init(make_config(), Arc::new(broker.clone()));
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(broker.connect_attempts(), 1);
    assert!(agent.connected());

    broker.drop_connection();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(broker.connect_attempts(), 2);
    assert!(agent.connected());

    agent.close().await;
}

// ── Shutdown ─────────────────────────────────────────────────────

#[tokio::test]
async fn close_stops_the_agent() {
    let (agent, broker) = start_agent(make_config());
    assert!(wait_until(|| agent.connected()).await);
    agent.close().await;
    assert!(!agent.connected());

    let before = broker.transfers().len();
    broker.deliver(v2_request("_agent_locate_request", "x", "r", json!({})));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(broker.transfers().len(), before);
}
