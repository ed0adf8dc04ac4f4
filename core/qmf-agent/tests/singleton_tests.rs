use qmf_agent::transport::mock::MockBroker;
use qmf_agent::{AgentConfig, AgentSingleton, ManagementAgent};
use std::sync::Arc;

// The singleton is process-wide state, so the whole lifecycle runs in one
// test to keep it sequential.
#[tokio::test]
async fn singleton_lifecycle() {
    assert!(AgentSingleton::instance().is_none());

    let guard = AgentSingleton::acquire(false);
    let broker = MockBroker::new();
    let transport = Arc::new(broker.clone());
    let first = AgentSingleton::initialize(|| {
        ManagementAgent::init(AgentConfig::default(), transport)
    })
    .expect("management enabled");

    // A second initialize returns the same instance without rebuilding.
    let second =
        AgentSingleton::initialize(|| unreachable!("second agent must not be built"))
            .expect("management enabled");
    assert!(Arc::ptr_eq(&first, &second));
    assert!(AgentSingleton::instance().is_some());

    first.close().await;
    drop(second);
    drop(first);
    drop(guard);

    // The slot is released with the last guard.
    assert!(AgentSingleton::instance().is_none());

    // The disable latch makes the initializer a no-op.
    let disabled = AgentSingleton::acquire(true);
    let transport = Arc::new(broker);
    assert!(AgentSingleton::initialize(|| {
        ManagementAgent::init(AgentConfig::default(), transport)
    })
    .is_none());
    drop(disabled);
}
