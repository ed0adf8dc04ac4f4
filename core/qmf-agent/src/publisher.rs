//! Periodic publisher — data-indication snapshots and heartbeats.

use crate::agent::AgentShared;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// The publish-loop task: one publish cycle, then `interval` seconds of
/// 1-second shutdown-checked sleep.
pub(crate) async fn run(
    shared: Arc<AgentShared>,
    interval_secs: u16,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            return;
        }

        let commands = shared.engine.lock().periodic_processing();
        for command in commands {
            shared.send(command);
        }

        let mut slept = 0u16;
        while slept < interval_secs {
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
