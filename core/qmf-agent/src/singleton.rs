//! Process-wide agent singleton with a disable latch.
//!
//! Hosts that embed several components share one agent per process. The
//! guard counts acquisitions; the disable latch can only be set while no
//! agent exists, and the initializer is a no-op once management is
//! disabled.

use crate::agent::ManagementAgent;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::error;

struct SingletonState {
    ref_count: u32,
    disabled: bool,
    agent: Option<Arc<ManagementAgent>>,
}

static STATE: Mutex<SingletonState> = Mutex::new(SingletonState {
    ref_count: 0,
    disabled: false,
    agent: None,
});

/// Scoped acquisition of the process-wide agent slot. Dropping the last
/// guard releases the shared agent.
pub struct AgentSingleton {
    _private: (),
}

impl AgentSingleton {
    /// Acquires a reference to the slot. Passing `disable` latches
    /// management off; doing so after an agent exists is a programming
    /// error and is ignored.
    #[must_use]
    pub fn acquire(disable: bool) -> Self {
        let mut state = STATE.lock();
        if disable && !state.disabled {
            debug_assert_eq!(
                state.ref_count, 0,
                "cannot disable management after the agent was allocated"
            );
            if state.ref_count > 0 {
                error!("management disable requested after the agent was allocated");
            } else {
                state.disabled = true;
            }
        }
        state.ref_count += 1;
        Self { _private: () }
    }

    /// Installs the agent if management is enabled and none exists yet.
    /// Returns the shared instance, or `None` when disabled.
    pub fn initialize<F>(init: F) -> Option<Arc<ManagementAgent>>
    where
        F: FnOnce() -> ManagementAgent,
    {
        let mut state = STATE.lock();
        if state.disabled {
            return None;
        }
        if state.agent.is_none() {
            state.agent = Some(Arc::new(init()));
        }
        state.agent.clone()
    }

    /// The process-wide instance, if one has been installed.
    #[must_use]
    pub fn instance() -> Option<Arc<ManagementAgent>> {
        STATE.lock().agent.clone()
    }
}

impl Drop for AgentSingleton {
    fn drop(&mut self) {
        let mut state = STATE.lock();
        state.ref_count = state.ref_count.saturating_sub(1);
        if state.ref_count == 0 {
            state.agent = None;
        }
    }
}
