//! Persistent bank / boot-sequence store.
//!
//! One line of ASCII: `MA02 <requestedBrokerBank> <requestedAgentBank>
//! <bootSequence>`. All I/O failures are non-fatal; the agent then runs in
//! memory-only mode.

use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Magic number guarding the store file.
pub const STORE_MAGIC: &str = "MA02";

/// File-backed record of the requested/assigned banks and the boot
/// sequence.
#[derive(Debug, Clone, Default)]
pub struct BankStore {
    path: Option<PathBuf>,
    requested_broker_bank: u32,
    requested_agent_bank: u32,
    assigned_broker_bank: u32,
    assigned_agent_bank: u32,
    boot_sequence: u32,
}

impl BankStore {
    /// Loads the store (a missing file or magic mismatch means "no
    /// persistent state"), advances the boot sequence into `[1, 0x0FFF]`,
    /// and rewrites the file with the requested banks.
    #[must_use]
    pub fn open(path: Option<PathBuf>) -> Self {
        let mut store = Self {
            path,
            ..Self::default()
        };
        store.retrieve();
        store.boot_sequence = store.boot_sequence.wrapping_add(1);
        if store.boot_sequence & 0xF000 != 0 {
            // The epoch is a 12-bit non-zero counter.
            store.boot_sequence = 1;
        }
        store.persist(true);
        store
    }

    fn retrieve(&mut self) {
        let Some(path) = &self.path else { return };
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                debug!("no bank store at {}: {}", path.display(), e);
                return;
            }
        };
        let mut fields = text.split_whitespace();
        if fields.next() != Some(STORE_MAGIC) {
            warn!("bank store {} has a bad magic number", path.display());
            return;
        }
        let mut next = || {
            fields
                .next()
                .and_then(|field| field.parse::<u32>().ok())
                .unwrap_or(0)
        };
        self.requested_broker_bank = next();
        self.requested_agent_bank = next();
        self.boot_sequence = next();
    }

    fn persist(&self, requested: bool) {
        let Some(path) = &self.path else { return };
        let (broker_bank, agent_bank) = if requested {
            (self.requested_broker_bank, self.requested_agent_bank)
        } else {
            (self.assigned_broker_bank, self.assigned_agent_bank)
        };
        let line = format!(
            "{} {} {} {}\n",
            STORE_MAGIC, broker_bank, agent_bank, self.boot_sequence
        );
        if let Err(e) = fs::write(path, line) {
            warn!("failed to write bank store {}: {}", path.display(), e);
        }
    }

    /// Records the broker-assigned banks and rewrites the file with them.
    pub fn set_assigned_banks(&mut self, broker_bank: u32, agent_bank: u32) {
        self.assigned_broker_bank = broker_bank;
        self.assigned_agent_bank = agent_bank;
        self.persist(false);
    }

    /// The current boot-sequence epoch.
    #[must_use]
    pub fn boot_sequence(&self) -> u32 {
        self.boot_sequence
    }

    /// The broker bank assigned by the broker (0 until assigned).
    #[must_use]
    pub fn assigned_broker_bank(&self) -> u32 {
        self.assigned_broker_bank
    }

    /// The agent bank assigned by the broker (0 until assigned).
    #[must_use]
    pub fn assigned_agent_bank(&self) -> u32 {
        self.assigned_agent_bank
    }

    /// The broker bank requested from the store file.
    #[must_use]
    pub fn requested_broker_bank(&self) -> u32 {
        self.requested_broker_bank
    }

    /// The agent bank requested from the store file.
    #[must_use]
    pub fn requested_agent_bank(&self) -> u32 {
        self.requested_agent_bank
    }
}
