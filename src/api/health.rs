//! Shared health state for the /health endpoint.
//! Updated by the settlement engine, read by the API.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Shared health metrics.
#[derive(Default)]
pub struct HealthState {
    /// True while the settlement engine task is in its command loop.
    pub engine_running: AtomicBool,
    /// Total settlement commands applied since startup.
    pub commands_processed: AtomicU64,
    /// Millisecond timestamp of the last applied command (0 = none).
    pub last_command_at_ms: AtomicU64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_engine_running(&self, v: bool) {
        self.engine_running.store(v, Ordering::Relaxed);
    }

    pub fn inc_commands_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_last_command_at_ms(&self, ms: u64) {
        self.last_command_at_ms.store(ms, Ordering::Relaxed);
    }

    pub fn engine_running(&self) -> bool {
        self.engine_running.load(Ordering::Relaxed)
    }

    pub fn commands_processed(&self) -> u64 {
        self.commands_processed.load(Ordering::Relaxed)
    }

    pub fn last_command_at_ms(&self) -> u64 {
        self.last_command_at_ms.load(Ordering::Relaxed)
    }
}
