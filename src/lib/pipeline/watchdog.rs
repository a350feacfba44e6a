//! Stall detection for the clinic pipeline.
//!
//! The watchdog never intervenes. It watches the progress clock in [`ClinicState`] and,
//! when nothing has moved for the configured timeout, logs one warning with a snapshot
//! of every queue and the tracker counts. A stall episode ends as soon as progress
//! resumes; the next stall is reported again.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use log::warn;

use super::state::ClinicState;
use crate::errors::{Result, TriageError};

/// Configuration for stall detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogConfig {
    /// How long the pipeline may go without progress before a warning (zero disables).
    pub timeout: Duration,
    /// How often the progress clock is checked.
    pub interval: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(10), interval: Duration::from_millis(500) }
    }
}

impl WatchdogConfig {
    /// Detection with the given timeout, checked every `timeout / 4` (at most 1s).
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        let interval = (timeout / 4).clamp(Duration::from_millis(1), Duration::from_secs(1));
        Self { timeout, interval }
    }

    /// No detection.
    #[must_use]
    pub fn disabled() -> Self {
        Self { timeout: Duration::ZERO, ..Self::default() }
    }

    /// Whether detection is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.timeout.is_zero()
    }
}

/// Handle to a running watchdog thread.
pub struct Watchdog {
    shutdown: Sender<()>,
    handle: JoinHandle<u64>,
}

impl Watchdog {
    /// Start watching `state`.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn(state: Arc<ClinicState>, config: WatchdogConfig) -> Result<Self> {
        let (shutdown, shutdown_rx) = bounded(1);
        let handle = thread::Builder::new()
            .name("watchdog".to_string())
            .spawn(move || watch(&state, config, &shutdown_rx))
            .map_err(|source| TriageError::Spawn { worker: "watchdog".to_string(), source })?;
        Ok(Self { shutdown, handle })
    }

    /// Stop the watchdog and return the number of stalls it reported.
    pub fn stop(self) -> u64 {
        let _ = self.shutdown.send(());
        self.handle.join().unwrap_or(0)
    }
}

fn watch(state: &ClinicState, config: WatchdogConfig, shutdown: &Receiver<()>) -> u64 {
    let mut stalls = 0;
    let mut in_stall = false;
    loop {
        match shutdown.recv_timeout(config.interval) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return stalls,
            Err(RecvTimeoutError::Timeout) => {}
        }
        let idle = state.since_last_progress();
        if idle < config.timeout {
            in_stall = false;
            continue;
        }
        if !in_stall {
            in_stall = true;
            stalls += 1;
            report_stall(state, idle);
        }
    }
}

fn report_stall(state: &ClinicState, idle: Duration) {
    warn!("No pipeline progress for {:.1}s", idle.as_secs_f64());
    for (name, depth) in state.queue_depths() {
        warn!("  queue {name}: {depth} waiting");
    }
    warn!(
        "  tracker: {} routed, {} dropped of {} (complete: {})",
        state.tracker.routed(),
        state.tracker.dropped(),
        state.tracker.expected(),
        state.tracker.is_complete()
    );
}
