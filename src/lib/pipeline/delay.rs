//! Simulated processing time.
//!
//! Workers never hold a lock while simulating work. The delay is a self-resuming timed
//! sleep, not a wait on shared state, so it needs no wakeup.

use std::fmt;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use rand::RngExt;
use rand::rngs::StdRng;

use super::routing::create_rng;

/// Which stage is doing the work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// First-line triage by a duty doctor.
    Triage,
    /// Specialist treatment.
    Treatment,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Triage => f.write_str("triage"),
            Self::Treatment => f.write_str("treatment"),
        }
    }
}

/// Blocks the calling worker for the duration of a unit of work.
pub trait ProcessingDelay: Send + Sync {
    /// Simulate `duration` worth of work at `stage`.
    fn simulate_work(&self, stage: Stage, duration: Duration);
}

/// Sleeps for exactly the configured duration.
#[derive(Debug, Clone, Copy, Default)]
pub struct SleepDelay;

impl ProcessingDelay for SleepDelay {
    fn simulate_work(&self, _stage: Stage, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }
}

/// Returns immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl ProcessingDelay for NoDelay {
    fn simulate_work(&self, _stage: Stage, _duration: Duration) {}
}

/// Sleeps for a random duration in `[0, max]`, ignoring the configured one.
///
/// Used by stress runs to shake out scheduling interleavings.
pub struct JitterDelay {
    max_micros: u64,
    rng: Mutex<StdRng>,
}

impl JitterDelay {
    /// Create a jitter delay bounded by `max`.
    #[must_use]
    pub fn new(max: Duration, seed: Option<u64>) -> Self {
        let max_micros = u64::try_from(max.as_micros()).unwrap_or(u64::MAX);
        Self { max_micros, rng: Mutex::new(create_rng(seed)) }
    }
}

impl ProcessingDelay for JitterDelay {
    fn simulate_work(&self, _stage: Stage, _duration: Duration) {
        if self.max_micros == 0 {
            thread::yield_now();
            return;
        }
        // Draw under the lock, sleep after releasing it.
        let micros = self.rng.lock().random_range(0..=self.max_micros);
        thread::sleep(Duration::from_micros(micros));
    }
}
