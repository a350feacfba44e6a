//! Interval progress logging.

use log::info;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counts completed items and logs a line each time the count crosses a multiple of
/// the interval. Safe to share between threads.
///
/// # Example
/// ```
/// use triage_lib::progress::ProgressTracker;
///
/// let progress = ProgressTracker::new("Completed stress runs").with_interval(100);
/// for _ in 0..250 {
///     progress.record(1); // logs at 100 and 200
/// }
/// progress.log_final(); // logs "Completed stress runs 250 (complete)"
/// assert_eq!(progress.count(), 250);
/// ```
pub struct ProgressTracker {
    interval: u64,
    message: String,
    count: AtomicU64,
}

impl ProgressTracker {
    /// Create a tracker with an interval of 100.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self { interval: 100, message: message.into(), count: AtomicU64::new(0) }
    }

    /// Set the logging interval (values below 1 are treated as 1).
    #[must_use]
    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval.max(1);
        self
    }

    /// Add `additional` to the count, logging every interval boundary crossed.
    ///
    /// Returns `true` if the new count sits exactly on a boundary.
    pub fn record(&self, additional: u64) -> bool {
        let prev = self.count.fetch_add(additional, Ordering::Relaxed);
        let count = prev + additional;
        for milestone in (prev / self.interval + 1)..=(count / self.interval) {
            info!("{} {}", self.message, milestone * self.interval);
        }
        count > 0 && count.is_multiple_of(self.interval)
    }

    /// Log the final count unless the last [`ProgressTracker::record`] already did.
    pub fn log_final(&self) {
        let count = self.count();
        if count > 0 && !count.is_multiple_of(self.interval) {
            info!("{} {} (complete)", self.message, count);
        }
    }

    /// Current count.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}
