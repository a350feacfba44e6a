//! Pipeline-wide completion tracking.
//!
//! The [`CompletionTracker`] is the one piece of global state every worker pool consults
//! to decide whether more work can still arrive. Each of the N patients settles exactly
//! once at stage 1: either it is placed on a specialist queue (routed) or it is dropped
//! because routing failed. Once every patient has settled no further specialist enqueue
//! can happen, which is the terminal predicate for all consumers.
//!
//! After [`CompletionTracker::abandon`] every outstanding patient counts as dropped and
//! later settlements are ignored, so a failed run still lets every consumer stop.
//!
//! The tracker lock is a leaf lock: it may be taken while a queue lock is held (inside a
//! stop predicate) but no queue lock is ever taken while it is held.

use parking_lot::Mutex;

#[derive(Debug, Default)]
struct TrackerState {
    routed: u64,
    dropped: u64,
    abandoned: bool,
}

impl TrackerState {
    fn settled(&self) -> u64 {
        self.routed + self.dropped
    }
}

/// Counts patients that have left stage 1.
#[derive(Debug)]
pub struct CompletionTracker {
    expected: u64,
    state: Mutex<TrackerState>,
}

impl CompletionTracker {
    /// Create a tracker expecting `expected` patients.
    ///
    /// With `expected == 0` the tracker starts complete.
    #[must_use]
    pub fn new(expected: u64) -> Self {
        Self { expected, state: Mutex::new(TrackerState::default()) }
    }

    /// Record a patient placed on a specialist queue.
    ///
    /// Returns `true` if this call settled the last outstanding patient, i.e. the caller
    /// is the one that must broadcast the completion to every queue.
    ///
    /// # Panics
    ///
    /// Panics if more patients settle than were expected.
    pub fn record_routed(&self) -> bool {
        let mut state = self.state.lock();
        if state.abandoned {
            return false;
        }
        assert!(
            state.settled() < self.expected,
            "routed a patient after all {} patients had settled",
            self.expected
        );
        state.routed += 1;
        state.settled() == self.expected
    }

    /// Record a patient dropped at stage 1.
    ///
    /// Returns `true` if this call settled the last outstanding patient.
    ///
    /// # Panics
    ///
    /// Panics if more patients settle than were expected.
    pub fn record_dropped(&self) -> bool {
        let mut state = self.state.lock();
        if state.abandoned {
            return false;
        }
        assert!(
            state.settled() < self.expected,
            "dropped a patient after all {} patients had settled",
            self.expected
        );
        state.dropped += 1;
        state.settled() == self.expected
    }

    /// Settle every outstanding patient as dropped.
    ///
    /// Used when the pipeline cannot continue (a worker failed to start or panicked) so
    /// that every remaining consumer's stop predicate becomes true. Later calls to
    /// `record_routed`/`record_dropped` are ignored and return `false`. Returns the
    /// number of patients abandoned.
    pub fn abandon(&self) -> u64 {
        let mut state = self.state.lock();
        let outstanding = self.expected - state.settled();
        state.dropped += outstanding;
        state.abandoned = true;
        outstanding
    }

    /// Whether [`CompletionTracker::abandon`] has been called.
    #[must_use]
    pub fn is_abandoned(&self) -> bool {
        self.state.lock().abandoned
    }

    /// Whether every expected patient has settled.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state.lock().settled() == self.expected
    }

    /// Number of patients placed on a specialist queue.
    #[must_use]
    pub fn routed(&self) -> u64 {
        self.state.lock().routed
    }

    /// Number of patients dropped at stage 1.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.state.lock().dropped
    }

    /// Number of patients the tracker expects.
    #[must_use]
    pub fn expected(&self) -> u64 {
        self.expected
    }
}
