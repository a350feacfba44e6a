//! Shared state handed to every worker thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use super::delay::ProcessingDelay;
use super::patient::{CategoryId, Patient, PatientId};
use super::queue::{IdleStrategy, QueueStats, StageQueue};
use super::routing::RoutingPolicy;
use super::tracker::CompletionTracker;
use crate::config::ClinicConfig;
use crate::event_log::{ClinicEvent, ClinicLog};

/// Name of the duty (intake) queue in logs and metrics.
pub const INTAKE_QUEUE_NAME: &str = "duty";

/// Everything the worker pools share for one run.
///
/// Each field is either immutable for the run or guards itself; no code outside the
/// queue and tracker types touches their internals.
pub struct ClinicState {
    /// Queue feeding the duty doctors.
    pub intake: StageQueue<Patient>,
    /// One queue per specialist category, indexed by [`CategoryId::index`].
    pub specialists: Vec<StageQueue<Patient>>,
    /// Counts patients that have left the duty stage.
    pub tracker: CompletionTracker,
    /// Event sink.
    pub log: Arc<ClinicLog>,
    /// Chooses a category for each patient.
    pub routing: Box<dyn RoutingPolicy>,
    /// Simulates work at both stages.
    pub delay: Box<dyn ProcessingDelay>,
    /// Duty doctor processing time.
    pub triage_time: Duration,
    /// Specialist processing time.
    pub treatment_time: Duration,
    /// Category names, indexed like `specialists`.
    pub categories: Vec<String>,

    started: Instant,
    last_progress_ms: AtomicU64,
    treated: AtomicU64,
}

impl ClinicState {
    /// Build the shared state for `config`.
    #[must_use]
    pub fn new(
        config: &ClinicConfig,
        routing: Box<dyn RoutingPolicy>,
        delay: Box<dyn ProcessingDelay>,
        log: Arc<ClinicLog>,
        idle: IdleStrategy,
    ) -> Self {
        let specialists = config
            .specialists
            .iter()
            .map(|pool| StageQueue::new(pool.name.clone()).with_idle_strategy(idle))
            .collect();
        Self {
            intake: StageQueue::new(INTAKE_QUEUE_NAME).with_idle_strategy(idle),
            specialists,
            tracker: CompletionTracker::new(config.patients as u64),
            log,
            routing,
            delay,
            triage_time: config.triage_time,
            treatment_time: config.treatment_time,
            categories: config.specialists.iter().map(|pool| pool.name.clone()).collect(),
            started: Instant::now(),
            last_progress_ms: AtomicU64::new(0),
            treated: AtomicU64::new(0),
        }
    }

    /// The queue for `category`.
    ///
    /// # Panics
    ///
    /// Panics if `category` is out of range; callers check with
    /// [`check_category`](super::routing::check_category) first.
    #[must_use]
    pub fn specialist_queue(&self, category: CategoryId) -> &StageQueue<Patient> {
        &self.specialists[category.index()]
    }

    /// Display name of `category`.
    #[must_use]
    pub fn category_name(&self, category: CategoryId) -> &str {
        &self.categories[category.index()]
    }

    /// Wake every waiter on every queue so it re-checks its stop predicate.
    pub fn wake_all_queues(&self) {
        self.intake.wake_all();
        for queue in &self.specialists {
            queue.wake_all();
        }
    }

    /// Called by the worker whose settlement completed the tracker.
    pub fn finish_routing(&self) {
        self.log.record(ClinicEvent::AllPatientsRouted);
        self.wake_all_queues();
    }

    /// Give up on every unsettled patient and release all waiters.
    ///
    /// Returns the number of patients abandoned.
    pub fn abandon(&self) -> u64 {
        let abandoned = self.tracker.abandon();
        self.wake_all_queues();
        abandoned
    }

    /// Remove patients still queued after their consumers have stopped.
    ///
    /// Only non-empty after an abandoned run. Dropping the patients releases their
    /// discharge signals unfired. Returns the ids removed.
    pub fn release_stranded(&self) -> Vec<PatientId> {
        std::iter::once(&self.intake)
            .chain(&self.specialists)
            .flat_map(StageQueue::drain)
            .map(|patient| patient.id())
            .collect()
    }

    /// Note that the pipeline moved forward.
    pub fn mark_progress(&self) {
        let now = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.last_progress_ms.store(now, Ordering::Relaxed);
    }

    /// Time since the pipeline last moved forward.
    #[must_use]
    pub fn since_last_progress(&self) -> Duration {
        let last = Duration::from_millis(self.last_progress_ms.load(Ordering::Relaxed));
        self.started.elapsed().saturating_sub(last)
    }

    /// Count one finished treatment.
    pub fn record_treated(&self) {
        self.treated.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of finished treatments.
    #[must_use]
    pub fn treated(&self) -> u64 {
        self.treated.load(Ordering::Relaxed)
    }

    /// Stats of the intake queue followed by every specialist queue.
    #[must_use]
    pub fn queue_stats(&self) -> Vec<QueueStats> {
        std::iter::once(&self.intake).chain(&self.specialists).map(StageQueue::stats).collect()
    }

    /// Current depth of the intake queue followed by every specialist queue.
    #[must_use]
    pub fn queue_depths(&self) -> Vec<(String, usize)> {
        std::iter::once(&self.intake)
            .chain(&self.specialists)
            .map(|queue| (queue.name().to_string(), queue.len()))
            .collect()
    }
}
