//! The two-stage clinic pipeline.
//!
//! ```text
//!   P1 .. PN                 D1 .. DD                    specialist pools
//!  (generators) --enqueue--> [ duty ] --route+enqueue--> [ dentist   ] --> Dentist
//!                                                       [ surgeon   ] --> Surgeon #1, #2
//!                                                       [ therapist ] --> Therapist
//!                                 |
//!                                 +--> CompletionTracker (routed + dropped == N)
//! ```
//!
//! Every queue is a [`StageQueue`]: one lock, one condition variable, unbounded FIFO.
//! There is no per-queue end-of-input marker. Instead every consumer blocks with a stop
//! predicate on the shared [`CompletionTracker`], and the duty doctor whose settlement
//! completes the tracker broadcasts on every queue so that all waiters re-check.
//!
//! # Lock discipline
//!
//! - Queue locks are never nested: no code path holds two queue locks at once.
//! - The tracker lock is a leaf: it may be taken inside a queue lock (stop predicates)
//!   but never the other way round.
//! - No lock is held while simulating work.

pub mod coordinator;
pub mod delay;
pub mod patient;
pub mod queue;
pub mod routing;
pub mod state;
pub mod tracker;
pub mod watchdog;
pub mod worker;

pub use coordinator::{Clinic, ClinicReport, extract_panic_message};
pub use delay::{JitterDelay, NoDelay, ProcessingDelay, SleepDelay, Stage};
pub use patient::{CategoryId, DischargeReceipt, Patient, PatientId};
pub use queue::{Dequeued, IdleStrategy, QueueStats, StageQueue};
pub use routing::{
    FixedRouting, RoundRobinRouting, RoutingPolicy, RoutingStrategy, UniformRouting,
    check_category, create_rng,
};
pub use state::ClinicState;
pub use tracker::CompletionTracker;
pub use watchdog::{Watchdog, WatchdogConfig};
pub use worker::{WorkerSummary, run_duty_doctor, run_specialist};
