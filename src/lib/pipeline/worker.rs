//! Duty doctor and specialist worker loops.
//!
//! Both loops have the same shape: block on their queue with a stop predicate, process
//! each item, and log the end of shift once the queue reports [`Dequeued::Stop`].
//! Termination is final; a worker never resumes after it ends its shift.
//!
//! Stop predicates:
//! - duty doctor: every patient has settled at the duty stage;
//! - specialist: every patient has settled *and* this specialist's queue is empty.
//!   The emptiness half is structural: [`StageQueue::dequeue_blocking`] only consults
//!   the predicate after observing its own queue empty under its own lock.
//!
//! [`StageQueue::dequeue_blocking`]: super::queue::StageQueue::dequeue_blocking

use std::thread;

use log::{debug, error, warn};

use super::delay::Stage;
use super::patient::{CategoryId, PatientId};
use super::queue::Dequeued;
use super::routing::check_category;
use super::state::ClinicState;
use crate::event_log::ClinicEvent;

/// What a worker did during its shift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSummary {
    /// Worker label (`D1`, `Surgeon #2`, ...).
    pub label: String,
    /// Stage the worker belongs to.
    pub stage: Stage,
    /// Specialist category, `None` for duty doctors.
    pub category: Option<CategoryId>,
    /// Patients processed, in processing order.
    pub patients: Vec<PatientId>,
}

impl WorkerSummary {
    fn new(label: &str, stage: Stage, category: Option<CategoryId>) -> Self {
        Self { label: label.to_string(), stage, category, patients: Vec::new() }
    }
}

/// Releases every other worker if this one unwinds.
///
/// A panicking worker may leave patients unsettled; without this the remaining
/// consumers would wait forever for a completion that never comes.
struct AbandonOnPanic<'a> {
    state: &'a ClinicState,
    label: &'a str,
}

impl Drop for AbandonOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            let abandoned = self.state.abandon();
            error!("{} panicked; abandoning {abandoned} unsettled patient(s)", self.label);
        }
    }
}

/// Run one duty doctor until every patient has settled.
pub fn run_duty_doctor(state: &ClinicState, label: &str) -> WorkerSummary {
    let _guard = AbandonOnPanic { state, label };
    let mut summary = WorkerSummary::new(label, Stage::Triage, None);

    while let Dequeued::Item(mut patient) = state.intake.dequeue_blocking(|| state.tracker.is_complete()) {
        state.mark_progress();
        let id = patient.id();
        summary.patients.push(id);
        state.log.record(ClinicEvent::Admitted { doctor: label.to_string(), patient: id });

        state.delay.simulate_work(Stage::Triage, state.triage_time);

        let routed = state
            .routing
            .choose_category()
            .and_then(|category| check_category(category, state.specialists.len()));
        let completed = match routed {
            Ok(category) => {
                patient.assign(category);
                state.log.record(ClinicEvent::Referred {
                    doctor: label.to_string(),
                    patient: id,
                    category: state.category_name(category).to_string(),
                });
                state.specialist_queue(category).enqueue(patient);
                state.mark_progress();
                state.tracker.record_routed()
            }
            Err(e) => {
                warn!("{label} dropped patient P{id}: {e}");
                state.log.record(ClinicEvent::Dropped {
                    doctor: label.to_string(),
                    patient: id,
                    reason: e.to_string(),
                });
                // Dropping the patient releases its discharge signal unfired.
                drop(patient);
                state.tracker.record_dropped()
            }
        };
        if completed {
            debug!("{label} settled the last patient");
            state.finish_routing();
        }
    }

    state.log.record(ClinicEvent::ShiftEnded { worker: label.to_string() });
    summary
}

/// Run one specialist of `category` until every patient has settled and its queue is
/// drained.
pub fn run_specialist(state: &ClinicState, category: CategoryId, label: &str) -> WorkerSummary {
    let _guard = AbandonOnPanic { state, label };
    let mut summary = WorkerSummary::new(label, Stage::Treatment, Some(category));
    let queue = state.specialist_queue(category);

    while let Dequeued::Item(patient) = queue.dequeue_blocking(|| state.tracker.is_complete()) {
        state.mark_progress();
        let id = patient.id();
        state.log.record(ClinicEvent::TreatmentStarted { specialist: label.to_string(), patient: id });

        state.delay.simulate_work(Stage::Treatment, state.treatment_time);

        state.log.record(ClinicEvent::TreatmentFinished { specialist: label.to_string(), patient: id });
        state.record_treated();
        state.mark_progress();
        summary.patients.push(patient.discharge());
    }

    state.log.record(ClinicEvent::ShiftEnded { worker: label.to_string() });
    summary
}
