//! Assertions over captured event logs and run reports.

use std::collections::HashSet;

use triage_lib::event_log::{ClinicEvent, ClinicLog};
use triage_lib::pipeline::{ClinicReport, PatientId};

/// Patient ids in the order their treatment finished.
pub fn finished_ids(log: &ClinicLog) -> Vec<PatientId> {
    log.entries()
        .into_iter()
        .filter_map(|entry| match entry.event {
            ClinicEvent::TreatmentFinished { patient, .. } => Some(patient),
            _ => None,
        })
        .collect()
}

/// Assert that every one of `n` patients was treated exactly once.
pub fn assert_all_treated_once(report: &ClinicReport, log: &ClinicLog, n: u64) {
    assert!(report.is_conserved(), "report not conserved: {report:?}");
    assert_eq!(report.patients, n);
    assert_eq!(report.routed, n, "routed");
    assert_eq!(report.dropped, 0, "dropped");
    assert_eq!(report.treated, n, "treated");

    let finished = finished_ids(log);
    assert_eq!(finished.len() as u64, n, "finished treating events");
    let distinct: HashSet<PatientId> = finished.iter().copied().collect();
    assert_eq!(distinct.len(), finished.len(), "a patient was treated twice");
    assert_eq!(distinct, (1..=n as PatientId).collect::<HashSet<_>>());
}

/// Assert that every worker logged the end of its shift exactly once.
pub fn assert_every_shift_ended(report: &ClinicReport, log: &ClinicLog) {
    for worker in report.workers() {
        let ended = log.count(|e| *e == ClinicEvent::ShiftEnded { worker: worker.label.clone() });
        assert_eq!(ended, 1, "{} ended shift {ended} times", worker.label);
    }
}
