//! Failure handling: invalid input, routing failures and panicking workers.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rstest::rstest;
use tempfile::TempDir;
use triage_lib::TriageError;
use triage_lib::event_log::{ClinicEvent, ClinicLog};
use triage_lib::pipeline::{CategoryId, Clinic, FixedRouting, NoDelay};

use crate::helpers::{assert_every_shift_ended, config, quiet_clinic, run_with_timeout};

const LIVENESS_TIMEOUT: Duration = Duration::from_secs(30);

#[rstest]
#[case::no_duty_doctors(config(5, 0, &[("a", 1)]), "duty-doctors")]
#[case::no_specialists(config(5, 1, &[]), "specialist")]
#[case::empty_pool(config(5, 1, &[("a", 0)]), "size")]
#[case::duplicate_pool(config(5, 1, &[("a", 1), ("a", 2)]), "more than once")]
fn test_invalid_configuration_is_rejected(
    #[case] config: triage_lib::config::ClinicConfig,
    #[case] expected: &str,
) {
    let error = Clinic::new(config).unwrap_err();
    assert!(matches!(error, TriageError::InvalidParameter { .. }), "{error:?}");
    assert!(error.to_string().contains(expected), "{error}");
}

#[test]
fn test_routing_failure_drops_every_patient_and_terminates() {
    let mut config = config(6, 2, &[("a", 1), ("b", 1)]);
    config.await_discharge = true;
    let (clinic, log) = quiet_clinic(config);
    let clinic = clinic.with_routing(|| -> triage_lib::Result<CategoryId> {
        Err(TriageError::RoutingFailed { reason: "no beds".to_string() })
    });
    let report = run_with_timeout(LIVENESS_TIMEOUT, move || clinic.run()).unwrap().unwrap();

    assert!(report.is_conserved());
    assert_eq!(report.routed, 0);
    assert_eq!(report.dropped, 6);
    assert_eq!(report.treated, 0);
    assert_eq!(report.left_untreated, 6);
    assert_eq!(report.discharged, 0);
    assert_eq!(log.count(|e| matches!(e, ClinicEvent::Dropped { reason, .. } if reason.contains("no beds"))), 6);
    assert_eq!(log.count(|e| matches!(e, ClinicEvent::LeftUntreated { .. })), 6);
    assert_eq!(log.count(|e| matches!(e, ClinicEvent::TreatmentStarted { .. })), 0);
    assert_every_shift_ended(&report, &log);
}

#[test]
fn test_partial_routing_failure_settles_everyone() {
    // Every third routing decision fails.
    let calls = AtomicUsize::new(0);
    let (clinic, log) = quiet_clinic(config(30, 3, &[("a", 1), ("b", 2)]));
    let clinic = clinic.with_routing(move || {
        let call = calls.fetch_add(1, Ordering::Relaxed);
        if call % 3 == 2 {
            Err(TriageError::RoutingFailed { reason: format!("call {call}") })
        } else {
            Ok(CategoryId::new(call % 2))
        }
    });
    let report = run_with_timeout(LIVENESS_TIMEOUT, move || clinic.run()).unwrap().unwrap();

    assert!(report.is_conserved());
    assert_eq!(report.dropped, 10);
    assert_eq!(report.routed, 20);
    assert_eq!(report.treated, 20);
    assert_eq!(log.count(|e| matches!(e, ClinicEvent::TreatmentFinished { .. })), 20);
}

#[test]
fn test_out_of_range_category_is_dropped() {
    let (clinic, log) = quiet_clinic(config(4, 1, &[("a", 1), ("b", 1)]));
    let report = clinic.with_routing(FixedRouting(CategoryId::new(7))).run().unwrap();

    assert_eq!(report.dropped, 4);
    assert_eq!(report.treated, 0);
    assert_eq!(
        log.count(|e| matches!(e, ClinicEvent::Dropped { reason, .. } if reason.contains("only 2 categories"))),
        4
    );
}

#[test]
fn test_panicking_routing_policy_reports_worker_failure() {
    let mut config = config(8, 2, &[("a", 1), ("b", 1)]);
    config.await_discharge = true;
    let (clinic, _log) = quiet_clinic(config);
    let clinic = clinic.with_routing(|| -> triage_lib::Result<CategoryId> { panic!("routing exploded") });

    let result = run_with_timeout(LIVENESS_TIMEOUT, move || clinic.run()).expect("run must terminate");
    match result {
        Err(TriageError::WorkerPanicked { worker, message }) => {
            assert!(worker.starts_with('D'), "{worker}");
            assert!(message.contains("routing exploded"), "{message}");
        }
        other => panic!("expected a worker panic, got {other:?}"),
    }
}

#[test]
fn test_unwritable_log_path_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing").join("clinic_log.txt");
    let error = ClinicLog::silent().with_file(&path).unwrap_err();
    assert!(matches!(error, TriageError::LogFile { .. }), "{error:?}");
    assert!(error.to_string().contains("missing"), "{error}");
}

#[test]
fn test_log_file_receives_every_event() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("clinic_log.txt");
    let log = Arc::new(ClinicLog::silent().with_file(&path).unwrap());
    let clinic = Clinic::new(config(3, 1, &[("a", 1)])).unwrap().with_delay(NoDelay).with_log(log);
    clinic.run().unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().filter(|l| l.contains("finished treating")).count(), 3);
    assert!(text.lines().all(|l| l.starts_with('[')));
    assert!(text.lines().last().unwrap().ends_with("The clinic day is over"));
}
