//! End-to-end clinic scenarios.

use std::sync::Arc;
use std::time::Duration;

use rstest::rstest;
use triage_lib::event_log::{ClinicEvent, ClinicLog, LogEntry};
use triage_lib::pipeline::{
    CategoryId, Clinic, FixedRouting, IdleStrategy, RoundRobinRouting, Stage, WatchdogConfig,
};

use crate::helpers::{
    assert_all_treated_once, assert_every_shift_ended, config, finished_ids, quiet_clinic,
};

fn first_index(entries: &[LogEntry], predicate: impl Fn(&ClinicEvent) -> bool) -> usize {
    entries.iter().position(|entry| predicate(&entry.event)).expect("event not logged")
}

#[test]
fn test_zero_patients_terminates_immediately() {
    let (clinic, log) = quiet_clinic(config(0, 2, &[("dentist", 1), ("surgeon", 1)]));
    let report = clinic.run().unwrap();

    assert_eq!(report.patients, 0);
    assert_eq!(report.routed, 0);
    assert_eq!(report.treated, 0);
    assert!(finished_ids(&log).is_empty());
    assert_eq!(log.count(|e| matches!(e, ClinicEvent::TreatmentStarted { .. })), 0);
    assert_every_shift_ended(&report, &log);
    assert_eq!(log.count(|e| *e == ClinicEvent::DayOver), 1);
}

#[test]
fn test_single_patient_forced_category() {
    let (clinic, log) = quiet_clinic(config(1, 2, &[("dentist", 1), ("surgeon", 1), ("therapist", 1)]));
    let report = clinic.with_routing(FixedRouting(CategoryId::new(1))).run().unwrap();

    assert_all_treated_once(&report, &log, 1);
    assert_eq!(report.routed, 1);
    let surgeon = report.specialists.iter().find(|w| w.label == "Surgeon").unwrap();
    assert_eq!(surgeon.patients, vec![1]);
    assert!(report.specialists.iter().filter(|w| w.label != "Surgeon").all(|w| w.patients.is_empty()));
    assert_eq!(
        log.count(|e| matches!(e, ClinicEvent::Referred { category, .. } if category == "surgeon")),
        1
    );
}

#[test]
fn test_ten_patients_two_doctors_three_specialists() {
    let (clinic, log) = quiet_clinic(config(10, 2, &[("dentist", 1), ("surgeon", 1), ("therapist", 1)]));
    let report = clinic.run().unwrap();

    assert_all_treated_once(&report, &log, 10);
    assert_eq!(log.count(|e| matches!(e, ClinicEvent::TreatmentFinished { .. })), 10);
    assert_every_shift_ended(&report, &log);
    assert_eq!(report.duty_doctors.len(), 2);
    assert_eq!(report.specialists.len(), 3);
    assert!(report.workers().all(|w| w.stage == Stage::Triage || w.category.is_some()));
}

#[test]
fn test_event_order_for_each_patient() {
    let (clinic, log) = quiet_clinic(config(8, 3, &[("a", 2), ("b", 1)]));
    clinic.run().unwrap();

    let entries = log.entries();
    for id in 1..=8 {
        let arrived = first_index(&entries, |e| *e == ClinicEvent::Arrived { patient: id });
        let admitted =
            first_index(&entries, |e| matches!(e, ClinicEvent::Admitted { patient, .. } if *patient == id));
        let referred =
            first_index(&entries, |e| matches!(e, ClinicEvent::Referred { patient, .. } if *patient == id));
        let started = first_index(&entries, |e| {
            matches!(e, ClinicEvent::TreatmentStarted { patient, .. } if *patient == id)
        });
        let finished = first_index(&entries, |e| {
            matches!(e, ClinicEvent::TreatmentFinished { patient, .. } if *patient == id)
        });
        assert!(arrived < admitted, "P{id}");
        assert!(admitted < referred, "P{id}");
        assert!(referred < started, "P{id}");
        assert!(started < finished, "P{id}");
    }

    let routed_at = first_index(&entries, |e| *e == ClinicEvent::AllPatientsRouted);
    let treated_at = first_index(&entries, |e| *e == ClinicEvent::AllPatientsTreated);
    assert!(routed_at < treated_at);
    assert_eq!(entries.last().unwrap().event, ClinicEvent::DayOver);
}

#[test]
fn test_parameter_banner_comes_first() {
    let (clinic, log) = quiet_clinic(config(2, 1, &[("dentist", 1)]));
    clinic.run().unwrap();
    let entries = log.entries();
    match &entries[0].event {
        ClinicEvent::Note(text) => {
            assert!(text.contains("2 patient(s)"), "{text}");
            assert!(text.contains("dentist:1"), "{text}");
        }
        other => panic!("expected banner, got {other:?}"),
    }
}

#[test]
fn test_round_robin_spreads_patients() {
    let (clinic, log) = quiet_clinic(config(9, 1, &[("a", 1), ("b", 1), ("c", 1)]));
    let report = clinic.with_routing(RoundRobinRouting::new(3)).run().unwrap();

    assert_all_treated_once(&report, &log, 9);
    // One duty doctor takes patients in queue order; the rotation then fixes the split.
    for specialist in &report.specialists {
        assert_eq!(specialist.patients.len(), 3, "{}", specialist.label);
    }
}

#[rstest]
#[case(1, &[("a", 1)])]
#[case(2, &[("a", 3)])]
#[case(4, &[("a", 1), ("b", 2), ("c", 1), ("d", 1)])]
fn test_pool_shapes(#[case] duty_doctors: usize, #[case] pools: &[(&str, usize)]) {
    let (clinic, log) = quiet_clinic(config(25, duty_doctors, pools));
    let report = clinic.run().unwrap();
    assert_all_treated_once(&report, &log, 25);
    assert_every_shift_ended(&report, &log);
}

#[test]
fn test_await_discharge_every_patient_goes_home() {
    let mut config = config(12, 2, &[("dentist", 1), ("surgeon", 2)]);
    config.await_discharge = true;
    let (clinic, log) = quiet_clinic(config);
    let report = clinic.run().unwrap();

    assert_all_treated_once(&report, &log, 12);
    assert_eq!(report.discharged, 12);
    assert_eq!(log.count(|e| matches!(e, ClinicEvent::Discharged { .. })), 12);
}

#[test]
fn test_real_delays_overlap_across_specialists() {
    // Three patients to three different specialists: treatment must run in parallel.
    let mut config = config(3, 3, &[("a", 1), ("b", 1), ("c", 1)]);
    config.treatment_time = Duration::from_millis(200);
    let report = Clinic::new(config)
        .unwrap()
        .with_routing(RoundRobinRouting::new(3))
        .with_log(Arc::new(ClinicLog::silent()))
        .run()
        .unwrap();

    assert_eq!(report.treated, 3);
    assert!(report.elapsed < Duration::from_millis(550), "elapsed {:?}", report.elapsed);
}

#[test]
fn test_polling_idle_strategy() {
    let (clinic, log) = quiet_clinic(config(30, 2, &[("dentist", 2), ("surgeon", 1)]));
    let report =
        clinic.with_idle_strategy(IdleStrategy::Poll(Duration::from_millis(1))).run().unwrap();

    assert_all_treated_once(&report, &log, 30);
    assert_every_shift_ended(&report, &log);
}

#[test]
fn test_watchdog_enabled_run_reports_no_stalls() {
    let (clinic, log) = quiet_clinic(config(20, 2, &[("dentist", 1), ("surgeon", 1)]));
    let report = clinic.with_watchdog(WatchdogConfig::with_timeout(Duration::from_secs(5))).run().unwrap();

    assert_all_treated_once(&report, &log, 20);
    assert_eq!(report.stalls, 0);
}

#[test]
fn test_queue_stats_cover_every_queue() {
    let (clinic, _log) = quiet_clinic(config(15, 2, &[("dentist", 1), ("surgeon", 2)]));
    let report = clinic.run().unwrap();

    let names: Vec<&str> = report.queues.iter().map(|q| q.name.as_str()).collect();
    assert_eq!(names, vec!["duty", "dentist", "surgeon"]);
    assert_eq!(report.queues[0].enqueued, 15);
    assert_eq!(report.queues[0].dequeued, 15);
    let specialist_total: u64 = report.queues[1..].iter().map(|q| q.dequeued).sum();
    assert_eq!(specialist_total, 15);
    assert!(report.queues.iter().all(|q| q.enqueued == q.dequeued));
}
