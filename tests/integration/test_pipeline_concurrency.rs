//! Conservation, ordering and liveness under concurrency.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use proptest::prelude::*;
use rstest::rstest;
use triage_lib::event_log::{ClinicEvent, ClinicLog};
use triage_lib::pipeline::{
    CategoryId, Clinic, CompletionTracker, Dequeued, FixedRouting, JitterDelay, PatientId,
    RoundRobinRouting, StageQueue,
};

use crate::helpers::{
    assert_all_treated_once, assert_every_shift_ended, config, quiet_clinic, run_with_timeout,
};

const LIVENESS_TIMEOUT: Duration = Duration::from_secs(30);

#[rstest]
#[case(1, 1, &[("a", 1)])]
#[case(50, 1, &[("a", 1)])]
#[case(50, 8, &[("a", 1)])]
#[case(50, 1, &[("a", 1), ("b", 1), ("c", 1), ("d", 1)])]
#[case(200, 4, &[("a", 2), ("b", 3), ("c", 1)])]
#[case(3, 10, &[("a", 5), ("b", 5)])]
fn test_conservation_across_shapes(
    #[case] patients: usize,
    #[case] duty_doctors: usize,
    #[case] pools: &'static [(&'static str, usize)],
) {
    let (clinic, log) = quiet_clinic(config(patients, duty_doctors, pools));
    let report = run_with_timeout(LIVENESS_TIMEOUT, move || clinic.run()).unwrap().unwrap();

    assert_all_treated_once(&report, &log, patients as u64);
    assert_every_shift_ended(&report, &log);
}

#[test]
fn test_single_specialist_treats_in_referral_order() {
    // One referrer and one specialist: the specialist queue is FIFO, so treatment order
    // equals referral order.
    let (clinic, log) = quiet_clinic(config(40, 1, &[("a", 1)]));
    clinic.run().unwrap();

    let referred: Vec<PatientId> = log
        .entries()
        .into_iter()
        .filter_map(|e| match e.event {
            ClinicEvent::Referred { patient, .. } => Some(patient),
            _ => None,
        })
        .collect();
    let started: Vec<PatientId> = log
        .entries()
        .into_iter()
        .filter_map(|e| match e.event {
            ClinicEvent::TreatmentStarted { patient, .. } => Some(patient),
            _ => None,
        })
        .collect();
    assert_eq!(referred.len(), 40);
    assert_eq!(started, referred);
}

#[test]
fn test_jittered_runs_conserve_patients() {
    for seed in 0..50_u64 {
        let mut config = config(20, 3, &[("a", 1), ("b", 2), ("c", 1)]);
        config.seed = Some(seed);
        let log = Arc::new(ClinicLog::silent().with_capture());
        let clinic = Clinic::new(config)
            .unwrap()
            .with_delay(JitterDelay::new(Duration::from_millis(1), Some(seed)))
            .with_log(Arc::clone(&log));
        let report = run_with_timeout(LIVENESS_TIMEOUT, move || clinic.run())
            .unwrap_or_else(|e| panic!("seed {seed}: {e}"))
            .unwrap();
        assert_all_treated_once(&report, &log, 20);
    }
}

#[test]
fn test_idle_specialists_wake_and_stop() {
    // Every patient goes to the first pool; the other pools never see work and must
    // still observe the completion broadcast.
    let (clinic, log) = quiet_clinic(config(10, 2, &[("a", 1), ("b", 3), ("c", 2)]));
    let clinic = clinic.with_routing(FixedRouting(CategoryId::new(0)));
    let report = run_with_timeout(LIVENESS_TIMEOUT, move || clinic.run()).unwrap().unwrap();

    assert_all_treated_once(&report, &log, 10);
    assert_every_shift_ended(&report, &log);
    assert!(report.specialists.iter().filter(|w| w.label != "A").all(|w| w.patients.is_empty()));
}

#[test]
fn test_round_robin_with_many_doctors_balances_load() {
    let (clinic, log) = quiet_clinic(config(60, 6, &[("a", 1), ("b", 1), ("c", 1)]));
    let report = clinic.with_routing(RoundRobinRouting::new(3)).run().unwrap();

    assert_all_treated_once(&report, &log, 60);
    let per_queue: HashMap<&str, u64> =
        report.queues[1..].iter().map(|q| (q.name.as_str(), q.dequeued)).collect();
    assert!(per_queue.values().all(|&n| n == 20), "{per_queue:?}");
}

#[test]
fn test_queue_many_producers_many_consumers() {
    const PRODUCERS: usize = 4;
    const PER_PRODUCER: usize = 250;
    let queue = Arc::new(StageQueue::<usize>::new("shared"));
    let tracker = Arc::new(CompletionTracker::new((PRODUCERS * PER_PRODUCER) as u64));

    let consumers: Vec<_> = (0..3)
        .map(|_| {
            let queue = Arc::clone(&queue);
            let tracker = Arc::clone(&tracker);
            thread::spawn(move || {
                let mut seen = Vec::new();
                while let Dequeued::Item(item) = queue.dequeue_blocking(|| tracker.is_complete()) {
                    seen.push(item);
                }
                seen
            })
        })
        .collect();

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let queue = Arc::clone(&queue);
            let tracker = Arc::clone(&tracker);
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    queue.enqueue(p * PER_PRODUCER + i);
                    if tracker.record_routed() {
                        queue.wake_all();
                    }
                }
            })
        })
        .collect();

    for producer in producers {
        producer.join().unwrap();
    }
    let mut all: Vec<usize> = consumers.into_iter().flat_map(|c| c.join().unwrap()).collect();
    all.sort_unstable();
    assert_eq!(all, (0..PRODUCERS * PER_PRODUCER).collect::<Vec<_>>());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_queue_preserves_order(items in prop::collection::vec(any::<u32>(), 0..64)) {
        let queue = StageQueue::new("prop");
        for &item in &items {
            queue.enqueue(item);
        }
        let mut out = Vec::new();
        while let Dequeued::Item(item) = queue.dequeue_blocking(|| true) {
            out.push(item);
        }
        prop_assert_eq!(out, items);
        prop_assert!(queue.is_empty());
    }

    #[test]
    fn prop_tracker_completes_exactly_once(outcomes in prop::collection::vec(any::<bool>(), 1..40)) {
        let tracker = Arc::new(CompletionTracker::new(outcomes.len() as u64));
        let handles: Vec<_> = outcomes
            .iter()
            .map(|&routed| {
                let tracker = Arc::clone(&tracker);
                thread::spawn(move || {
                    if routed { tracker.record_routed() } else { tracker.record_dropped() }
                })
            })
            .collect();
        let completions = handles.into_iter().map(|h| h.join().unwrap()).filter(|&c| c).count();

        prop_assert_eq!(completions, 1);
        prop_assert!(tracker.is_complete());
        let routed = outcomes.iter().filter(|&&r| r).count() as u64;
        prop_assert_eq!(tracker.routed(), routed);
        prop_assert_eq!(tracker.dropped(), outcomes.len() as u64 - routed);
    }

    #[test]
    fn prop_small_clinics_conserve(
        patients in 0usize..30,
        duty_doctors in 1usize..5,
        pools in prop::collection::vec(1usize..4, 1..4),
    ) {
        let names = ["a", "b", "c", "d"];
        let shape: Vec<(&str, usize)> = pools.iter().enumerate().map(|(i, &n)| (names[i], n)).collect();
        let (clinic, log) = quiet_clinic(config(patients, duty_doctors, &shape));
        let report = run_with_timeout(LIVENESS_TIMEOUT, move || clinic.run()).unwrap().unwrap();
        prop_assert!(report.is_conserved());
        prop_assert_eq!(report.treated, patients as u64);
        prop_assert_eq!(log.count(|e| matches!(e, ClinicEvent::TreatmentFinished { .. })), patients);
    }
}

/// The long randomized-delay campaign; enable with `--features stress-tests`.
#[cfg(feature = "stress-tests")]
mod stress {
    use super::*;

    #[test]
    fn test_thousand_jittered_runs() {
        for run in 0..1000_u64 {
            let mut config = config(50, 2, &[("dentist", 1), ("surgeon", 1), ("therapist", 1)]);
            config.seed = Some(run);
            let log = Arc::new(ClinicLog::silent().with_capture());
            let clinic = Clinic::new(config)
                .unwrap()
                .with_delay(JitterDelay::new(Duration::from_millis(5), Some(run)))
                .with_log(Arc::clone(&log));
            let report = run_with_timeout(LIVENESS_TIMEOUT, move || clinic.run())
                .unwrap_or_else(|e| panic!("run {run}: {e}"))
                .unwrap();
            assert_all_treated_once(&report, &log, 50);
        }
    }
}
