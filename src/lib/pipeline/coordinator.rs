//! Pipeline lifecycle.
//!
//! [`Clinic`] owns a validated configuration plus the pluggable collaborators (routing
//! policy, processing delay, event log) and runs the pipeline to completion:
//!
//! 1. start the specialist pools, then the duty doctors;
//! 2. start one intake generator per patient and wait until every patient is admitted;
//! 3. join the duty doctors (they stop once every patient has settled);
//! 4. join the specialists (they stop once every patient has settled and their queue
//!    is drained);
//! 5. release patients an abandoned run left queued, join the generators, stop the
//!    watchdog, log the closing events and flush the log.
//!
//! A worker that fails to start or panics abandons the tracker so the remaining
//! threads still terminate; the failure is reported once everything has been joined.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Sender, unbounded};
use log::{error, warn};

use super::delay::{ProcessingDelay, SleepDelay};
use super::patient::{CategoryId, Patient, PatientId};
use super::queue::{IdleStrategy, QueueStats};
use super::routing::{RoutingPolicy, UniformRouting};
use super::state::ClinicState;
use super::watchdog::{Watchdog, WatchdogConfig};
use super::worker::{WorkerSummary, run_duty_doctor, run_specialist};
use crate::config::ClinicConfig;
use crate::errors::{Result, TriageError};
use crate::event_log::{ClinicEvent, ClinicLog};

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClinicReport {
    /// Patients created (N).
    pub patients: u64,
    /// Patients placed on a specialist queue.
    pub routed: u64,
    /// Patients dropped at the duty stage.
    pub dropped: u64,
    /// Treatments finished.
    pub treated: u64,
    /// Waiting patients told they were treated (only with `await_discharge`).
    pub discharged: u64,
    /// Waiting patients told they would not be treated (only with `await_discharge`).
    pub left_untreated: u64,
    /// One summary per duty doctor.
    pub duty_doctors: Vec<WorkerSummary>,
    /// One summary per specialist worker.
    pub specialists: Vec<WorkerSummary>,
    /// The intake queue followed by every specialist queue.
    pub queues: Vec<QueueStats>,
    /// Stall warnings issued by the watchdog.
    pub stalls: u64,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

impl ClinicReport {
    /// Every worker summary, duty doctors first.
    pub fn workers(&self) -> impl Iterator<Item = &WorkerSummary> {
        self.duty_doctors.iter().chain(&self.specialists)
    }

    /// Whether every patient settled exactly once and every routed patient was treated.
    #[must_use]
    pub fn is_conserved(&self) -> bool {
        let admitted: usize = self.duty_doctors.iter().map(|w| w.patients.len()).sum();
        let treated: usize = self.specialists.iter().map(|w| w.patients.len()).sum();
        self.routed + self.dropped == self.patients
            && admitted as u64 == self.patients
            && treated as u64 == self.routed
            && self.treated == self.routed
    }
}

/// A configured clinic, ready to run once.
pub struct Clinic {
    config: ClinicConfig,
    routing: Box<dyn RoutingPolicy>,
    delay: Box<dyn ProcessingDelay>,
    log: Arc<ClinicLog>,
    idle: IdleStrategy,
    watchdog: WatchdogConfig,
}

impl fmt::Debug for Clinic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clinic")
            .field("config", &self.config)
            .field("log", &self.log)
            .field("idle", &self.idle)
            .field("watchdog", &self.watchdog)
            .finish_non_exhaustive()
    }
}

impl Clinic {
    /// Create a clinic with uniform routing, real sleeps, console logging and no
    /// watchdog.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid; no thread is started in that case.
    pub fn new(config: ClinicConfig) -> Result<Self> {
        config.validate()?;
        let routing = Box::new(UniformRouting::new(config.categories(), config.seed));
        Ok(Self {
            config,
            routing,
            delay: Box::new(SleepDelay),
            log: Arc::new(ClinicLog::console()),
            idle: IdleStrategy::Block,
            watchdog: WatchdogConfig::disabled(),
        })
    }

    /// Use `routing` to choose categories.
    #[must_use]
    pub fn with_routing(self, routing: impl RoutingPolicy + 'static) -> Self {
        self.with_routing_box(Box::new(routing))
    }

    /// Use an already boxed routing policy.
    #[must_use]
    pub fn with_routing_box(mut self, routing: Box<dyn RoutingPolicy>) -> Self {
        self.routing = routing;
        self
    }

    /// Use `delay` to simulate work.
    #[must_use]
    pub fn with_delay(mut self, delay: impl ProcessingDelay + 'static) -> Self {
        self.delay = Box::new(delay);
        self
    }

    /// Record events to `log`.
    #[must_use]
    pub fn with_log(mut self, log: Arc<ClinicLog>) -> Self {
        self.log = log;
        self
    }

    /// Set how idle workers wait.
    #[must_use]
    pub fn with_idle_strategy(mut self, idle: IdleStrategy) -> Self {
        self.idle = idle;
        self
    }

    /// Enable stall detection.
    #[must_use]
    pub fn with_watchdog(mut self, watchdog: WatchdogConfig) -> Self {
        self.watchdog = watchdog;
        self
    }

    /// The configuration this clinic runs with.
    #[must_use]
    pub fn config(&self) -> &ClinicConfig {
        &self.config
    }

    /// Run the pipeline to completion.
    ///
    /// # Errors
    ///
    /// Returns an error if a worker cannot be started, a worker panics, or the event log
    /// cannot be flushed. Every started thread has been joined when this returns.
    pub fn run(self) -> Result<ClinicReport> {
        let Self { config, routing, delay, log, idle, watchdog } = self;
        let start = Instant::now();
        log_parameters(&log, &config);

        let state = Arc::new(ClinicState::new(&config, routing, delay, Arc::clone(&log), idle));
        let mut failure: Option<TriageError> = None;

        // Phase 1: consumers first.
        let mut specialists = Vec::with_capacity(config.specialist_workers());
        let mut doctors = Vec::with_capacity(config.duty_doctors);
        if let Err(e) = spawn_pools(&state, &config, &mut specialists, &mut doctors) {
            error!("{e}; shutting down");
            state.abandon();
            failure = Some(e);
        }

        let watchdog = if watchdog.is_enabled() && failure.is_none() {
            match Watchdog::spawn(Arc::clone(&state), watchdog) {
                Ok(w) => Some(w),
                Err(e) => {
                    warn!("Continuing without stall detection: {e}");
                    None
                }
            }
        } else {
            None
        };

        // Phase 2: intake. Skipped entirely if the pools could not be started.
        let generators = if failure.is_none() {
            admit_patients(&state, &config)
        } else {
            Vec::new()
        };

        // Phases 3 and 4: pools terminate on their own stop predicates.
        let duty_doctors = join_all(doctors, &mut failure);
        let specialists = join_all(specialists, &mut failure);

        let stranded = state.release_stranded();
        if !stranded.is_empty() {
            warn!("{} patient(s) were still queued when the workers stopped", stranded.len());
        }

        // Phase 5.
        let mut discharged = 0;
        let mut left_untreated = 0;
        for outcome in join_all(generators, &mut failure).into_iter().flatten() {
            if outcome {
                discharged += 1;
            } else {
                left_untreated += 1;
            }
        }
        let stalls = watchdog.map_or(0, Watchdog::stop);

        log.record(ClinicEvent::AllPatientsTreated);
        log.record(ClinicEvent::DayOver);
        let flushed = log.flush();

        if let Some(e) = failure {
            return Err(e);
        }
        flushed?;

        Ok(ClinicReport {
            patients: state.tracker.expected(),
            routed: state.tracker.routed(),
            dropped: state.tracker.dropped(),
            treated: state.treated(),
            discharged,
            left_untreated,
            duty_doctors,
            specialists,
            queues: state.queue_stats(),
            stalls,
            elapsed: start.elapsed(),
        })
    }
}

type Worker<T> = (String, JoinHandle<T>);

fn log_parameters(log: &ClinicLog, config: &ClinicConfig) {
    let pools: Vec<String> = config.specialists.iter().map(ToString::to_string).collect();
    log.record(ClinicEvent::Note(format!(
        "Clinic opens: {} patient(s), {} duty doctor(s), specialists {}",
        config.patients,
        config.duty_doctors,
        pools.join(", ")
    )));
    log.record(ClinicEvent::Note(format!(
        "Triage takes {} ms, treatment takes {} ms",
        config.triage_time.as_millis(),
        config.treatment_time.as_millis()
    )));
    if let Some(path) = log.file_path() {
        log.record(ClinicEvent::Note(format!("Event log: {}", path.display())));
    }
}

fn spawn_worker<T, F>(label: String, body: F) -> Result<Worker<T>>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    match thread::Builder::new().name(label.clone()).spawn(body) {
        Ok(handle) => Ok((label, handle)),
        Err(source) => Err(TriageError::Spawn { worker: label, source }),
    }
}

fn spawn_pools(
    state: &Arc<ClinicState>,
    config: &ClinicConfig,
    specialists: &mut Vec<Worker<WorkerSummary>>,
    doctors: &mut Vec<Worker<WorkerSummary>>,
) -> Result<()> {
    for (index, pool) in config.specialists.iter().enumerate() {
        let category = CategoryId::new(index);
        for ordinal in 0..pool.size {
            let label = pool.worker_label(ordinal);
            let state = Arc::clone(state);
            let name = label.clone();
            specialists.push(spawn_worker(label, move || run_specialist(&state, category, &name))?);
        }
    }
    for ordinal in 1..=config.duty_doctors {
        let label = format!("D{ordinal}");
        let state = Arc::clone(state);
        let name = label.clone();
        doctors.push(spawn_worker(label, move || run_duty_doctor(&state, &name))?);
    }
    Ok(())
}

/// Start one generator per patient and block until every patient is on the intake
/// queue. Returns the generator handles; each yields the discharge outcome when
/// `await_discharge` is set.
fn admit_patients(state: &Arc<ClinicState>, config: &ClinicConfig) -> Vec<Worker<Option<bool>>> {
    let expected = config.patients;
    let (admitted_tx, admitted_rx) = unbounded();
    let mut generators = Vec::with_capacity(expected);

    for id in (1..=expected).filter_map(|id| PatientId::try_from(id).ok()) {
        let thread_state = Arc::clone(state);
        let tx = admitted_tx.clone();
        let wait = config.await_discharge;
        match spawn_worker(format!("P{id}"), move || admit(&thread_state, id, wait, tx)) {
            Ok(generator) => generators.push(generator),
            Err(e) => {
                warn!("{e}; admitting P{id} directly");
                admit(state, id, false, admitted_tx.clone());
            }
        }
    }
    drop(admitted_tx);

    // Each generator drops its sender right after admitting, so this ends early only
    // if a generator died before admitting its patient.
    let admitted = admitted_rx.iter().take(expected).count();
    if admitted < expected {
        let abandoned = state.abandon();
        error!("Only {admitted} of {expected} patients were admitted; abandoned {abandoned}");
    }
    generators
}

fn admit(state: &ClinicState, id: PatientId, wait: bool, admitted: Sender<PatientId>) -> Option<bool> {
    let (patient, receipt) = if wait {
        let (patient, receipt) = Patient::with_discharge(id);
        (patient, Some(receipt))
    } else {
        (Patient::new(id), None)
    };
    state.log.record(ClinicEvent::Arrived { patient: id });
    state.intake.enqueue(patient);
    state.mark_progress();
    let _ = admitted.send(id);
    drop(admitted);

    receipt.map(|receipt| {
        let treated = receipt.wait();
        let event = if treated {
            ClinicEvent::Discharged { patient: id }
        } else {
            ClinicEvent::LeftUntreated { patient: id }
        };
        state.log.record(event);
        treated
    })
}

/// Extract a panic message from a thread's panic payload.
#[must_use]
pub fn extract_panic_message(panic_info: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Join every worker, keeping the first failure in `failure`.
fn join_all<T>(workers: Vec<Worker<T>>, failure: &mut Option<TriageError>) -> Vec<T> {
    let mut results = Vec::with_capacity(workers.len());
    for (label, handle) in workers {
        match handle.join() {
            Ok(result) => results.push(result),
            Err(panic_info) => {
                let message = extract_panic_message(panic_info);
                error!("Worker '{label}' panicked: {message}");
                failure.get_or_insert(TriageError::WorkerPanicked { worker: label, message });
            }
        }
    }
    results
}
