//! Repeated randomized runs checking termination and conservation.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use crossbeam_channel::{RecvTimeoutError, bounded};
use log::info;
use triage_lib::config::ClinicConfig;
use triage_lib::event_log::{ClinicEvent, ClinicLog};
use triage_lib::logging::OperationTimer;
use triage_lib::pipeline::{Clinic, ClinicReport, JitterDelay};
use triage_lib::progress::ProgressTracker;

use crate::commands::command::Command;
use crate::commands::common::{ClinicOptions, SchedulingOptions};

/// Default patient count for stress runs.
const STRESS_PATIENTS: usize = 50;

/// Stress the pipeline with many short randomized runs.
#[derive(Debug, Parser)]
#[command(
    name = "stress",
    about = "\x1b[38;5;166m[UTILITIES]\x1b[0m      \x1b[36mRepeat randomized runs and check every one terminates\x1b[0m",
    long_about = r#"
Run the clinic many times with random processing delays and no console output.

Each run replaces the triage and treatment times with a random sleep between 0 and
--max-delay-ms, so thread interleavings differ from run to run. A run fails if it does
not finish within --timeout-secs, or if any patient is lost, duplicated, or treated
without having been referred.

Example usage:
  triage stress
  triage stress --runs 200 -n 100 -d 4 -s a:3 -s b -s c:2 --max-delay-ms 2
"#
)]
pub struct Stress {
    /// Clinic shape (default 50 patients)
    #[command(flatten)]
    pub clinic: ClinicOptions,

    /// Idle waiting
    #[command(flatten)]
    pub scheduling: SchedulingOptions,

    /// Number of runs
    #[arg(long = "runs", default_value = "1000")]
    pub runs: u64,

    /// Upper bound of the random delay at each stage, in milliseconds
    #[arg(long = "max-delay-ms", default_value = "5")]
    pub max_delay_ms: u64,

    /// Seconds a single run may take before it is considered hung
    #[arg(long = "timeout-secs", default_value = "30")]
    pub timeout_secs: u64,
}

impl Command for Stress {
    fn execute(&self, _command_line: &str) -> Result<()> {
        let defaults = ClinicConfig { patients: STRESS_PATIENTS, ..ClinicConfig::default() };
        let config = self.clinic.resolve(defaults)?.config;
        let timeout = Duration::from_secs(self.timeout_secs.max(1));
        let max_delay = Duration::from_millis(self.max_delay_ms);

        info!(
            "Stressing {} run(s) of {} patient(s), {} duty doctor(s), {} specialist(s)",
            self.runs,
            config.patients,
            config.duty_doctors,
            config.specialist_workers()
        );
        let timer = OperationTimer::new("Stress runs");
        let progress = ProgressTracker::new("Completed stress runs").with_interval(100);

        for run in 0..self.runs {
            let seed = config.seed.map(|s| s.wrapping_add(run));
            let mut run_config = config.clone();
            run_config.seed = seed;

            let log = Arc::new(ClinicLog::silent().with_capture());
            let clinic = Clinic::new(run_config)?
                .with_routing_box(self.clinic.routing.build(config.categories(), seed))
                .with_delay(JitterDelay::new(max_delay, seed))
                .with_log(Arc::clone(&log))
                .with_idle_strategy(self.scheduling.idle_strategy());

            let report = run_with_timeout(clinic, timeout)
                .with_context(|| format!("Stress run {} failed", run + 1))?;
            check_run(&report, &log).with_context(|| format!("Stress run {} failed", run + 1))?;
            progress.record(1);
        }

        progress.log_final();
        timer.log_completion(self.runs);
        Ok(())
    }
}

/// Run `clinic` on its own thread, failing if it does not finish within `timeout`.
///
/// A hung run leaves its threads behind; the process is expected to exit on the error.
fn run_with_timeout(clinic: Clinic, timeout: Duration) -> Result<ClinicReport> {
    let (tx, rx) = bounded(1);
    thread::Builder::new().name("stress-run".to_string()).spawn(move || {
        let _ = tx.send(clinic.run());
    })?;
    match rx.recv_timeout(timeout) {
        Ok(result) => Ok(result?),
        Err(RecvTimeoutError::Timeout) => {
            bail!("did not terminate within {}s (possible deadlock)", timeout.as_secs())
        }
        Err(RecvTimeoutError::Disconnected) => bail!("run thread exited without a report"),
    }
}

/// Check that every patient was admitted once, referred or dropped once, and that every
/// referred patient was treated exactly once.
fn check_run(report: &ClinicReport, log: &ClinicLog) -> Result<()> {
    if !report.is_conserved() {
        bail!(
            "counts do not add up: {} patients, {} routed, {} dropped, {} treated",
            report.patients,
            report.routed,
            report.dropped,
            report.treated
        );
    }

    let mut referred = HashSet::new();
    let mut treated = HashSet::new();
    for entry in log.entries() {
        match entry.event {
            ClinicEvent::Referred { patient, .. } => {
                if !referred.insert(patient) {
                    bail!("patient P{patient} was referred twice");
                }
            }
            ClinicEvent::TreatmentFinished { patient, .. } => {
                if !referred.contains(&patient) {
                    bail!("patient P{patient} was treated before being referred");
                }
                if !treated.insert(patient) {
                    bail!("patient P{patient} was treated twice");
                }
            }
            _ => {}
        }
    }
    if treated.len() as u64 != report.routed {
        bail!("{} patients treated but {} referred", treated.len(), report.routed);
    }
    Ok(())
}
