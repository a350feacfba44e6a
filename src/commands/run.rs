//! Run one clinic day.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use triage_lib::config::{ClinicConfig, DEFAULT_LOG_FILE};
use triage_lib::event_log::ClinicLog;
use triage_lib::logging::{OperationTimer, log_run_summary};
use triage_lib::metrics::writer::write_metrics_auto;
use triage_lib::metrics::{QueueMetric, RunMetric, WorkerMetric};
use triage_lib::pipeline::Clinic;

use crate::commands::command::Command;
use crate::commands::common::{ClinicOptions, SchedulingOptions};

/// Run the clinic simulation once.
#[derive(Debug, Parser)]
#[command(
    name = "run",
    about = "\x1b[38;5;72m[SIMULATION]\x1b[0m     \x1b[36mRun one clinic day\x1b[0m",
    long_about = r#"
Run one clinic day.

N patients arrive at once and queue for the duty doctors. Each duty doctor admits a
patient, spends the triage time on them, and refers them to one specialist category.
Each specialist treats the patients referred to its category in arrival order. The day
ends when every patient has been referred and every specialist queue is empty.

Every event is written with a [mm:ss:mmm] timestamp to the console and to the event
log file.

Settings are taken from the command line, then the configuration file (-f), then the
built-in defaults. The configuration file holds key=value lines:

  n=5
  t_d=1000
  t_s=2000
  o=clinic_log.txt
  duty_doctors=2
  specialists=dentist,surgeon:2,therapist
  seed=42

Example usage:
  triage run -n 10
  triage run -n 20 --triage-ms 100 --treatment-ms 300 -s dentist -s surgeon:2
  triage run -f clinic.cfg --await-discharge --worker-metrics workers.tsv
"#
)]
pub struct Run {
    /// Clinic shape and timing
    #[command(flatten)]
    pub clinic: ClinicOptions,

    /// Idle waiting and stall detection
    #[command(flatten)]
    pub scheduling: SchedulingOptions,

    /// Event log file [default: clinic_log.txt]
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Keep each patient waiting until their treatment is finished
    #[arg(long = "await-discharge", default_value = "false")]
    pub await_discharge: bool,

    /// Optional TSV file with one row per worker
    #[arg(long = "worker-metrics")]
    pub worker_metrics: Option<PathBuf>,

    /// Optional TSV file with one row per queue
    #[arg(long = "queue-metrics")]
    pub queue_metrics: Option<PathBuf>,

    /// Optional TSV file with the run totals
    #[arg(long = "run-metrics")]
    pub run_metrics: Option<PathBuf>,
}

impl Command for Run {
    fn execute(&self, _command_line: &str) -> Result<()> {
        let resolved = self.clinic.resolve(ClinicConfig::default())?;
        let mut config = resolved.config;
        config.await_discharge = self.await_discharge;

        let output = self
            .output
            .clone()
            .or(resolved.output)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));
        let log = ClinicLog::console().with_file(&output)?;
        info!("Event log: {}", output.display());
        if let Some(seed) = config.seed {
            info!("Random seed: {seed}");
        }

        let routing = self.clinic.routing_policy(&config);
        let categories: Vec<String> = config.specialists.iter().map(|p| p.name.clone()).collect();
        let clinic = Clinic::new(config)?
            .with_routing_box(routing)
            .with_log(Arc::new(log))
            .with_idle_strategy(self.scheduling.idle_strategy())
            .with_watchdog(self.scheduling.watchdog());

        let timer = OperationTimer::new("Running clinic");
        let report = clinic.run().context("Clinic run failed")?;
        timer.log_completion(report.treated);
        log_run_summary(&report);

        if let Some(path) = &self.worker_metrics {
            write_metrics_auto(path, &WorkerMetric::from_report(&report, &categories))?;
            info!("Wrote worker metrics to {}", path.display());
        }
        if let Some(path) = &self.queue_metrics {
            let rows: Vec<QueueMetric> = report.queues.iter().map(QueueMetric::from).collect();
            write_metrics_auto(path, &rows)?;
            info!("Wrote queue metrics to {}", path.display());
        }
        if let Some(path) = &self.run_metrics {
            write_metrics_auto(path, &[RunMetric::from(&report)])?;
            info!("Wrote run metrics to {}", path.display());
        }
        Ok(())
    }
}
