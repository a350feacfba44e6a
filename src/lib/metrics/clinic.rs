//! Metric rows derived from a [`ClinicReport`].

use serde::{Deserialize, Serialize};

use super::{Metric, ProcessingMetrics};
use crate::pipeline::{ClinicReport, QueueStats, WorkerSummary};

/// Whole-run counts. One row per run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetric {
    /// Patients created.
    pub patients: u64,
    /// Patients placed on a specialist queue.
    pub routed: u64,
    /// Patients dropped at the duty stage.
    pub dropped: u64,
    /// Treatments finished.
    pub treated: u64,
    /// Waiting patients that went home treated.
    pub discharged: u64,
    /// Watchdog stall warnings.
    pub stalls: u64,
    /// Wall-clock duration in milliseconds.
    pub elapsed_ms: u64,
}

impl Metric for RunMetric {
    fn metric_name() -> &'static str {
        "run"
    }
}

impl ProcessingMetrics for RunMetric {
    fn total_input(&self) -> u64 {
        self.patients
    }

    fn total_output(&self) -> u64 {
        self.treated
    }

    fn total_filtered(&self) -> u64 {
        self.dropped
    }
}

impl From<&ClinicReport> for RunMetric {
    fn from(report: &ClinicReport) -> Self {
        Self {
            patients: report.patients,
            routed: report.routed,
            dropped: report.dropped,
            treated: report.treated,
            discharged: report.discharged,
            stalls: report.stalls,
            elapsed_ms: u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// What one worker did. One row per worker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerMetric {
    /// Worker label.
    pub worker: String,
    /// `triage` or `treatment`.
    pub stage: String,
    /// Specialist category name, empty for duty doctors.
    pub category: String,
    /// Number of patients processed.
    pub patients: u64,
    /// Patient ids in processing order, comma separated.
    pub patient_ids: String,
}

impl Metric for WorkerMetric {
    fn metric_name() -> &'static str {
        "worker"
    }
}

impl WorkerMetric {
    /// Build a row, resolving the category index against `categories`.
    #[must_use]
    pub fn from_summary(summary: &WorkerSummary, categories: &[String]) -> Self {
        let category = summary
            .category
            .and_then(|c| categories.get(c.index()).cloned())
            .unwrap_or_default();
        let ids: Vec<String> = summary.patients.iter().map(ToString::to_string).collect();
        Self {
            worker: summary.label.clone(),
            stage: summary.stage.to_string(),
            category,
            patients: summary.patients.len() as u64,
            patient_ids: ids.join(","),
        }
    }

    /// One row per worker in `report`.
    #[must_use]
    pub fn from_report(report: &ClinicReport, categories: &[String]) -> Vec<Self> {
        report.workers().map(|summary| Self::from_summary(summary, categories)).collect()
    }
}

/// Counters for one queue. One row per queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMetric {
    /// Queue name.
    pub queue: String,
    /// Items enqueued.
    pub enqueued: u64,
    /// Items dequeued.
    pub dequeued: u64,
    /// Largest depth observed.
    pub peak_depth: u64,
    /// Wakeups of idle consumers.
    pub idle_wakeups: u64,
}

impl Metric for QueueMetric {
    fn metric_name() -> &'static str {
        "queue"
    }
}

impl From<&QueueStats> for QueueMetric {
    fn from(stats: &QueueStats) -> Self {
        Self {
            queue: stats.name.clone(),
            enqueued: stats.enqueued,
            dequeued: stats.dequeued,
            peak_depth: stats.peak_depth,
            idle_wakeups: stats.idle_wakeups,
        }
    }
}
