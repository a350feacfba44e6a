//! Metrics collection and reporting for clinic runs.
//!
//! - [`clinic`] - Per-run, per-worker and per-queue metric rows
//! - [`writer`] - Metrics file I/O utilities
//!
//! # Traits
//!
//! - [`Metric`] - Core trait for serializable metrics
//! - [`ProcessingMetrics`] - Common interface for input/output metrics

pub mod clinic;
pub mod writer;

use serde::{Deserialize, Serialize};

pub use clinic::{QueueMetric, RunMetric, WorkerMetric};
pub use writer::{write_metrics, write_metrics_auto};

/// A metric type that can be serialized to TSV files.
pub trait Metric: Serialize + for<'de> Deserialize<'de> + Clone + Default {
    /// Human-readable name for this metric type.
    ///
    /// Used in error messages and logging when writing metrics files.
    fn metric_name() -> &'static str;
}

/// Common interface for metrics that track processing counts.
pub trait ProcessingMetrics {
    /// Total number of items that entered processing.
    fn total_input(&self) -> u64;

    /// Total number of items that completed processing.
    fn total_output(&self) -> u64;

    /// Total number of items dropped along the way.
    fn total_filtered(&self) -> u64;

    /// Processing efficiency as a percentage (output / input * 100).
    fn efficiency(&self) -> f64 {
        if self.total_input() == 0 {
            0.0
        } else {
            self.total_output() as f64 / self.total_input() as f64 * 100.0
        }
    }
}
