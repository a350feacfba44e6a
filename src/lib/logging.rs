//! Human-readable log output.
//!
//! Helpers for human-readable counts, durations and rates, an [`OperationTimer`], and
//! the end-of-run summary.

use std::time::{Duration, Instant};

use crate::metrics::{ProcessingMetrics, RunMetric};
use crate::pipeline::ClinicReport;

/// Formats a count with thousands separators.
///
/// # Examples
///
/// ```
/// use triage_lib::logging::format_count;
///
/// assert_eq!(format_count(0), "0");
/// assert_eq!(format_count(1234567), "1,234,567");
/// ```
#[must_use]
pub fn format_count(count: u64) -> String {
    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Render a fraction in `[0, 1]` as a percentage.
///
/// ```
/// use triage_lib::logging::format_percent;
///
/// assert_eq!(format_percent(0.5, 1), "50.0%");
/// assert_eq!(format_percent(1.0, 0), "100%");
/// ```
#[must_use]
pub fn format_percent(fraction: f64, places: usize) -> String {
    format!("{:.*}%", places, fraction * 100.0)
}

/// Render a run length for log output.
///
/// Runs under a minute are shown in seconds with millisecond precision; longer ones
/// are rounded down to whole minutes or hours plus the next unit.
///
/// ```
/// use std::time::Duration;
/// use triage_lib::logging::format_duration;
///
/// assert_eq!(format_duration(Duration::from_millis(2_250)), "2.250s");
/// assert_eq!(format_duration(Duration::from_secs(150)), "2m 30s");
/// assert_eq!(format_duration(Duration::from_secs(7_200)), "2h");
/// ```
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    const MINUTE: u64 = 60;
    const HOUR: u64 = 60 * MINUTE;
    let total = duration.as_secs();
    let (major, major_unit, minor, minor_unit) = match total {
        t if t < MINUTE => return format!("{:.3}s", duration.as_secs_f64()),
        t if t < HOUR => (t / MINUTE, 'm', t % MINUTE, 's'),
        t => (t / HOUR, 'h', (t % HOUR) / MINUTE, 'm'),
    };
    match minor {
        0 => format!("{major}{major_unit}"),
        _ => format!("{major}{major_unit} {minor}{minor_unit}"),
    }
}

/// Render patient throughput, switching to a per-minute rate below one per second.
///
/// ```
/// use std::time::Duration;
/// use triage_lib::logging::format_rate;
///
/// assert_eq!(format_rate(2_500, Duration::from_secs(2)), "1,250 patients/s");
/// assert_eq!(format_rate(5, Duration::from_secs(20)), "15.0 patients/min");
/// ```
#[must_use]
pub fn format_rate(patients: u64, over: Duration) -> String {
    let seconds = over.as_secs_f64().max(0.001);
    let per_second = patients as f64 / seconds;
    if per_second >= 1.0 || patients == 0 {
        format!("{} patients/s", format_count(per_second as u64))
    } else {
        format!("{:.1} patients/min", per_second * 60.0)
    }
}

/// Logs a formatted summary of a finished run.
pub fn log_run_summary(report: &ClinicReport) {
    let metric = RunMetric::from(report);
    log::info!("Clinic Summary:");
    log::info!("  Patients: {}", format_count(metric.patients));
    log::info!("  Referred: {}", format_count(metric.routed));
    if metric.dropped > 0 {
        log::info!("  Dropped: {}", format_count(metric.dropped));
    }
    log::info!("  Treated: {}", format_count(metric.treated));
    if metric.patients > 0 {
        log::info!("  Treated rate: {}", format_percent(metric.efficiency() / 100.0, 2));
    }
    if report.discharged + report.left_untreated > 0 {
        log::info!(
            "  Went home: {} treated, {} untreated",
            format_count(report.discharged),
            format_count(report.left_untreated)
        );
    }
    for worker in report.workers() {
        log::debug!("  {}: {} patient(s)", worker.label, worker.patients.len());
    }
    for queue in &report.queues {
        log::debug!(
            "  queue {}: {} in, {} out, peak {}, {} idle wakeup(s)",
            queue.name,
            queue.enqueued,
            queue.dequeued,
            queue.peak_depth,
            queue.idle_wakeups
        );
    }
    if report.stalls > 0 {
        log::warn!("  Stalls detected: {}", report.stalls);
    }
    log::info!("  Elapsed: {}", format_duration(report.elapsed));
}

/// Logs when a long operation starts and, on request, how it went.
///
/// ```no_run
/// use triage_lib::logging::OperationTimer;
///
/// let timer = OperationTimer::new("Running clinic");
/// // ... run the clinic ...
/// timer.log_completion(50);
/// ```
pub struct OperationTimer {
    label: String,
    started: Instant,
}

impl OperationTimer {
    /// Start timing `label` and log that it began.
    #[must_use]
    pub fn new(label: &str) -> Self {
        log::info!("{label} ...");
        Self { label: label.to_owned(), started: Instant::now() }
    }

    /// Time since the timer started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Log that the operation finished after handling `patients` patients.
    pub fn log_completion(&self, patients: u64) {
        let elapsed = self.elapsed();
        log::info!(
            "{} finished: {} patient(s) in {}, {}",
            self.label,
            format_count(patients),
            format_duration(elapsed),
            format_rate(patients, elapsed)
        );
    }
}
