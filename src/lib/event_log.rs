//! Timestamped clinic event log.
//!
//! [`ClinicLog`] is the thread-safe sink every worker writes its [`ClinicEvent`]s to. Each
//! event is stamped with the time elapsed since the log was created and rendered as
//! `[mm:ss:mmm] <message>`. A single call to [`ClinicLog::record`] is atomic: the
//! timestamp is taken and the line written under one lock, so lines never interleave and
//! timestamps never go backwards within a sink.
//!
//! Sinks:
//! - console, forwarded to the `log` facade at `info` level;
//! - an optional file (`-o`);
//! - an optional in-memory capture, used by tests and the stress command.

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::{info, warn};
use parking_lot::Mutex;

use crate::errors::{Result, TriageError};
use crate::pipeline::PatientId;

/// Log target used for console echo of clinic events.
pub const EVENT_TARGET: &str = "triage::clinic";

/// Something that happened in the clinic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClinicEvent {
    /// A patient was placed on the duty queue.
    Arrived { patient: PatientId },
    /// A duty doctor took a patient off the duty queue.
    Admitted { doctor: String, patient: PatientId },
    /// A duty doctor placed a patient on a specialist queue.
    Referred { doctor: String, patient: PatientId, category: String },
    /// A duty doctor could not route a patient.
    Dropped { doctor: String, patient: PatientId, reason: String },
    /// A specialist started treating a patient.
    TreatmentStarted { specialist: String, patient: PatientId },
    /// A specialist finished treating a patient.
    TreatmentFinished { specialist: String, patient: PatientId },
    /// A waiting patient was told their treatment is done.
    Discharged { patient: PatientId },
    /// A waiting patient learned they will not be treated.
    LeftUntreated { patient: PatientId },
    /// A worker observed its stop condition and terminated.
    ShiftEnded { worker: String },
    /// Every patient has left the duty stage.
    AllPatientsRouted,
    /// Every worker pool has terminated.
    AllPatientsTreated,
    /// The run is over.
    DayOver,
    /// Free-form text.
    Note(String),
}

impl fmt::Display for ClinicEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arrived { patient } => write!(f, "Patient P{patient} joined the duty queue"),
            Self::Admitted { doctor, patient } => {
                write!(f, "Duty doctor {doctor} admitted patient P{patient}")
            }
            Self::Referred { doctor, patient, category } => {
                write!(f, "Duty doctor {doctor} referred patient P{patient} to the {category}")
            }
            Self::Dropped { doctor, patient, reason } => {
                write!(f, "Duty doctor {doctor} could not refer patient P{patient}: {reason}")
            }
            Self::TreatmentStarted { specialist, patient } => {
                write!(f, "{specialist} started treating patient P{patient}")
            }
            Self::TreatmentFinished { specialist, patient } => {
                write!(f, "{specialist} finished treating patient P{patient}")
            }
            Self::Discharged { patient } => write!(f, "Patient P{patient} went home"),
            Self::LeftUntreated { patient } => {
                write!(f, "Patient P{patient} left without being treated")
            }
            Self::ShiftEnded { worker } => write!(f, "{worker} ended shift"),
            Self::AllPatientsRouted => f.write_str("All patients have been referred"),
            Self::AllPatientsTreated => f.write_str("All patients have been treated"),
            Self::DayOver => f.write_str("The clinic day is over"),
            Self::Note(text) => f.write_str(text),
        }
    }
}

/// A recorded event and when it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Time since the log was created.
    pub elapsed: Duration,
    /// The event.
    pub event: ClinicEvent,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", format_timestamp(self.elapsed), self.event)
    }
}

/// Format an elapsed time as `[mm:ss:mmm]`.
///
/// Minutes are not wrapped at 60.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use triage_lib::event_log::format_timestamp;
///
/// assert_eq!(format_timestamp(Duration::from_millis(0)), "[00:00:000]");
/// assert_eq!(format_timestamp(Duration::from_millis(61_042)), "[01:01:042]");
/// ```
#[must_use]
pub fn format_timestamp(elapsed: Duration) -> String {
    let millis = elapsed.as_millis();
    let minutes = millis / 60_000;
    let seconds = (millis / 1000) % 60;
    let millis = millis % 1000;
    format!("[{minutes:02}:{seconds:02}:{millis:03}]")
}

struct FileSink {
    path: PathBuf,
    writer: BufWriter<File>,
    failed: bool,
}

#[derive(Default)]
struct Sinks {
    file: Option<FileSink>,
    captured: Option<Vec<LogEntry>>,
}

/// Thread-safe timestamped event sink.
pub struct ClinicLog {
    start: Instant,
    echo: bool,
    sinks: Mutex<Sinks>,
}

impl ClinicLog {
    /// A log that echoes every event to the console.
    #[must_use]
    pub fn console() -> Self {
        Self { start: Instant::now(), echo: true, sinks: Mutex::new(Sinks::default()) }
    }

    /// A log with no console output. Sinks can still be added.
    #[must_use]
    pub fn silent() -> Self {
        Self { start: Instant::now(), echo: false, sinks: Mutex::new(Sinks::default()) }
    }

    /// Also append every event to `path`, truncating any existing file.
    ///
    /// # Errors
    ///
    /// Returns [`TriageError::LogFile`] if the file cannot be created.
    pub fn with_file<P: AsRef<Path>>(self, path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)
            .map_err(|source| TriageError::LogFile { path: path.clone(), source })?;
        self.sinks.lock().file = Some(FileSink { path, writer: BufWriter::new(file), failed: false });
        Ok(self)
    }

    /// Also keep every event in memory; see [`ClinicLog::entries`].
    #[must_use]
    pub fn with_capture(self) -> Self {
        self.sinks.lock().captured = Some(Vec::new());
        self
    }

    /// Record an event.
    pub fn record(&self, event: ClinicEvent) {
        let mut sinks = self.sinks.lock();
        let entry = LogEntry { elapsed: self.start.elapsed(), event };

        if self.echo {
            info!(target: EVENT_TARGET, "{entry}");
        }
        if let Some(sink) = sinks.file.as_mut() {
            if !sink.failed {
                if let Err(e) = writeln!(sink.writer, "{entry}") {
                    // Report once; the run itself does not depend on the file.
                    sink.failed = true;
                    warn!("Failed to write event log '{}': {e}", sink.path.display());
                }
            }
        }
        if let Some(captured) = sinks.captured.as_mut() {
            captured.push(entry);
        }
    }

    /// Everything recorded so far, oldest first. Empty unless capture was enabled.
    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        self.sinks.lock().captured.clone().unwrap_or_default()
    }

    /// Number of captured events matching `predicate`.
    pub fn count<F>(&self, predicate: F) -> usize
    where
        F: Fn(&ClinicEvent) -> bool,
    {
        self.sinks.lock().captured.as_ref().map_or(0, |entries| {
            entries.iter().filter(|entry| predicate(&entry.event)).count()
        })
    }

    /// Path of the file sink, if any.
    #[must_use]
    pub fn file_path(&self) -> Option<PathBuf> {
        self.sinks.lock().file.as_ref().map(|sink| sink.path.clone())
    }

    /// Flush the file sink, if any.
    ///
    /// # Errors
    ///
    /// Returns [`TriageError::LogFile`] if buffered lines cannot be written.
    pub fn flush(&self) -> Result<()> {
        let mut sinks = self.sinks.lock();
        if let Some(sink) = sinks.file.as_mut() {
            sink.writer
                .flush()
                .map_err(|source| TriageError::LogFile { path: sink.path.clone(), source })?;
        }
        Ok(())
    }
}

impl Default for ClinicLog {
    fn default() -> Self {
        Self::console()
    }
}

impl fmt::Debug for ClinicLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sinks = self.sinks.lock();
        f.debug_struct("ClinicLog")
            .field("echo", &self.echo)
            .field("file", &sinks.file.as_ref().map(|sink| sink.path.clone()))
            .field("capture", &sinks.captured.is_some())
            .finish_non_exhaustive()
    }
}
