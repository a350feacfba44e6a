//! Run configuration.
//!
//! A [`ClinicConfig`] is built once at startup (from defaults, an optional
//! [`ConfigFile`], and command-line overrides), validated, and then shared read-only by
//! every worker for the whole run.
//!
//! # Configuration file format
//!
//! Plain `key=value` lines; blank lines and lines starting with `#` are ignored.
//!
//! ```text
//! # clinic.cfg
//! n=20
//! t_d=500
//! t_s=1500
//! o=clinic_log.txt
//! duty_doctors=2
//! specialists=dentist,surgeon:2,therapist
//! seed=42
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::errors::{Result, TriageError};
use crate::validation::{validate_category_name, validate_count, validate_millis, validate_positive};

/// Default event log file.
pub const DEFAULT_LOG_FILE: &str = "clinic_log.txt";

/// Default number of patients.
pub const DEFAULT_PATIENTS: usize = 5;

/// Default number of duty doctors.
pub const DEFAULT_DUTY_DOCTORS: usize = 2;

/// Default duty doctor processing time.
pub const DEFAULT_TRIAGE_TIME: Duration = Duration::from_millis(1000);

/// Default specialist treatment time.
pub const DEFAULT_TREATMENT_TIME: Duration = Duration::from_millis(2000);

/// Default specialist categories, one worker each.
pub const DEFAULT_SPECIALISTS: [&str; 3] = ["dentist", "surgeon", "therapist"];

/// A specialist category and the number of workers serving it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialistPool {
    /// Category name (e.g. `surgeon`).
    pub name: String,
    /// Number of workers in the pool.
    pub size: usize,
}

impl SpecialistPool {
    /// Create a pool.
    #[must_use]
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        Self { name: name.into(), size }
    }

    /// Label for the `ordinal`-th (zero-based) worker of this pool.
    ///
    /// `Surgeon` for a single-worker pool, `Surgeon #2` otherwise.
    #[must_use]
    pub fn worker_label(&self, ordinal: usize) -> String {
        let mut chars = self.name.chars();
        let title: String = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        };
        if self.size > 1 { format!("{title} #{}", ordinal + 1) } else { title }
    }
}

impl FromStr for SpecialistPool {
    type Err = TriageError;

    /// Parse `name` or `name:size`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (name, size) = match s.split_once(':') {
            Some((name, size)) => {
                let size = size.trim().parse::<usize>().map_err(|_| {
                    TriageError::InvalidParameter {
                        parameter: "specialist".to_string(),
                        reason: format!("Pool size in '{s}' is not a non-negative integer"),
                    }
                })?;
                (name.trim(), size)
            }
            None => (s, 1),
        };
        validate_category_name(name)?;
        Ok(Self::new(name, size))
    }
}

impl fmt::Display for SpecialistPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.size)
    }
}

/// Parse a comma-separated list of pools, e.g. `dentist,surgeon:2`.
///
/// # Errors
///
/// Returns an error if any entry is malformed.
pub fn parse_specialist_list(s: &str) -> Result<Vec<SpecialistPool>> {
    s.split(',').filter(|part| !part.trim().is_empty()).map(SpecialistPool::from_str).collect()
}

/// Immutable parameters of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClinicConfig {
    /// Number of patients (N).
    pub patients: usize,
    /// Number of duty doctors (D).
    pub duty_doctors: usize,
    /// Specialist pools, one per category (K = `specialists.len()`).
    pub specialists: Vec<SpecialistPool>,
    /// Time a duty doctor spends on one patient.
    pub triage_time: Duration,
    /// Time a specialist spends on one patient.
    pub treatment_time: Duration,
    /// Whether each intake generator waits for its patient to be discharged.
    pub await_discharge: bool,
    /// Seed for the routing policy; `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for ClinicConfig {
    fn default() -> Self {
        Self {
            patients: DEFAULT_PATIENTS,
            duty_doctors: DEFAULT_DUTY_DOCTORS,
            specialists: DEFAULT_SPECIALISTS.iter().map(|name| SpecialistPool::new(*name, 1)).collect(),
            triage_time: DEFAULT_TRIAGE_TIME,
            treatment_time: DEFAULT_TREATMENT_TIME,
            await_discharge: false,
            seed: None,
        }
    }
}

impl ClinicConfig {
    /// Number of specialist categories (K).
    #[must_use]
    pub fn categories(&self) -> usize {
        self.specialists.len()
    }

    /// Total number of specialist workers across all pools.
    #[must_use]
    pub fn specialist_workers(&self) -> usize {
        self.specialists.iter().map(|pool| pool.size).sum()
    }

    /// Check the configuration before any worker starts.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no duty doctors, no specialist pools, an empty pool,
    /// an invalid pool name, or two pools with the same name.
    pub fn validate(&self) -> Result<()> {
        validate_positive(self.duty_doctors, "duty-doctors")?;
        if self.specialists.is_empty() {
            return Err(TriageError::InvalidParameter {
                parameter: "specialist".to_string(),
                reason: "At least one specialist category is required".to_string(),
            });
        }
        for (i, pool) in self.specialists.iter().enumerate() {
            validate_category_name(&pool.name)?;
            validate_positive(pool.size, &format!("specialist '{}' size", pool.name))?;
            if self.specialists[..i].iter().any(|other| other.name == pool.name) {
                return Err(TriageError::InvalidParameter {
                    parameter: "specialist".to_string(),
                    reason: format!("Category '{}' is configured more than once", pool.name),
                });
            }
        }
        if u32::try_from(self.patients).is_err() {
            return Err(TriageError::InvalidParameter {
                parameter: "patients".to_string(),
                reason: format!("At most {} patients are supported, got: {}", u32::MAX, self.patients),
            });
        }
        Ok(())
    }
}

/// Values read from a configuration file. Every key is optional.
///
/// Counts and durations are kept signed so that negative values reach validation
/// instead of failing to parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    /// `n`
    pub patients: Option<i64>,
    /// `t_d`, milliseconds
    pub triage_ms: Option<i64>,
    /// `t_s`, milliseconds
    pub treatment_ms: Option<i64>,
    /// `o`
    pub output: Option<PathBuf>,
    /// `duty_doctors`
    pub duty_doctors: Option<i64>,
    /// `specialists`
    pub specialists: Option<Vec<SpecialistPool>>,
    /// `seed`
    pub seed: Option<u64>,
}

impl ConfigFile {
    /// Read and parse a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or contains an invalid line.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|source| TriageError::ConfigFile { path: path.to_path_buf(), source })?;
        Self::parse(&text, path)
    }

    /// Parse configuration text; `origin` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns an error naming the offending line for unknown keys, lines without `=`,
    /// and values that do not parse.
    pub fn parse(text: &str, origin: &Path) -> Result<Self> {
        let mut config = Self::default();
        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let invalid = |reason: String| TriageError::InvalidConfigLine {
                path: origin.to_path_buf(),
                line: index + 1,
                reason,
            };
            let Some((key, value)) = line.split_once('=') else {
                return Err(invalid(format!("expected key=value, got '{line}'")));
            };
            let (key, value) = (key.trim(), value.trim());
            let int = |value: &str| {
                value.parse::<i64>().map_err(|_| invalid(format!("'{key}' must be an integer, got '{value}'")))
            };
            match key {
                "n" => config.patients = Some(int(value)?),
                "t_d" => config.triage_ms = Some(int(value)?),
                "t_s" => config.treatment_ms = Some(int(value)?),
                "duty_doctors" => config.duty_doctors = Some(int(value)?),
                "o" | "output" => {
                    if value.is_empty() {
                        return Err(invalid("'o' must not be empty".to_string()));
                    }
                    config.output = Some(PathBuf::from(value));
                }
                "specialists" => {
                    let pools = parse_specialist_list(value).map_err(|e| invalid(e.to_string()))?;
                    config.specialists = Some(pools);
                }
                "seed" => {
                    let seed = value
                        .parse::<u64>()
                        .map_err(|_| invalid(format!("'seed' must be a non-negative integer, got '{value}'")))?;
                    config.seed = Some(seed);
                }
                other => return Err(invalid(format!("unknown key '{other}'"))),
            }
        }
        Ok(config)
    }

    /// Apply the file's values on top of `base`.
    ///
    /// # Errors
    ///
    /// Returns an error for negative counts or durations.
    pub fn apply_to(&self, base: &mut ClinicConfig) -> Result<()> {
        if let Some(n) = self.patients {
            base.patients = validate_count(n, "n")?;
        }
        if let Some(ms) = self.triage_ms {
            base.triage_time = validate_millis(ms, "t_d")?;
        }
        if let Some(ms) = self.treatment_ms {
            base.treatment_time = validate_millis(ms, "t_s")?;
        }
        if let Some(d) = self.duty_doctors {
            base.duty_doctors = validate_count(d, "duty_doctors")?;
        }
        if let Some(pools) = &self.specialists {
            base.specialists.clone_from(pools);
        }
        if let Some(seed) = self.seed {
            base.seed = Some(seed);
        }
        Ok(())
    }
}
