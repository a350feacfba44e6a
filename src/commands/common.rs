//! Common CLI options shared across commands.
//!
//! This module provides shared argument structures that can be composed into
//! command structs using `#[command(flatten)]`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Args;

use triage_lib::config::{ClinicConfig, ConfigFile, SpecialistPool};
use triage_lib::pipeline::{IdleStrategy, RoutingPolicy, RoutingStrategy, WatchdogConfig};
use triage_lib::validation::{validate_count, validate_file_exists, validate_millis};

/// Clinic shape and timing. Any value given here overrides the configuration file,
/// which overrides the built-in defaults.
#[derive(Debug, Clone, Default, Args)]
pub struct ClinicOptions {
    /// Configuration file with key=value lines (n, t_d, t_s, o, duty_doctors, specialists, seed)
    #[arg(short = 'f', long = "config")]
    pub config: Option<PathBuf>,

    /// Number of patients
    #[arg(short = 'n', long = "patients", allow_negative_numbers = true)]
    pub patients: Option<i64>,

    /// Number of duty doctors [default: 2]
    #[arg(short = 'd', long = "duty-doctors", allow_negative_numbers = true)]
    pub duty_doctors: Option<i64>,

    /// Specialist pool as NAME or NAME:SIZE; repeat for each category
    /// [default: dentist, surgeon, therapist]
    #[arg(short = 's', long = "specialist", value_name = "NAME[:SIZE]")]
    pub specialists: Vec<SpecialistPool>,

    /// Milliseconds a duty doctor spends on each patient [default: 1000]
    #[arg(long = "triage-ms", visible_alias = "t-d", allow_negative_numbers = true)]
    pub triage_ms: Option<i64>,

    /// Milliseconds a specialist spends on each patient [default: 2000]
    #[arg(long = "treatment-ms", visible_alias = "t-s", allow_negative_numbers = true)]
    pub treatment_ms: Option<i64>,

    /// Random seed for routing
    #[arg(long = "seed")]
    pub seed: Option<u64>,

    /// How duty doctors choose a specialist category
    #[arg(long = "routing", value_enum, default_value_t = RoutingStrategy::Uniform)]
    pub routing: RoutingStrategy,
}

/// A fully resolved clinic configuration.
#[derive(Debug, Clone)]
pub struct ResolvedClinic {
    /// Validated run configuration.
    pub config: ClinicConfig,
    /// Event log path from the configuration file, if it named one.
    pub output: Option<PathBuf>,
}

impl ClinicOptions {
    /// Layer the configuration file and command-line values on top of `defaults`, then
    /// validate the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be read or any value is invalid.
    pub fn resolve(&self, defaults: ClinicConfig) -> Result<ResolvedClinic> {
        let mut config = defaults;
        let mut output = None;

        if let Some(path) = &self.config {
            validate_file_exists(path, "Configuration file")?;
            let file = ConfigFile::load(path)?;
            file.apply_to(&mut config)?;
            output = file.output;
        }

        if let Some(n) = self.patients {
            config.patients = validate_count(n, "patients")?;
        }
        if let Some(d) = self.duty_doctors {
            config.duty_doctors = validate_count(d, "duty-doctors")?;
        }
        if !self.specialists.is_empty() {
            config.specialists.clone_from(&self.specialists);
        }
        if let Some(ms) = self.triage_ms {
            config.triage_time = validate_millis(ms, "triage-ms")?;
        }
        if let Some(ms) = self.treatment_ms {
            config.treatment_time = validate_millis(ms, "treatment-ms")?;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }

        config.validate()?;
        Ok(ResolvedClinic { config, output })
    }

    /// Build the routing policy for a resolved configuration.
    #[must_use]
    pub fn routing_policy(&self, config: &ClinicConfig) -> Box<dyn RoutingPolicy> {
        self.routing.build(config.categories(), config.seed)
    }
}

/// How idle workers wait and whether stalls are reported.
#[derive(Debug, Clone, Args)]
pub struct SchedulingOptions {
    /// Poll idle queues every N milliseconds instead of blocking on a condition variable
    #[arg(long = "idle-poll-ms")]
    pub idle_poll_ms: Option<u64>,

    /// Warn when the pipeline makes no progress for this many seconds (0 = disabled)
    #[arg(long = "stall-timeout-secs", default_value = "10")]
    pub stall_timeout_secs: u64,
}

impl Default for SchedulingOptions {
    fn default() -> Self {
        Self { idle_poll_ms: None, stall_timeout_secs: 10 }
    }
}

impl SchedulingOptions {
    /// The idle strategy selected on the command line.
    #[must_use]
    pub fn idle_strategy(&self) -> IdleStrategy {
        match self.idle_poll_ms {
            Some(ms) => IdleStrategy::Poll(Duration::from_millis(ms.max(1))),
            None => IdleStrategy::Block,
        }
    }

    /// The watchdog configuration selected on the command line.
    #[must_use]
    pub fn watchdog(&self) -> WatchdogConfig {
        if self.stall_timeout_secs == 0 {
            WatchdogConfig::disabled()
        } else {
            WatchdogConfig::with_timeout(Duration::from_secs(self.stall_timeout_secs))
        }
    }
}
