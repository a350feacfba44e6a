//! Loading configuration files and running clinics from them.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;
use triage_lib::TriageError;
use triage_lib::config::{ClinicConfig, ConfigFile, SpecialistPool};

use crate::helpers::{assert_all_treated_once, quiet_clinic};

fn write_config(dir: &TempDir, text: &str) -> PathBuf {
    let path = dir.path().join("clinic.conf");
    fs::write(&path, text).unwrap();
    path
}

#[test]
fn test_full_file_overrides_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        "# morning shift\n\
         n = 12\n\
         t_d=0\n\
         t_s = 0\n\
         \n\
         duty_doctors = 3\n\
         specialists = dentist:2, surgeon\n\
         o = morning.txt\n\
         seed = 42\n",
    );

    let file = ConfigFile::load(&path).unwrap();
    assert_eq!(file.output, Some(PathBuf::from("morning.txt")));

    let mut config = ClinicConfig::default();
    file.apply_to(&mut config).unwrap();
    assert_eq!(config.patients, 12);
    assert_eq!(config.duty_doctors, 3);
    assert_eq!(config.triage_time, Duration::ZERO);
    assert_eq!(config.treatment_time, Duration::ZERO);
    assert_eq!(config.specialists, vec![SpecialistPool::new("dentist", 2), SpecialistPool::new("surgeon", 1)]);
    assert_eq!(config.seed, Some(42));

    let (clinic, log) = quiet_clinic(config);
    let report = clinic.run().unwrap();
    assert_all_treated_once(&report, &log, 12);
    assert_eq!(report.specialists.len(), 3);
}

#[test]
fn test_partial_file_keeps_other_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "n=9\n");

    let mut config = ClinicConfig::default();
    ConfigFile::load(&path).unwrap().apply_to(&mut config).unwrap();
    assert_eq!(config.patients, 9);
    assert_eq!(config.duty_doctors, ClinicConfig::default().duty_doctors);
    assert_eq!(config.specialists, ClinicConfig::default().specialists);
}

#[test]
fn test_errors_name_the_offending_line() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "n = 3\n# comment\nwards = 4\n");

    match ConfigFile::load(&path).unwrap_err() {
        TriageError::InvalidConfigLine { line, reason, .. } => {
            assert_eq!(line, 3);
            assert!(reason.contains("wards"), "{reason}");
        }
        other => panic!("expected a line error, got {other:?}"),
    }
}

#[test]
fn test_negative_values_fail_when_applied() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "t_s = -5\n");

    let file = ConfigFile::load(&path).unwrap();
    let error = file.apply_to(&mut ClinicConfig::default()).unwrap_err();
    assert!(matches!(error, TriageError::InvalidParameter { .. }), "{error:?}");
    assert!(error.to_string().contains("t_s"), "{error}");
}

#[test]
fn test_missing_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let error = ConfigFile::load(dir.path().join("absent.conf")).unwrap_err();
    assert!(matches!(error, TriageError::ConfigFile { .. }), "{error:?}");
}
