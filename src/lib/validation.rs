//! Checks shared by the command line and the configuration file loader.
//!
//! Raw values arrive signed (both the CLI and the configuration file accept `-n -3`)
//! so that a negative count is reported as a configuration error instead of being
//! rejected by the argument parser with a less useful message.

use crate::errors::{Result, TriageError};
use std::fmt::Display;
use std::path::Path;
use std::time::Duration;

/// Fail with an [`TriageError::InvalidParameter`] naming `description` if `path` is missing.
///
/// # Example
/// ```
/// use triage_lib::validation::validate_file_exists;
///
/// let result = validate_file_exists("/nonexistent/clinic.cfg", "Configuration file");
/// assert!(result.is_err());
/// ```
pub fn validate_file_exists<P: AsRef<Path>>(path: P, description: &str) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(TriageError::InvalidParameter {
            parameter: description.to_string(),
            reason: format!("File does not exist: {}", path.display()),
        });
    }
    Ok(())
}

/// Reject zero (and, for signed types, negative) pool sizes and worker counts.
///
/// # Example
/// ```
/// use triage_lib::validation::validate_positive;
///
/// validate_positive(2, "duty-doctors").unwrap();
///
/// let result = validate_positive(0, "duty-doctors");
/// assert!(result.is_err());
/// ```
#[allow(clippy::needless_pass_by_value)]
pub fn validate_positive<T: Ord + Display + Default>(value: T, name: &str) -> Result<()> {
    if value <= T::default() {
        return Err(TriageError::InvalidParameter {
            parameter: name.to_string(),
            reason: format!("Must be positive (> 0), got: {value}"),
        });
    }
    Ok(())
}

/// Convert a signed count into a `usize`, rejecting negative values.
///
/// # Errors
/// Returns an error if `value` is negative
///
/// # Example
/// ```
/// use triage_lib::validation::validate_count;
///
/// assert_eq!(validate_count(0, "patients").unwrap(), 0);
/// assert_eq!(validate_count(50, "patients").unwrap(), 50);
/// assert!(validate_count(-1, "patients").is_err());
/// ```
pub fn validate_count(value: i64, name: &str) -> Result<usize> {
    usize::try_from(value).map_err(|_| TriageError::InvalidParameter {
        parameter: name.to_string(),
        reason: format!("Must be >= 0, got: {value}"),
    })
}

/// Convert a signed number of milliseconds into a [`Duration`], rejecting negative values.
///
/// # Errors
/// Returns an error if `millis` is negative
///
/// # Example
/// ```
/// use std::time::Duration;
/// use triage_lib::validation::validate_millis;
///
/// assert_eq!(validate_millis(1000, "triage-ms").unwrap(), Duration::from_secs(1));
/// assert!(validate_millis(-5, "triage-ms").is_err());
/// ```
pub fn validate_millis(millis: i64, name: &str) -> Result<Duration> {
    let millis = u64::try_from(millis).map_err(|_| TriageError::InvalidParameter {
        parameter: name.to_string(),
        reason: format!("Duration must be >= 0 ms, got: {millis}"),
    })?;
    Ok(Duration::from_millis(millis))
}

/// Validate a specialist category name.
///
/// Names are used in log lines and metric files, so they must be non-empty and
/// must not contain whitespace, commas or colons (the separators of the pool syntax).
///
/// # Errors
/// Returns an error if the name is empty or contains a reserved character
pub fn validate_category_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(TriageError::InvalidParameter {
            parameter: "specialist".to_string(),
            reason: "Category name must not be empty".to_string(),
        });
    }
    if let Some(c) = name.chars().find(|c| c.is_whitespace() || *c == ',' || *c == ':') {
        return Err(TriageError::InvalidParameter {
            parameter: "specialist".to_string(),
            reason: format!("Category name '{name}' contains reserved character {c:?}"),
        });
    }
    Ok(())
}
