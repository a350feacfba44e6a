//! Custom error types for triage operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for triage operations
pub type Result<T> = std::result::Result<T, TriageError>;

/// Error type for triage operations
#[derive(Error, Debug)]
pub enum TriageError {
    /// Invalid parameter value provided
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// The parameter name
        parameter: String,
        /// Explanation of why it's invalid
        reason: String,
    },

    /// A line of a configuration file could not be understood
    #[error("Invalid configuration file '{}' at line {line}: {reason}", path.display())]
    InvalidConfigLine {
        /// Path to the configuration file
        path: PathBuf,
        /// 1-based line number
        line: usize,
        /// Explanation of the problem
        reason: String,
    },

    /// The configuration file could not be read
    #[error("Failed to read configuration file '{}'", path.display())]
    ConfigFile {
        /// Path to the configuration file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The event log file could not be created or written
    #[error("Failed to open event log '{}'", path.display())]
    LogFile {
        /// Path to the log file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The routing policy could not produce a category
    #[error("Routing policy failed: {reason}")]
    RoutingFailed {
        /// Explanation reported by the policy
        reason: String,
    },

    /// The routing policy produced a category with no specialist pool
    #[error("Routing policy chose category {category} but only {categories} categories exist")]
    CategoryOutOfRange {
        /// Zero-based category index returned by the policy
        category: usize,
        /// Number of configured specialist categories
        categories: usize,
    },

    /// A worker thread could not be started
    #[error("Failed to start worker '{worker}'")]
    Spawn {
        /// Label of the worker that failed to start
        worker: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// A worker thread panicked
    #[error("Worker '{worker}' panicked: {message}")]
    WorkerPanicked {
        /// Label of the worker
        worker: String,
        /// Panic payload rendered as text
        message: String,
    },
}
