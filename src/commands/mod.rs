//! CLI command implementations for triage.
//!
//! - [`run`] - Run one clinic day and write the event log
//! - [`stress`] - Repeat randomized runs and check termination and conservation

#![allow(
    clippy::cast_possible_truncation,
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::uninlined_format_args
)]

pub mod command;
pub mod common;
pub mod run;
pub mod stress;
