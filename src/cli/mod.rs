// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Command-line entry point for the `detect` binary.
//!
//! This module contains argument parsing, stderr diagnostics and the process
//! boundary that turns an invocation into one stdout line and an exit code.

// Modules
/// CLI arguments.
pub mod args;

/// Diagnostic output macros.
pub mod logging;

/// Process boundary.
pub mod run;

pub use run::{run, run_from};
