//! Command-line interface for quezic.
//!
//! This module provides commands for resolving, searching, importing,
//! downloading and recommending tracks without a UI.

mod commands;

pub use commands::{Cli, Commands, run_command};
