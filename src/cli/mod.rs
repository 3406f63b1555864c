//! Command-line interface for comprende.
//!
//! Provides the `run` command for the full pipeline and the `groups` command
//! for offline study group formation from saved scores.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands, GroupsArgs, RunArgs};
