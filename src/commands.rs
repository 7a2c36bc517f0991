//! CLI command definitions
//!
//! Defines the clap commands for the runpause CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Replay a run scenario with interactive breakpoints
    Run {
        /// Path to the YAML scenario file
        scenario: PathBuf,

        /// Do not break when the run starts
        #[arg(long)]
        continue_on_start: bool,

        /// Leave Ctrl+C alone instead of using it to break the run
        #[arg(long)]
        no_interrupt: bool,

        /// Log state transitions to a file as well as stderr
        #[arg(long, short)]
        verbose: bool,
    },

    /// List the breakpoint actions in menu order
    Actions {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
