//! runpause - interactive breakpoints for scripted test runs
//!
//! Replays a run scenario and lets an operator pause it on run events,
//! inspect variables and the last network exchange, and resume or abort.

use clap::Parser;
use commands::Commands;
use runpause::common::{config::Config, logging};
use runpause::{cli, commands};

#[derive(Parser)]
#[command(name = "runpause", about = "Interactive breakpoints for scripted test runs")]
#[command(version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let verbose = matches!(cli.command, Commands::Run { verbose: true, .. });
    if verbose {
        if let Some(path) = logging::init_verbose() {
            eprintln!("Logging to {}", path.display());
        }
    } else {
        logging::init_cli();
    }

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring unreadable configuration, using defaults");
            Config::default()
        }
    };
    if !config.display.color {
        colored::control::set_override(false);
    }

    if let Err(e) = cli::dispatch(cli.command, &config).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
