//! CLI command handling
//!
//! Dispatches CLI commands and formats their output.

use std::path::Path;
use std::time::Duration;

use colored::Colorize;

use crate::commands::Commands;
use crate::common::config::Config;
use crate::common::Result;
use crate::events::EventBus;
use crate::orchestrator::{BreakOrchestrator, OrchestratorOptions, ScriptedMenu, TerminalMenu};
use crate::replay::{RunSummary, Scenario, Session};
use crate::reporter::{Reporter, ReporterOptions};

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Run {
            scenario,
            continue_on_start,
            no_interrupt,
            verbose: _,
        } => {
            let options = ReporterOptions {
                continue_on_start: continue_on_start || config.defaults.continue_on_start,
                signal: !no_interrupt && config.defaults.hijack_interrupt,
            };
            run_scenario(&scenario, options, config).await
        }

        Commands::Actions { json } => {
            let orchestrator = BreakOrchestrator::new(ScriptedMenu::new(Vec::new()));
            let reporter = Reporter::install(EventBus::new(), orchestrator, ReporterOptions::default());
            let actions = reporter.orchestrator().actions();

            if json {
                println!("{}", serde_json::to_string_pretty(&actions)?);
            } else {
                for action in &actions {
                    println!("{:>2}) {}", action.index + 1, action.title);
                }
            }
            Ok(())
        }
    }
}

async fn run_scenario(path: &Path, options: ReporterOptions, config: &Config) -> Result<()> {
    let scenario = Scenario::load(path)?;

    println!(
        "\n{} {}",
        "Running:".blue().bold(),
        scenario.name.white().bold()
    );
    if let Some(desc) = &scenario.description {
        println!("  {}", desc.dimmed());
    }

    let orchestrator_options = OrchestratorOptions {
        host_timeout: Duration::from_secs(config.timeouts.host_transition_secs),
        ..OrchestratorOptions::default()
    };
    let orchestrator = match scenario.operator.clone() {
        Some(picks) => {
            tracing::debug!(?picks, "Using scripted menu selections");
            BreakOrchestrator::with_options(ScriptedMenu::new(picks), orchestrator_options)
        }
        None => BreakOrchestrator::with_options(TerminalMenu::new(), orchestrator_options),
    };

    if options.signal {
        println!("  {}", "Press Ctrl+C to break the run".dimmed());
    }

    let session = Session::new(scenario, orchestrator, options);
    let summary = session.run().await;
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    if summary.aborted {
        println!(
            "\n{} Run aborted after {} item(s)\n",
            "✗".red().bold(),
            summary.items_run
        );
    } else {
        println!(
            "\n{} Run finished: {} iteration(s), {} item(s)\n",
            "✓".green().bold(),
            summary.iterations_completed,
            summary.items_run
        );
    }
}
