//! Scripted runs
//!
//! Reads YAML run scenarios and replays them as run events, with the
//! breakpoint reporter listening on the same bus.

mod config;
mod runner;

use std::sync::Arc;

use crate::events::EventBus;
use crate::orchestrator::BreakOrchestrator;
use crate::reporter::{Reporter, ReporterOptions};

pub use config::*;
pub use runner::{RunControl, RunSummary, ScriptedRun};

/// A scripted run with the reporter installed
pub struct Session {
    pub bus: Arc<EventBus>,
    pub reporter: Reporter,
    pub run: ScriptedRun,
}

impl Session {
    pub fn new(scenario: Scenario, orchestrator: BreakOrchestrator, options: ReporterOptions) -> Self {
        let bus = EventBus::new();
        let reporter = Reporter::install(Arc::clone(&bus), orchestrator, options);
        let run = ScriptedRun::new(scenario, Arc::clone(&bus));
        Self { bus, reporter, run }
    }

    /// Replay the scenario; returns once the run has finished
    pub async fn run(&self) -> RunSummary {
        self.run.run().await
    }
}
