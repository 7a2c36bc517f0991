//! runpause - interactive breakpoints for event-driven test runs
//!
//! This library pauses a run on lifecycle events, presents an action menu
//! while the run is halted, and tracks variable changes across scopes by
//! identity rather than by key.

pub mod cli;
pub mod commands;
pub mod common;
pub mod events;
pub mod host;
pub mod orchestrator;
pub mod replay;
pub mod reporter;
pub mod tracker;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use events::{EventBus, EventKind, RunEvent};
pub use orchestrator::{ActionOutcome, BreakOrchestrator, BreakState};
pub use tracker::{DiffReport, DiffStatus, VariableTracker};
