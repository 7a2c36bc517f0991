//! Error types for runpause
//!
//! Most failures here are recoverable by design of the reporter: host
//! integration problems downgrade to an unattended run, action failures are
//! logged and the pause cycle carries on.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for runpause
#[derive(Error, Debug)]
pub enum Error {
    // === Host Integration Errors ===
    #[error("Run host is not available. Breakpoints are disabled for this run")]
    HostUnavailable,

    #[error("Could not integrate with the run: {0}")]
    HostIntegration(String),

    #[error("Host did not confirm {transition} within {secs} seconds")]
    HostTimeout { transition: String, secs: u64 },

    // === Action Errors ===
    #[error("Action '{title}' failed: {reason}")]
    ActionFailed { title: String, reason: String },

    #[error("No action registered at index {0}")]
    ActionNotFound(usize),

    // === Variable Tracking Errors ===
    #[error("Scope '{scope}' violated its contract: {reason}")]
    ScopeContract { scope: String, reason: String },

    #[error("Variable {0} not found in scope")]
    VariableNotFound(u64),

    // === Menu Errors ===
    #[error("Menu error: {0}")]
    Menu(String),

    // === Configuration Errors ===
    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Invalid run scenario: {0}")]
    Scenario(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Create an action failed error
    pub fn action_failed(title: &str, reason: &str) -> Self {
        Self::ActionFailed {
            title: title.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a scope contract error
    pub fn scope_contract(scope: &str, reason: &str) -> Self {
        Self::ScopeContract {
            scope: scope.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a host timeout error
    pub fn host_timeout(transition: &str, secs: u64) -> Self {
        Self::HostTimeout {
            transition: transition.to_string(),
            secs,
        }
    }
}
