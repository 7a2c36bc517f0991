//! Run scenario configuration types
//!
//! Defines the data structures for deserializing YAML run scenarios.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::common::{Error, Result};

/// A complete run scenario loaded from a YAML file
#[derive(Deserialize, Debug, Clone)]
pub struct Scenario {
    /// Name of the run
    pub name: String,
    /// Optional description shown before the run
    pub description: Option<String>,
    /// Number of times the item list is executed
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    /// Initial collection variables
    #[serde(default)]
    pub collection: BTreeMap<String, String>,
    /// Initial environment variables
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    /// Initial global variables
    #[serde(default)]
    pub globals: BTreeMap<String, String>,
    /// Items executed in order on every iteration
    #[serde(default)]
    pub items: Vec<ItemStep>,
    /// Scripted menu selections by action index; interactive when absent
    pub operator: Option<Vec<usize>>,
    /// Hand the control interface to listeners on start
    #[serde(default = "default_true")]
    pub expose_run: bool,
    /// Error reported with the start event
    pub start_error: Option<String>,
}

fn default_iterations() -> usize {
    1
}

fn default_true() -> bool {
    true
}

/// One item: a request, its console output and its script side effects
#[derive(Deserialize, Debug, Clone)]
pub struct ItemStep {
    pub name: String,
    pub request: Option<RequestStep>,
    /// Console lines written by the item's scripts
    #[serde(default)]
    pub console: Vec<String>,
    /// Variable changes made by the item's scripts
    #[serde(default)]
    pub mutations: Vec<Mutation>,
    /// Item the test script redirects the run to
    pub next_request: Option<String>,
    /// Failure reported by the test scripts
    pub test_error: Option<String>,
}

/// The request an item sends
#[derive(Deserialize, Debug, Clone)]
pub struct RequestStep {
    #[serde(default = "default_method")]
    pub method: String,
    pub url: String,
    #[serde(default = "default_status")]
    pub status: u16,
    #[serde(default)]
    pub body: String,
    pub content_type: Option<String>,
    #[serde(default)]
    pub response_time_ms: f64,
    /// Fail the request instead of producing a response
    pub error: Option<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_status() -> u16 {
    200
}

/// Variable scope targeted by a mutation
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScopeName {
    Collection,
    Environment,
    Globals,
}

/// A script side effect on a variable scope
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    /// Create `key` or update its value
    Set {
        scope: ScopeName,
        key: String,
        value: String,
    },
    /// Remove `key`
    Unset { scope: ScopeName, key: String },
    /// Rename `key` to `to`, keeping the variable's identity
    Rename {
        scope: ScopeName,
        key: String,
        to: String,
    },
    /// Remove every variable of the scope
    Clear { scope: ScopeName },
}

impl Mutation {
    pub fn scope(&self) -> ScopeName {
        match self {
            Self::Set { scope, .. }
            | Self::Unset { scope, .. }
            | Self::Rename { scope, .. }
            | Self::Clear { scope } => *scope,
        }
    }
}

impl Scenario {
    /// Load and validate a scenario file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse and validate scenario YAML
    pub fn parse(content: &str) -> Result<Self> {
        let scenario: Scenario = serde_yaml::from_str(content)?;
        scenario.validate()?;
        Ok(scenario)
    }

    fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(Error::Scenario("iterations must be at least 1".to_string()));
        }
        for item in &self.items {
            let Some(target) = &item.next_request else {
                continue;
            };
            if !self.items.iter().any(|i| &i.name == target) {
                return Err(Error::Scenario(format!(
                    "item '{}' redirects to unknown item '{}'",
                    item.name, target
                )));
            }
        }
        Ok(())
    }

    /// Position of the item named `name`
    pub fn item_index(&self, name: &str) -> Option<usize> {
        self.items.iter().position(|i| i.name == name)
    }
}
