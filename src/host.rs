//! Contract with the run engine
//!
//! The reporter never drives a run itself. It asks the host to pause,
//! resume or abort and waits for the host to confirm the transition.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::common::Result;
use crate::tracker::VariableScope;

/// Lifecycle control exposed by the run engine
///
/// Each call resolves once the requested transition has actually taken
/// effect in the run.
#[async_trait]
pub trait RunHost: Send + Sync {
    async fn pause(&self) -> Result<()>;
    async fn resume(&self) -> Result<()>;
    async fn abort(&self) -> Result<()>;
}

/// Hooks the orchestrator uses to suspend and resume the underlying run
#[async_trait]
pub trait BreakHooks: Send + Sync {
    /// Called on break; returns once the run is paused
    async fn on_break(&self) -> Result<()>;
    /// Called on continue; returns once the run is running again
    async fn on_continue(&self) -> Result<()>;
}

/// Break hooks backed by a [`RunHost`]'s pause and resume
pub struct HostHooks {
    host: Arc<dyn RunHost>,
}

impl HostHooks {
    pub fn new(host: Arc<dyn RunHost>) -> Self {
        Self { host }
    }
}

#[async_trait]
impl BreakHooks for HostHooks {
    async fn on_break(&self) -> Result<()> {
        self.host.pause().await
    }

    async fn on_continue(&self) -> Result<()> {
        self.host.resume().await
    }
}

/// The three variable scopes of a run
#[derive(Clone)]
pub struct RunScopes {
    pub collection: Arc<dyn VariableScope>,
    pub environment: Arc<dyn VariableScope>,
    pub globals: Arc<dyn VariableScope>,
}

/// Handle to a started run, delivered with the start event
#[derive(Clone)]
pub struct RunHandle {
    pub host: Arc<dyn RunHost>,
    pub scopes: RunScopes,
}

impl fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunHandle").finish_non_exhaustive()
    }
}

/// Outgoing request of a network exchange
#[derive(Debug, Clone, Default)]
pub struct RequestInfo {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub size: u64,
}

/// Response of a network exchange
#[derive(Debug, Clone, Default)]
pub struct ResponseInfo {
    pub code: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub cookies: usize,
    pub content_type: Option<String>,
    pub response_time_ms: f64,
    pub body: String,
}

impl ResponseInfo {
    pub fn size(&self) -> u64 {
        self.body.len() as u64
    }
}

/// A request and its response as reported by the run
#[derive(Debug, Clone, Default)]
pub struct NetworkExchange {
    pub request: RequestInfo,
    pub response: Option<ResponseInfo>,
}

/// Outcome of one test script execution
#[derive(Debug, Clone, Default)]
pub struct ScriptExecution {
    /// Request the script asked to jump to, if any
    pub next_request: Option<String>,
}

/// Find the redirect requested by a batch of script executions.
///
/// Later executions win, so the scan runs from the last one backwards.
pub fn extract_next_request(executions: &[ScriptExecution]) -> Option<&str> {
    executions
        .iter()
        .rev()
        .find_map(|exec| exec.next_request.as_deref().filter(|name| !name.is_empty()))
}
