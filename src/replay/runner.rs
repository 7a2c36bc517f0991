//! Scripted run implementation
//!
//! Replays a [`Scenario`] as a stream of run events. Before every event the
//! run passes a checkpoint where it parks while paused and stops once
//! aborted, so pause and resume take effect between events.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::common::{Error, Result};
use crate::events::{EventBus, RunEvent};
use crate::host::{
    NetworkExchange, RequestInfo, ResponseInfo, RunHandle, RunHost, RunScopes, ScriptExecution,
};
use crate::tracker::VariableList;

use super::config::{ItemStep, Mutation, RequestStep, Scenario, ScopeName};

/// Upper bound on items executed per iteration, stops redirect cycles
const MAX_ITEMS_PER_ITERATION: usize = 1000;

/// What the controller asks of the run
#[derive(Debug, Clone, Copy, Default)]
struct Gate {
    paused: bool,
    aborted: bool,
}

/// What the run reports back
#[derive(Debug, Clone, Copy, Default)]
struct Progress {
    parked: bool,
    finished: bool,
}

/// Pause, resume and abort for a [`ScriptedRun`]
///
/// Each request resolves once the run has reached the requested state, or
/// immediately when the run has already finished.
pub struct RunControl {
    gate: watch::Sender<Gate>,
    progress: watch::Sender<Progress>,
}

impl RunControl {
    fn new() -> Self {
        let (gate, _) = watch::channel(Gate::default());
        let (progress, _) = watch::channel(Progress::default());
        Self { gate, progress }
    }

    pub fn is_finished(&self) -> bool {
        self.progress.borrow().finished
    }

    async fn wait_progress(&self, done: impl FnMut(&Progress) -> bool) -> Result<()> {
        let mut rx = self.progress.subscribe();
        rx.wait_for(done)
            .await
            .map(|_| ())
            .map_err(|_| Error::HostIntegration("run progress channel closed".to_string()))
    }

    /// Block the caller at a checkpoint while paused; false once aborted
    async fn checkpoint(&self) -> bool {
        // Give tasks spawned by the previous event's listeners a chance to run
        tokio::task::yield_now().await;

        let mut gate = self.gate.subscribe();
        let mut parked = false;
        let proceed = loop {
            let state = *gate.borrow_and_update();
            if state.aborted {
                break false;
            }
            if !state.paused {
                break true;
            }
            if !parked {
                parked = true;
                self.progress.send_modify(|p| p.parked = true);
                tracing::debug!("Run parked");
            }
            if gate.changed().await.is_err() {
                break false;
            }
        };

        if parked {
            self.progress.send_modify(|p| p.parked = false);
            tracing::debug!("Run unparked");
        }
        proceed
    }

    fn finish(&self) {
        self.progress.send_modify(|p| {
            p.parked = false;
            p.finished = true;
        });
    }
}

#[async_trait]
impl RunHost for RunControl {
    async fn pause(&self) -> Result<()> {
        self.gate.send_modify(|g| g.paused = true);
        self.wait_progress(|p| p.parked || p.finished).await
    }

    async fn resume(&self) -> Result<()> {
        self.gate.send_modify(|g| g.paused = false);
        self.wait_progress(|p| !p.parked || p.finished).await
    }

    async fn abort(&self) -> Result<()> {
        tracing::info!("Aborting run");
        self.gate.send_modify(|g| g.aborted = true);
        self.wait_progress(|p| p.finished).await
    }
}

/// Result of a scripted run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub iterations_completed: usize,
    pub items_run: usize,
    pub aborted: bool,
}

/// A run engine replaying a scenario
pub struct ScriptedRun {
    scenario: Scenario,
    bus: Arc<EventBus>,
    control: Arc<RunControl>,
    collection: VariableList,
    environment: VariableList,
    globals: VariableList,
}

impl ScriptedRun {
    pub fn new(scenario: Scenario, bus: Arc<EventBus>) -> Self {
        Self {
            collection: VariableList::from_pairs(&scenario.collection),
            environment: VariableList::from_pairs(&scenario.environment),
            globals: VariableList::from_pairs(&scenario.globals),
            scenario,
            bus,
            control: Arc::new(RunControl::new()),
        }
    }

    pub fn control(&self) -> Arc<RunControl> {
        Arc::clone(&self.control)
    }

    pub fn scope(&self, name: ScopeName) -> &VariableList {
        match name {
            ScopeName::Collection => &self.collection,
            ScopeName::Environment => &self.environment,
            ScopeName::Globals => &self.globals,
        }
    }

    /// Control interface handed to listeners with the start event
    pub fn handle(&self) -> RunHandle {
        RunHandle {
            host: self.control.clone(),
            scopes: RunScopes {
                collection: Arc::new(self.collection.clone()),
                environment: Arc::new(self.environment.clone()),
                globals: Arc::new(self.globals.clone()),
            },
        }
    }

    /// Replay the scenario to completion or abort
    pub async fn run(&self) -> RunSummary {
        let scenario = &self.scenario;
        let mut summary = RunSummary::default();

        tracing::debug!(name = %scenario.name, iterations = scenario.iterations, "Starting run");
        self.bus.emit(&RunEvent::Start {
            error: scenario.start_error.clone(),
            run: scenario.expose_run.then(|| self.handle()),
        });

        'run: for iteration in 0..scenario.iterations {
            if !self.control.checkpoint().await {
                summary.aborted = true;
                break;
            }
            self.bus.emit(&RunEvent::BeforeIteration { iteration });

            let mut cursor = 0;
            let mut executed = 0;
            while let Some(item) = scenario.items.get(cursor) {
                if executed == MAX_ITEMS_PER_ITERATION {
                    tracing::warn!(iteration, "Item limit reached, ending iteration");
                    break;
                }
                if !self.run_item(item).await {
                    summary.aborted = true;
                    break 'run;
                }
                executed += 1;
                summary.items_run += 1;

                cursor = match item.next_request.as_deref() {
                    Some(next) => scenario.item_index(next).unwrap_or(cursor + 1),
                    None => cursor + 1,
                };
            }

            if !self.control.checkpoint().await {
                summary.aborted = true;
                break;
            }
            self.bus.emit(&RunEvent::Iteration {
                iteration,
                eof: iteration + 1 == scenario.iterations,
                error: None,
            });
            summary.iterations_completed += 1;
        }

        if !summary.aborted && !self.control.checkpoint().await {
            summary.aborted = true;
        }
        self.bus.emit(&RunEvent::Done { error: None });
        self.control.finish();

        tracing::debug!(?summary, "Run finished");
        summary
    }

    /// Emit the events of one item; false once aborted
    async fn run_item(&self, item: &ItemStep) -> bool {
        if let Some(request) = &item.request {
            if !self.control.checkpoint().await {
                return false;
            }
            self.bus.emit(&request_event(request));
        }

        for line in &item.console {
            if !self.control.checkpoint().await {
                return false;
            }
            self.bus.emit(&RunEvent::Console {
                level: "log".to_string(),
                message: line.clone(),
            });
        }

        for mutation in &item.mutations {
            self.apply(mutation);
        }

        if !self.control.checkpoint().await {
            return false;
        }
        self.bus.emit(&RunEvent::Test {
            error: item.test_error.clone(),
            executions: vec![ScriptExecution {
                next_request: item.next_request.clone(),
            }],
        });

        if !self.control.checkpoint().await {
            return false;
        }
        self.bus.emit(&RunEvent::Item {
            name: item.name.clone(),
        });
        true
    }

    fn apply(&self, mutation: &Mutation) {
        let scope = self.scope(mutation.scope());
        match mutation {
            Mutation::Set { key, value, .. } => {
                scope.set(key, value.clone());
            }
            Mutation::Unset { key, .. } => {
                if scope.unset(key).is_none() {
                    tracing::debug!(key = %key, "Unset of missing variable");
                }
            }
            Mutation::Rename { key, to, .. } => {
                let renamed = scope
                    .find(key)
                    .ok_or_else(|| Error::Scenario(format!("no variable '{}' to rename", key)))
                    .and_then(|var| scope.rename(var.id, to.clone()));
                if let Err(e) = renamed {
                    tracing::warn!(error = %e, "Rename skipped");
                }
            }
            Mutation::Clear { .. } => scope.clear(),
        }
    }
}

fn request_event(request: &RequestStep) -> RunEvent {
    let info = RequestInfo {
        method: request.method.clone(),
        url: request.url.clone(),
        headers: Vec::new(),
        size: 0,
    };

    if let Some(error) = &request.error {
        return RunEvent::Request {
            error: Some(error.clone()),
            exchange: Some(NetworkExchange {
                request: info,
                response: None,
            }),
        };
    }

    let headers = request
        .content_type
        .iter()
        .map(|ct| ("Content-Type".to_string(), ct.clone()))
        .collect();

    RunEvent::Request {
        error: None,
        exchange: Some(NetworkExchange {
            request: info,
            response: Some(ResponseInfo {
                code: request.status,
                reason: reason_phrase(request.status).to_string(),
                headers,
                cookies: 0,
                content_type: request.content_type.clone(),
                response_time_ms: request.response_time_ms,
                body: request.body.clone(),
            }),
        }),
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        409 => "Conflict",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "",
    }
}
