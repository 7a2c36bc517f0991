//! Break/resume orchestration
//!
//! Turns break requests coming from run events into a discrete pause
//! cycle:
//!
//! ```text
//! Running -> AwaitingHostPause -> Presenting -> ExecutingAction
//!                                     ^                |
//!                                     +-- resume=false-+
//!                                                      | resume=true
//! Running <- AwaitingHostResume <----------------------+
//! ```
//!
//! The `broken` flag is claimed under the control lock by `trigger_break`
//! and released only when the cycle task hands the run back, so one cycle
//! task (and therefore one presentation) exists at a time. A continue
//! request arriving from outside the cycle ends the cycle instead of
//! resuming the host behind its back.

mod actions;
mod menu;
mod state;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::common::Error;
use crate::host::BreakHooks;

pub use actions::{Action, ActionInfo, ActionOutcome, ActionRegistry, Effect};
pub use menu::{parse_selection, prompt_text, Menu, Presentation, ScriptedMenu, Selection, TerminalMenu};
pub use state::{BreakState, InterruptAction};

use state::Control;

/// Terminates the process on force abort
pub type Terminator = Arc<dyn Fn(i32) + Send + Sync>;

/// Exit code used for force aborts
pub const FORCE_ABORT_CODE: i32 = 1;

/// Host integration installed once the run has started
#[derive(Clone, Default)]
pub struct BreakSetup {
    /// Pause/resume hooks; without them presentation starts immediately
    pub hooks: Option<Arc<dyn BreakHooks>>,
    /// Take over Ctrl+C to break the run
    pub signal: bool,
}

/// Orchestrator tuning
#[derive(Clone)]
pub struct OrchestratorOptions {
    /// Give up waiting for a host pause/resume confirmation after this long
    pub host_timeout: Duration,
    /// Called on force abort
    pub terminator: Terminator,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            host_timeout: Duration::from_secs(30),
            terminator: Arc::new(|code| std::process::exit(code)),
        }
    }
}

struct Inner {
    control: Mutex<Control>,
    resume_signal: Notify,
    last_selected: AtomicUsize,
    presentations: AtomicUsize,
    signal_armed: AtomicBool,
    hooks: RwLock<Option<Arc<dyn BreakHooks>>>,
    actions: RwLock<ActionRegistry>,
    menu: tokio::sync::Mutex<Box<dyn Menu>>,
    options: OrchestratorOptions,
}

/// Owns the pause cycle. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct BreakOrchestrator {
    inner: Arc<Inner>,
}

impl BreakOrchestrator {
    pub fn new(menu: impl Menu + 'static) -> Self {
        Self::with_options(menu, OrchestratorOptions::default())
    }

    pub fn with_options(menu: impl Menu + 'static, options: OrchestratorOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                control: Mutex::new(Control::default()),
                resume_signal: Notify::new(),
                last_selected: AtomicUsize::new(0),
                presentations: AtomicUsize::new(0),
                signal_armed: AtomicBool::new(false),
                hooks: RwLock::new(None),
                actions: RwLock::new(ActionRegistry::new()),
                menu: tokio::sync::Mutex::new(Box::new(menu)),
                options,
            }),
        }
    }

    /// Install host hooks and optionally arm the Ctrl+C listener
    pub fn setup(&self, setup: BreakSetup) {
        {
            let mut hooks = self.inner.hooks.write().unwrap_or_else(|e| e.into_inner());
            if hooks.is_some() {
                tracing::debug!("Replacing previously installed break hooks");
            }
            *hooks = setup.hooks;
        }

        if setup.signal && !self.inner.signal_armed.swap(true, Ordering::SeqCst) {
            self.arm_interrupt_listener();
        }
    }

    /// Register an action; returns its index
    pub fn add<E>(&self, title: impl Into<String>, effect: E) -> usize
    where
        E: Effect + 'static,
    {
        self.inner
            .actions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .add(title, Arc::new(effect))
    }

    /// Break the run
    ///
    /// Returns the handle of the spawned pause cycle, or `None` when the
    /// run is already broken. Must be called within a Tokio runtime.
    pub fn trigger_break(&self, reason: Option<&str>) -> Option<JoinHandle<()>> {
        if !self.control().claim() {
            tracing::debug!(reason, "Run already broken, ignoring break request");
            return None;
        }

        tracing::info!(reason = reason.unwrap_or("operator request"), "Breaking run");

        let this = self.clone();
        let reason = reason.map(str::to_string);
        Some(tokio::spawn(async move {
            this.pause_host().await;
            if this.present(reason).await {
                this.end_cycle().await;
            }
        }))
    }

    /// Resume the run
    ///
    /// While a pause cycle is active the request is handed to the cycle,
    /// which leaves the menu and resumes the host itself; the call then
    /// returns without waiting for it.
    pub async fn trigger_continue(&self, reason: Option<&str>) {
        let reason = reason.unwrap_or("operator request");
        {
            let mut control = self.control();
            if control.broken {
                control.resume_requested = true;
                drop(control);
                self.inner.resume_signal.notify_waiters();
                tracing::info!(reason, "Asking the pause cycle to resume");
                return;
            }
            control.enter(BreakState::AwaitingHostResume);
        }
        self.await_host_resume(reason).await;
    }

    async fn end_cycle(&self) {
        self.control().release();
        self.await_host_resume("operator request").await;
    }

    async fn await_host_resume(&self, reason: &str) {
        tracing::info!(reason, "Continuing run");

        if let Some(hooks) = self.hooks() {
            let secs = self.inner.options.host_timeout.as_secs();
            match tokio::time::timeout(self.inner.options.host_timeout, hooks.on_continue()).await {
                Ok(Ok(())) => tracing::debug!("Host confirmed resume"),
                Ok(Err(e)) => tracing::warn!(error = %e, "Continue hook failed"),
                Err(_) => tracing::warn!(error = %Error::host_timeout("resume", secs), "Continue hook timed out"),
            }
        }

        // A new break may have started while the host was resuming
        let mut control = self.control();
        if control.state == BreakState::AwaitingHostResume {
            control.enter(BreakState::Running);
        }
    }

    /// Handle an external interrupt (Ctrl+C)
    pub fn interrupt(&self) -> InterruptAction {
        let action = self.control().on_interrupt();
        match action {
            InterruptAction::Break => {
                self.trigger_break(Some("interrupt"));
            }
            InterruptAction::ForceAbort => {
                tracing::warn!("Run did not pause after repeated interrupts");
                self.terminate(FORCE_ABORT_CODE);
            }
            InterruptAction::Ignore => {
                tracing::debug!("Interrupt ignored while broken");
            }
        }
        action
    }

    /// Terminate the process, bypassing the pause cycle
    pub fn terminate(&self, code: i32) {
        tracing::warn!(code, "Force aborting run");
        (self.inner.options.terminator)(code);
    }

    pub fn state(&self) -> BreakState {
        self.control().state
    }

    pub fn is_broken(&self) -> bool {
        self.control().broken
    }

    /// Index highlighted by default on the next presentation
    pub fn last_selected_index(&self) -> usize {
        self.inner.last_selected.load(Ordering::SeqCst)
    }

    /// Number of menu presentations so far
    pub fn presentations(&self) -> usize {
        self.inner.presentations.load(Ordering::SeqCst)
    }

    /// Registered actions in display order
    pub fn actions(&self) -> Vec<ActionInfo> {
        self.inner
            .actions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .infos()
    }

    /// Present the menu until an action or a continue request resumes.
    /// Returns false when the operator cancelled and the run was terminated.
    async fn present(&self, reason: Option<String>) -> bool {
        let mut reason = reason;

        loop {
            let resumed = self.inner.resume_signal.notified();
            tokio::pin!(resumed);
            resumed.as_mut().enable();
            if self.control().resume_requested {
                tracing::debug!("Resume requested, leaving the menu");
                break;
            }

            self.enter(BreakState::Presenting);
            self.inner.presentations.fetch_add(1, Ordering::SeqCst);

            let choices = self.actions();
            if choices.is_empty() {
                tracing::warn!("No actions registered, resuming run");
                break;
            }

            let initial = self.last_selected_index().min(choices.len() - 1);
            let prompt = prompt_text(reason.as_deref());
            let selection = {
                let mut menu = self.inner.menu.lock().await;
                tokio::select! {
                    selection = menu.choose(&prompt, &choices, initial) => Some(selection),
                    _ = &mut resumed => None,
                }
            };
            let Some(selection) = selection else {
                tracing::debug!("Resume requested while presenting, closing the menu");
                break;
            };

            let index = match selection {
                Ok(Some(index)) => index,
                Ok(None) => {
                    tracing::info!("Menu cancelled");
                    self.terminate(FORCE_ABORT_CODE);
                    return false;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Menu failed, resuming run");
                    break;
                }
            };

            let Some(action) = self.action(index) else {
                tracing::warn!(error = %Error::ActionNotFound(index), "Ignoring selection");
                continue;
            };

            self.inner.last_selected.store(index, Ordering::SeqCst);
            self.enter(BreakState::ExecutingAction);
            tracing::debug!(action = %action.title, index, "Executing action");

            let outcome = action.effect.run().await;
            if let Some(e) = &outcome.error {
                tracing::warn!(action = %action.title, error = %e, "Action reported an error");
            }
            if outcome.resume {
                break;
            }
            reason = None;
        }

        true
    }

    async fn pause_host(&self) {
        let Some(hooks) = self.hooks() else {
            tracing::debug!("No break hook installed, presenting immediately");
            return;
        };

        let secs = self.inner.options.host_timeout.as_secs();
        match tokio::time::timeout(self.inner.options.host_timeout, hooks.on_break()).await {
            Ok(Ok(())) => tracing::debug!("Host confirmed pause"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Break hook failed, presenting anyway"),
            Err(_) => tracing::warn!(
                error = %Error::host_timeout("pause", secs),
                "Break hook timed out, presenting anyway"
            ),
        }
    }

    fn arm_interrupt_listener(&self) {
        let this = self.clone();
        tokio::spawn(async move {
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!(error = %e, "Could not listen for Ctrl+C, interrupt breaks disabled");
                    break;
                }
                this.interrupt();
            }
        });
        tracing::debug!("Ctrl+C now breaks the run");
    }

    fn action(&self, index: usize) -> Option<Action> {
        self.inner
            .actions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(index)
            .cloned()
    }

    fn hooks(&self) -> Option<Arc<dyn BreakHooks>> {
        self.inner
            .hooks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn enter(&self, state: BreakState) {
        self.control().enter(state);
    }

    fn control(&self) -> MutexGuard<'_, Control> {
        self.inner.control.lock().unwrap_or_else(|e| e.into_inner())
    }
}
