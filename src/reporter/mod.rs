//! Standard breakpoint actions wired to run events
//!
//! The action list is registered once, in display order. Break-on actions
//! arm listeners on the event bus and resume the run; inspection actions
//! print something and keep the run paused.

pub mod network;
pub mod render;

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, Weak};

use crate::common::{Error, Result};
use crate::events::{EventBus, EventKind, RunEvent, SubscriptionGroup};
use crate::host::{extract_next_request, HostHooks, RunHandle};
use crate::orchestrator::{ActionOutcome, BreakOrchestrator, BreakSetup, FORCE_ABORT_CODE};
use crate::tracker::{any_modified, VariableRow, VariableTracker};

use network::NetworkLog;

pub const COLLECTION: &str = "Collection";
pub const ENVIRONMENT: &str = "Environment";
pub const GLOBAL: &str = "Global";

/// Tracked scopes, in display order
pub const SCOPE_NAMES: [&str; 3] = [COLLECTION, ENVIRONMENT, GLOBAL];

/// Reporter behaviour switches
#[derive(Debug, Clone, Copy, Default)]
pub struct ReporterOptions {
    /// Do not break when the run starts
    pub continue_on_start: bool,
    /// Let Ctrl+C break the run
    pub signal: bool,
}

struct Shared {
    bus: Arc<EventBus>,
    orchestrator: BreakOrchestrator,
    tracker: Mutex<VariableTracker>,
    run: RwLock<Option<RunHandle>>,
    network: NetworkLog,
    options: ReporterOptions,
}

/// Connects the orchestrator, the variable tracker and the run's events
///
/// Actions and listeners hold the reporter weakly. Dropping the last
/// `Reporter` frees its state; handlers left on the bus then do nothing.
#[derive(Clone)]
pub struct Reporter {
    shared: Arc<Shared>,
}

impl Reporter {
    /// Register the standard actions and subscribe to run events
    pub fn install(bus: Arc<EventBus>, orchestrator: BreakOrchestrator, options: ReporterOptions) -> Self {
        let reporter = Self {
            shared: Arc::new(Shared {
                bus,
                orchestrator,
                tracker: Mutex::new(VariableTracker::new()),
                run: RwLock::new(None),
                network: NetworkLog::new(),
                options,
            }),
        };

        reporter.register_actions();
        reporter.listen();
        reporter
    }

    pub fn orchestrator(&self) -> &BreakOrchestrator {
        &self.shared.orchestrator
    }

    pub fn network(&self) -> &NetworkLog {
        &self.shared.network
    }

    /// Whether the run exposed its control interface on start
    pub fn is_armed(&self) -> bool {
        self.shared.run.read().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    /// Exclusive access to the variable tracker
    pub fn tracker(&self) -> MutexGuard<'_, VariableTracker> {
        self.shared.tracker.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current variables of every tracked scope
    pub fn variable_rows(&self) -> Result<Vec<VariableRow>> {
        let tracker = self.tracker();
        let mut rows = Vec::new();
        for name in SCOPE_NAMES {
            if let Some(scope_rows) = tracker.list(name)? {
                rows.extend(scope_rows);
            }
        }
        Ok(rows)
    }

    fn weak(&self) -> WeakReporter {
        WeakReporter(Arc::downgrade(&self.shared))
    }

    fn bus(&self) -> &Arc<EventBus> {
        &self.shared.bus
    }

    fn run_handle(&self) -> Option<RunHandle> {
        self.shared.run.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Register an action that runs against the reporter. Once the reporter
    /// is gone the action only resumes the run.
    fn add_action<F, Fut>(&self, title: &str, effect: F)
    where
        F: Fn(Reporter) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActionOutcome> + Send + 'static,
    {
        let weak = self.weak();
        self.shared.orchestrator.add(title, move || {
            let pending = weak.upgrade().map(&effect);
            async move {
                match pending {
                    Some(fut) => fut.await,
                    None => ActionOutcome::continue_run(),
                }
            }
        });
    }

    /// Subscribe to `kind` for as long as the reporter lives
    fn on<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&Reporter, &RunEvent) + Send + Sync + 'static,
    {
        let weak = self.weak();
        self.bus().on(kind, move |event| {
            if let Some(reporter) = weak.upgrade() {
                handler(&reporter, event);
            }
        });
    }

    fn register_actions(&self) {
        self.break_on_next("Break on next request", EventKind::Request, "request");
        self.break_on_next("Break on next iteration", EventKind::BeforeIteration, "iteration start");
        self.break_on_next("Break on next console log", EventKind::Console, "console log");
        self.break_on_end_of_run();
        self.break_on_variable_change();
        self.break_on_next_request_change();

        self.add_action("Inspect all variables", |this| async move {
            match this.variable_rows() {
                Ok(rows) => {
                    println!();
                    print!("{}", render::variables_table(&rows));
                    ActionOutcome::stay_paused()
                }
                Err(e) => ActionOutcome::failed(e, false),
            }
        });

        self.add_action("Show last network activity", |this| async move {
            println!();
            print!("{}", network::render_latest(this.network()));
            ActionOutcome::stay_paused()
        });

        self.add_action("Abort run", |this| async move {
            let Some(run) = this.run_handle() else {
                tracing::info!("No run to abort");
                return ActionOutcome::continue_run();
            };
            match run.host.abort().await {
                Ok(()) => ActionOutcome::continue_run(),
                Err(e) => ActionOutcome::failed(e, true),
            }
        });

        self.add_action("Force abort run (press q)", |this| {
            this.orchestrator().terminate(FORCE_ABORT_CODE);
            async { ActionOutcome::continue_run() }
        });
    }

    /// Action that breaks on the next event of `kind`
    fn break_on_next(&self, title: &str, kind: EventKind, reason: &'static str) {
        self.add_action(title, move |this| {
            let weak = this.weak();
            this.bus().once(kind, move |_| {
                if let Some(this) = weak.upgrade() {
                    this.orchestrator().trigger_break(Some(reason));
                }
            });
            async { ActionOutcome::continue_run() }
        });
    }

    fn break_on_end_of_run(&self) {
        self.add_action("Break on the end of run", |this| {
            let group = SubscriptionGroup::new(this.bus());
            let weak = this.weak();
            group.on(EventKind::Iteration, move |group, event| {
                if let RunEvent::Iteration { eof: true, .. } = event {
                    let Some(this) = weak.upgrade() else {
                        return;
                    };
                    if group.fire() {
                        this.orchestrator().trigger_break(Some("end of run"));
                    }
                }
            });
            async { ActionOutcome::continue_run() }
        });
    }

    fn break_on_variable_change(&self) {
        self.add_action("Break on variable change", |this| {
            let group = SubscriptionGroup::new(this.bus());
            let weak = this.weak();
            group.on(EventKind::Item, move |group, _| {
                if let Some(this) = weak.upgrade() {
                    this.check_variables(group);
                }
            });
            async { ActionOutcome::continue_run() }
        });
    }

    /// Item tick of the variable change detector
    fn check_variables(&self, group: &SubscriptionGroup) {
        let reports = match self.tracker().track_all(&SCOPE_NAMES) {
            Ok(reports) => reports,
            Err(e) => {
                tracing::warn!(error = %e, "Variable change detection failed");
                return;
            }
        };

        if any_modified(&reports) && group.fire() {
            println!();
            print!("{}", render::status_table(&reports));
            self.orchestrator().trigger_break(Some("change of variable"));
        }
    }

    /// Break once a test script redirects the run to another request.
    ///
    /// A sniffer on test events records the redirect; a reactor on the
    /// following item event breaks. Both belong to one group.
    fn break_on_next_request_change(&self) {
        self.add_action("Break on setNextRequest", |this| {
            let group = SubscriptionGroup::new(this.bus());
            let latest: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));

            let sniffed = Arc::clone(&latest);
            group.on(EventKind::Test, move |_, event| {
                let RunEvent::Test { error: None, executions } = event else {
                    return;
                };
                if let Some(next) = extract_next_request(executions) {
                    *sniffed.lock().unwrap_or_else(|e| e.into_inner()) = Some(next.to_string());
                }
            });

            let weak = this.weak();
            group.on(EventKind::Item, move |group, _| {
                let next = latest.lock().unwrap_or_else(|e| e.into_inner()).clone();
                let (Some(next), Some(this)) = (next, weak.upgrade()) else {
                    return;
                };
                if group.fire() {
                    tracing::info!(next_request = %next, "Execution order changed");
                    this.orchestrator().trigger_break(Some("change of execution order"));
                }
            });

            async { ActionOutcome::continue_run() }
        });
    }

    fn listen(&self) {
        self.on(EventKind::Start, |this, event| {
            if let RunEvent::Start { error, run } = event {
                this.handle_start(error.as_deref(), run.as_ref());
            }
        });

        self.on(EventKind::Request, |this, event| {
            if let RunEvent::Request { error, exchange } = event {
                this.network().record(error.as_deref(), exchange.as_ref());
            }
        });

        self.on(EventKind::Done, |this, event| {
            this.network().clear();
            if !this.is_armed() {
                return;
            }
            if let Some(e) = event.error() {
                tracing::error!(error = e, "Run finished with an error");
            }
            tracing::info!("Run completed");
        });
    }

    fn handle_start(&self, error: Option<&str>, run: Option<&RunHandle>) {
        if let Some(e) = error {
            tracing::warn!(
                error = e,
                "Unable to initialise breakpoints: the run reported an error on start"
            );
            return;
        }

        let Some(run) = run else {
            tracing::warn!(
                error = %Error::HostUnavailable,
                "Unable to initialise breakpoints: the run engine does not expose its control interface"
            );
            return;
        };

        *self.shared.run.write().unwrap_or_else(|e| e.into_inner()) = Some(run.clone());

        self.orchestrator().setup(BreakSetup {
            hooks: Some(Arc::new(HostHooks::new(Arc::clone(&run.host)))),
            signal: self.shared.options.signal,
        });

        {
            let mut tracker = self.tracker();
            let scopes = [
                (COLLECTION, &run.scopes.collection),
                (ENVIRONMENT, &run.scopes.environment),
                (GLOBAL, &run.scopes.globals),
            ];
            for (name, scope) in scopes {
                // Baseline reports list every existing variable as added; discard them
                if let Err(e) = tracker.attach(name, Arc::clone(scope), true) {
                    tracing::warn!(scope = name, error = %e, "Could not take baseline of scope");
                }
            }
        }

        if !self.shared.options.continue_on_start {
            self.orchestrator().trigger_break(Some("execution start"));
        }
    }
}

/// Non-owning handle captured by actions and listeners
#[derive(Clone)]
struct WeakReporter(Weak<Shared>);

impl WeakReporter {
    fn upgrade(&self) -> Option<Reporter> {
        self.0.upgrade().map(|shared| Reporter { shared })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{NetworkExchange, RequestInfo, RunHost, RunScopes, ScriptExecution};
    use crate::orchestrator::{BreakState, OrchestratorOptions, Presentation, ScriptedMenu};
    use crate::tracker::VariableList;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct StubHost {
        pauses: AtomicUsize,
        resumes: AtomicUsize,
        aborts: AtomicUsize,
    }

    #[async_trait]
    impl RunHost for StubHost {
        async fn pause(&self) -> Result<()> {
            self.pauses.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn resume(&self) -> Result<()> {
            self.resumes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn abort(&self) -> Result<()> {
            self.aborts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Fixture {
        bus: Arc<EventBus>,
        reporter: Reporter,
        host: Arc<StubHost>,
        env: VariableList,
        log: Arc<Mutex<Vec<Presentation>>>,
    }

    fn fixture(picks: Vec<usize>, continue_on_start: bool) -> Fixture {
        let bus = EventBus::new();
        let menu = ScriptedMenu::new(picks);
        let log = menu.log();
        let orchestrator = BreakOrchestrator::with_options(
            menu,
            OrchestratorOptions {
                host_timeout: Duration::from_secs(1),
                terminator: Arc::new(|_| {}),
            },
        );
        let reporter = Reporter::install(
            Arc::clone(&bus),
            orchestrator,
            ReporterOptions {
                continue_on_start,
                signal: false,
            },
        );
        Fixture {
            bus,
            reporter,
            host: Arc::new(StubHost::default()),
            env: VariableList::from_pairs([("token", "abc")]),
            log,
        }
    }

    impl Fixture {
        fn start(&self) {
            let host: Arc<dyn RunHost> = self.host.clone();
            self.bus.emit(&RunEvent::Start {
                error: None,
                run: Some(RunHandle {
                    host,
                    scopes: RunScopes {
                        collection: Arc::new(VariableList::new()),
                        environment: Arc::new(self.env.clone()),
                        globals: Arc::new(VariableList::new()),
                    },
                }),
            });
        }

        async fn settle(&self) {
            for _ in 0..100 {
                if self.reporter.orchestrator().state() == BreakState::Running {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            panic!("orchestrator did not return to running");
        }
    }

    fn item() -> RunEvent {
        RunEvent::Item {
            name: "Login".to_string(),
        }
    }

    #[test]
    fn test_standard_action_order() {
        let f = fixture(vec![], true);
        let titles: Vec<_> = f
            .reporter
            .orchestrator()
            .actions()
            .into_iter()
            .map(|a| a.title)
            .collect();
        assert_eq!(
            titles,
            vec![
                "Break on next request",
                "Break on next iteration",
                "Break on next console log",
                "Break on the end of run",
                "Break on variable change",
                "Break on setNextRequest",
                "Inspect all variables",
                "Show last network activity",
                "Abort run",
                "Force abort run (press q)",
            ]
        );
    }

    #[tokio::test]
    async fn test_start_breaks_and_attaches_scopes() {
        let f = fixture(vec![0], false);
        f.start();
        f.settle().await;

        assert!(f.reporter.is_armed());
        assert_eq!(f.reporter.tracker().scope_names(), SCOPE_NAMES.to_vec());
        let log = f.log.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].prompt, "Run paused on execution start");
        assert_eq!(f.host.pauses.load(Ordering::SeqCst), 1);
        assert_eq!(f.host.resumes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_start_without_run_handle_never_arms() {
        let f = fixture(vec![0], false);
        f.bus.emit(&RunEvent::Start {
            error: None,
            run: None,
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(!f.reporter.is_armed());
        assert!(f.log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_start_error_never_arms() {
        let f = fixture(vec![0], false);
        f.bus.emit(&RunEvent::Start {
            error: Some("reporter crashed".to_string()),
            run: None,
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!f.reporter.is_armed());
        assert!(f.log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_break_on_next_request_fires_once() {
        // start break: arm "next request" and resume; then resume again
        let f = fixture(vec![0, 8], false);
        f.start();
        f.settle().await;

        f.bus.emit(&RunEvent::Request {
            error: None,
            exchange: Some(NetworkExchange {
                request: RequestInfo {
                    method: "GET".to_string(),
                    url: "https://example.test".to_string(),
                    ..RequestInfo::default()
                },
                response: None,
            }),
        });
        f.settle().await;
        f.bus.emit(&RunEvent::Request {
            error: None,
            exchange: None,
        });
        f.settle().await;

        let log = f.log.lock().unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].prompt, "Run paused on request");
        assert_eq!(log[1].initial, 0);
        assert!(f.reporter.network().latest().is_some());
    }

    #[tokio::test]
    async fn test_variable_change_detector() {
        // arm variable change on start; then abort on the change break
        let f = fixture(vec![4, 8], false);
        f.start();
        f.settle().await;

        f.bus.emit(&item());
        f.settle().await;
        assert_eq!(f.log.lock().unwrap().len(), 1, "no change, no break");

        f.env.set("token", "xyz");
        f.bus.emit(&item());
        f.settle().await;
        f.env.set("token", "again");
        f.bus.emit(&item());
        f.settle().await;

        let log = f.log.lock().unwrap();
        assert_eq!(log.len(), 2, "detector tears down after firing");
        assert_eq!(log[1].prompt, "Run paused on change of variable");
        assert_eq!(f.host.aborts.load(Ordering::SeqCst), 1);
        assert_eq!(f.bus.listener_count(EventKind::Item), 0);
    }

    #[tokio::test]
    async fn test_next_request_change_tears_down_both_listeners() {
        let f = fixture(vec![5, 0], false);
        f.start();
        f.settle().await;
        assert_eq!(f.bus.listener_count(EventKind::Test), 1);

        f.bus.emit(&item());
        f.settle().await;
        assert_eq!(f.log.lock().unwrap().len(), 1);

        f.bus.emit(&RunEvent::Test {
            error: None,
            executions: vec![ScriptExecution {
                next_request: Some("Profile".to_string()),
            }],
        });
        f.bus.emit(&item());
        f.settle().await;

        let log = f.log.lock().unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].prompt, "Run paused on change of execution order");
        assert_eq!(f.bus.listener_count(EventKind::Test), 0);
        assert_eq!(f.bus.listener_count(EventKind::Item), 0);
    }

    #[tokio::test]
    async fn test_inspect_stays_paused() {
        let f = fixture(vec![6, 7, 0], false);
        f.start();
        f.settle().await;

        let log = f.log.lock().unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log[1].initial, 6);
        assert_eq!(log[2].initial, 7);
        let rows = f.reporter.variable_rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].scope, ENVIRONMENT);
    }

    #[tokio::test]
    async fn test_dropping_reporter_releases_its_state() {
        // arm the variable change detector on start and resume
        let f = fixture(vec![4], false);
        f.start();
        f.settle().await;
        assert_eq!(f.bus.listener_count(EventKind::Item), 1);

        let shared = Arc::downgrade(&f.reporter.shared);
        let Fixture {
            bus, reporter, env, log, ..
        } = f;
        drop(reporter);
        assert!(shared.upgrade().is_none());

        // Listeners left on the bus outlive the reporter but stay inert
        env.set("token", "xyz");
        bus.emit(&item());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(log.lock().unwrap().len(), 1);

        let weak_bus = Arc::downgrade(&bus);
        drop(bus);
        assert!(weak_bus.upgrade().is_none());
    }

    #[tokio::test]
    async fn test_end_of_run_ignores_non_final_iterations() {
        let f = fixture(vec![3, 0], false);
        f.start();
        f.settle().await;

        f.bus.emit(&RunEvent::Iteration {
            iteration: 0,
            eof: false,
            error: None,
        });
        f.settle().await;
        assert_eq!(f.log.lock().unwrap().len(), 1);

        f.bus.emit(&RunEvent::Iteration {
            iteration: 1,
            eof: true,
            error: None,
        });
        f.settle().await;
        let log = f.log.lock().unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].prompt, "Run paused on end of run");
    }
}
