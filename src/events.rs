//! Run lifecycle events and the listener registry
//!
//! The run emits [`RunEvent`]s; actions arm listeners with `on`/`once` and
//! remove them with `off`. Listeners that must disappear together are
//! registered through a [`SubscriptionGroup`].

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::host::{NetworkExchange, RunHandle, ScriptExecution};

/// Lifecycle event emitted by the run
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// Run started. `run` is absent when the engine cannot expose its
    /// control surface.
    Start {
        error: Option<String>,
        run: Option<RunHandle>,
    },
    /// An iteration is about to start
    BeforeIteration { iteration: usize },
    /// An iteration finished; `eof` marks the last one
    Iteration {
        iteration: usize,
        eof: bool,
        error: Option<String>,
    },
    /// An item (request plus its scripts) finished
    Item { name: String },
    /// A request was sent and its response received
    Request {
        error: Option<String>,
        exchange: Option<NetworkExchange>,
    },
    /// Test scripts of an item were executed
    Test {
        error: Option<String>,
        executions: Vec<ScriptExecution>,
    },
    /// A script wrote to the console
    Console { level: String, message: String },
    /// The run finished
    Done { error: Option<String> },
}

/// Discriminant used to subscribe to a kind of event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Start,
    BeforeIteration,
    Iteration,
    Item,
    Request,
    Test,
    Console,
    Done,
}

impl RunEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Start { .. } => EventKind::Start,
            Self::BeforeIteration { .. } => EventKind::BeforeIteration,
            Self::Iteration { .. } => EventKind::Iteration,
            Self::Item { .. } => EventKind::Item,
            Self::Request { .. } => EventKind::Request,
            Self::Test { .. } => EventKind::Test,
            Self::Console { .. } => EventKind::Console,
            Self::Done { .. } => EventKind::Done,
        }
    }

    /// Failure carried by the event, if any
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Start { error, .. }
            | Self::Iteration { error, .. }
            | Self::Request { error, .. }
            | Self::Test { error, .. }
            | Self::Done { error } => error.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::BeforeIteration => "beforeIteration",
            Self::Iteration => "iteration",
            Self::Item => "item",
            Self::Request => "request",
            Self::Test => "test",
            Self::Console => "console",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Identifies one registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type Handler = Arc<dyn Fn(&RunEvent) + Send + Sync>;

struct Listener {
    id: SubscriptionId,
    kind: EventKind,
    once: bool,
    handler: Handler,
}

/// Listener registry for run events
#[derive(Default)]
pub struct EventBus {
    listeners: Mutex<Vec<Listener>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Call `handler` for every event of `kind` until removed with `off`
    pub fn on<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&RunEvent) + Send + Sync + 'static,
    {
        self.register(kind, false, Arc::new(handler))
    }

    /// Call `handler` for the next event of `kind` only
    pub fn once<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&RunEvent) + Send + Sync + 'static,
    {
        self.register(kind, true, Arc::new(handler))
    }

    /// Remove a listener. Returns false if it was already gone.
    pub fn off(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }

    /// Dispatch an event to its listeners
    ///
    /// The matching listeners are snapshotted first and one-shot listeners
    /// are removed before any handler runs, so handlers are free to
    /// subscribe or unsubscribe.
    pub fn emit(&self, event: &RunEvent) {
        let kind = event.kind();
        let snapshot: Vec<(SubscriptionId, bool, Handler)> = {
            let mut listeners = self.lock();
            let matching = listeners
                .iter()
                .filter(|l| l.kind == kind)
                .map(|l| (l.id, l.once, Arc::clone(&l.handler)))
                .collect();
            listeners.retain(|l| !(l.once && l.kind == kind));
            matching
        };

        tracing::trace!(event = %kind, listeners = snapshot.len(), "Dispatching run event");

        for (id, once, handler) in snapshot {
            // An earlier handler in this dispatch may have removed this one
            if !once && !self.is_registered(id) {
                continue;
            }
            handler(event);
        }
    }

    pub fn is_registered(&self, id: SubscriptionId) -> bool {
        self.lock().iter().any(|l| l.id == id)
    }

    /// Number of listeners for `kind`
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.lock().iter().filter(|l| l.kind == kind).count()
    }

    fn register(&self, kind: EventKind, once: bool, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push(Listener {
            id,
            kind,
            once,
            handler,
        });
        id
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Listener>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Listeners armed together and torn down together
///
/// A group fires at most once: the first handler that calls [`fire`]
/// disarms it and removes every listener in the group. Handlers of a
/// disarmed group are never invoked again.
///
/// The group holds the bus weakly; listeners registered on the bus own the
/// group, so a strong handle here would keep both alive forever.
///
/// [`fire`]: SubscriptionGroup::fire
pub struct SubscriptionGroup {
    bus: Weak<EventBus>,
    ids: Mutex<Vec<SubscriptionId>>,
    armed: AtomicBool,
}

impl SubscriptionGroup {
    pub fn new(bus: &Arc<EventBus>) -> Arc<Self> {
        Arc::new(Self {
            bus: Arc::downgrade(bus),
            ids: Mutex::new(Vec::new()),
            armed: AtomicBool::new(true),
        })
    }

    /// Add a listener to the group
    pub fn on<F>(self: &Arc<Self>, kind: EventKind, handler: F)
    where
        F: Fn(&SubscriptionGroup, &RunEvent) + Send + Sync + 'static,
    {
        let Some(bus) = self.bus.upgrade() else {
            return;
        };
        let group = Arc::clone(self);
        let id = bus.on(kind, move |event| {
            if group.is_armed() {
                handler(&*group, event);
            }
        });
        self.ids.lock().unwrap_or_else(|e| e.into_inner()).push(id);
    }

    /// Disarm and tear down. Returns true only for the first caller.
    pub fn fire(&self) -> bool {
        let first = self.armed.swap(false, Ordering::SeqCst);
        if first {
            self.teardown();
        }
        first
    }

    /// Remove every listener of the group
    pub fn teardown(&self) {
        self.armed.store(false, Ordering::SeqCst);
        let ids = std::mem::take(&mut *self.ids.lock().unwrap_or_else(|e| e.into_inner()));
        let Some(bus) = self.bus.upgrade() else {
            return;
        };
        for id in ids {
            bus.off(id);
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }
}
