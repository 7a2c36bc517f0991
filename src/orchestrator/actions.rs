//! Operator actions offered while the run is paused

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::Serialize;

use crate::common::Error;

/// How an action finished
#[derive(Debug)]
pub struct ActionOutcome {
    /// Failure to report; never changes the resume decision
    pub error: Option<Error>,
    /// Resume the run (`true`) or present the menu again (`false`)
    pub resume: bool,
}

impl ActionOutcome {
    /// Finish the pause cycle and resume the run
    pub fn continue_run() -> Self {
        Self {
            error: None,
            resume: true,
        }
    }

    /// Stay paused and present the menu again
    pub fn stay_paused() -> Self {
        Self {
            error: None,
            resume: false,
        }
    }

    /// Report a failure alongside an explicit resume decision
    pub fn failed(error: Error, resume: bool) -> Self {
        Self {
            error: Some(error),
            resume,
        }
    }
}

/// Work performed when an action is selected
///
/// Implemented for any `Fn() -> impl Future<Output = ActionOutcome>`, so
/// async closures can be registered directly.
pub trait Effect: Send + Sync {
    fn run(&self) -> BoxFuture<'static, ActionOutcome>;
}

impl<F, Fut> Effect for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = ActionOutcome> + Send + 'static,
{
    fn run(&self) -> BoxFuture<'static, ActionOutcome> {
        Box::pin((self)())
    }
}

/// A registered action
#[derive(Clone)]
pub struct Action {
    pub title: String,
    /// Position in the registry, fixed at registration
    pub index: usize,
    pub effect: Arc<dyn Effect>,
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("title", &self.title)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

/// Title and position of an action, as shown in the menu
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionInfo {
    pub index: usize,
    pub title: String,
}

/// Ordered action list; registration order is display order
#[derive(Default)]
pub struct ActionRegistry {
    actions: Vec<Action>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an action and return its index
    pub fn add(&mut self, title: impl Into<String>, effect: Arc<dyn Effect>) -> usize {
        let index = self.actions.len();
        self.actions.push(Action {
            title: title.into(),
            index,
            effect,
        });
        index
    }

    pub fn get(&self, index: usize) -> Option<&Action> {
        self.actions.get(index)
    }

    /// Titles and indices in display order
    pub fn infos(&self) -> Vec<ActionInfo> {
        self.actions
            .iter()
            .map(|a| ActionInfo {
                index: a.index,
                title: a.title.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Arc<dyn Effect> {
        Arc::new(|| async { ActionOutcome::continue_run() })
    }

    #[test]
    fn test_indices_follow_registration_order() {
        let mut registry = ActionRegistry::new();
        assert_eq!(registry.add("X", noop()), 0);
        assert_eq!(registry.add("Y", noop()), 1);
        assert_eq!(registry.add("Z", noop()), 2);

        let titles: Vec<_> = registry.infos().into_iter().map(|i| i.title).collect();
        assert_eq!(titles, vec!["X", "Y", "Z"]);
        assert_eq!(registry.get(1).unwrap().index, 1);
        assert!(registry.get(3).is_none());
    }

    #[tokio::test]
    async fn test_closure_effect_runs() {
        let effect: Arc<dyn Effect> = Arc::new(|| async { ActionOutcome::stay_paused() });
        let outcome = effect.run().await;
        assert!(!outcome.resume);
        assert!(outcome.error.is_none());
    }
}
