//! Variable change tracking across named scopes
//!
//! Each attached scope gets its own [`ScopeTracker`] and shadow store, so
//! scopes never influence each other's reports. The tracker holds shared
//! references to the run's scopes and only reads them.

mod diff;
mod scope;
mod shadow;

use std::sync::Arc;

use serde::Serialize;

use crate::common::Result;

pub use diff::{DiffRecord, DiffReport, DiffStatus, ScopeTracker};
pub use scope::{Variable, VariableId, VariableList, VariableScope};
pub use shadow::{ShadowEntry, ShadowStore};

/// Current key/value of one variable, tagged with its scope name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableRow {
    pub key: String,
    pub value: String,
    pub scope: String,
}

/// Tracks several named scopes independently
#[derive(Default)]
pub struct VariableTracker {
    /// Attached scopes in attachment order
    scopes: Vec<ScopeTracker>,
}

impl VariableTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a scope under `name`
    ///
    /// Re-attaching an existing name replaces the scope and starts from an
    /// empty shadow store. With `baseline` set the scope is tracked once
    /// right away and that baseline report, where every existing variable
    /// shows up as added, is handed back to the caller.
    pub fn attach(
        &mut self,
        name: &str,
        scope: Arc<dyn VariableScope>,
        baseline: bool,
    ) -> Result<Option<DiffReport>> {
        let tracker = ScopeTracker::new(name, scope);
        match self.position(name) {
            Some(pos) => {
                tracing::debug!(scope = name, "Re-attaching scope with fresh shadows");
                self.scopes[pos] = tracker;
            }
            None => {
                tracing::debug!(scope = name, "Attaching scope");
                self.scopes.push(tracker);
            }
        }

        if baseline {
            return self.track(name);
        }
        Ok(None)
    }

    /// Stop tracking `name` and drop its shadows. Unknown names are ignored.
    pub fn detach(&mut self, name: &str) {
        if let Some(pos) = self.position(name) {
            self.scopes.remove(pos);
            tracing::debug!(scope = name, "Detached scope");
        }
    }

    /// Diff the named scope against its shadows
    ///
    /// Returns `Ok(None)` when no scope is attached under `name`.
    pub fn track(&mut self, name: &str) -> Result<Option<DiffReport>> {
        match self.scopes.iter_mut().find(|s| s.name() == name) {
            Some(tracker) => tracker.track().map(Some),
            None => {
                tracing::debug!(scope = name, "Track requested for unattached scope");
                Ok(None)
            }
        }
    }

    /// Track every named scope, skipping unattached ones
    pub fn track_all(&mut self, names: &[&str]) -> Result<Vec<DiffReport>> {
        let mut reports = Vec::with_capacity(names.len());
        for name in names {
            if let Some(report) = self.track(name)? {
                reports.push(report);
            }
        }
        Ok(reports)
    }

    /// Current rows of the named scope, without touching its shadows
    pub fn list(&self, name: &str) -> Result<Option<Vec<VariableRow>>> {
        let Some(tracker) = self.scopes.iter().find(|s| s.name() == name) else {
            return Ok(None);
        };

        let rows = tracker
            .scope()
            .members()?
            .into_iter()
            .map(|var| VariableRow {
                key: var.key,
                value: var.value,
                scope: name.to_string(),
            })
            .collect();
        Ok(Some(rows))
    }

    pub fn is_attached(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Attached scope names in attachment order
    pub fn scope_names(&self) -> Vec<&str> {
        self.scopes.iter().map(|s| s.name()).collect()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.scopes.iter().position(|s| s.name() == name)
    }
}

/// True if any report in the set carries a change
pub fn any_modified(reports: &[DiffReport]) -> bool {
    reports.iter().any(DiffReport::modified)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_lifecycle() {
        let env = VariableList::from_pairs([("a", "1")]);
        let id = env.find("a").unwrap().id;
        let mut trk = VariableTracker::new();

        let baseline = trk.attach("Environment", Arc::new(env.clone()), true).unwrap().unwrap();
        assert_eq!(baseline.len(), 1);
        let r = &baseline.records[0];
        assert_eq!(
            (r.status, r.key.as_str(), r.value.as_str(), r.scope.as_str()),
            (DiffStatus::Added, "a", "1", "Environment")
        );

        env.update(id, "2").unwrap();
        let report = trk.track("Environment").unwrap().unwrap();
        assert_eq!(report.len(), 1);
        let r = &report.records[0];
        assert_eq!(
            (r.status, r.key.as_str(), r.value.as_str(), r.scope.as_str()),
            (DiffStatus::Updated, "a", "2", "Environment")
        );

        env.remove(id);
        let report = trk.track("Environment").unwrap().unwrap();
        assert_eq!(report.len(), 1);
        let r = &report.records[0];
        assert_eq!(
            (r.status, r.key.as_str(), r.value.as_str(), r.scope.as_str()),
            (DiffStatus::Deleted, "a", "2", "Environment")
        );

        let report = trk.track("Environment").unwrap().unwrap();
        assert!(report.is_empty());
        assert!(!report.modified());
    }

    #[test]
    fn test_attach_without_baseline_defers_first_report() {
        let env = VariableList::from_pairs([("a", "1")]);
        let mut trk = VariableTracker::new();

        assert!(trk.attach("Environment", Arc::new(env), false).unwrap().is_none());
        let first = trk.track("Environment").unwrap().unwrap();
        assert!(first.added);
    }

    #[test]
    fn test_unknown_scope_is_not_attached() {
        let mut trk = VariableTracker::new();
        assert!(trk.track("Nope").unwrap().is_none());
        assert!(trk.list("Nope").unwrap().is_none());
        trk.detach("Nope");
    }

    #[test]
    fn test_scopes_are_independent() {
        let col = VariableList::from_pairs([("x", "1")]);
        let glb = VariableList::from_pairs([("x", "1")]);
        let mut trk = VariableTracker::new();
        trk.attach("Collection", Arc::new(col.clone()), true).unwrap();
        trk.attach("Global", Arc::new(glb.clone()), true).unwrap();

        glb.set("x", "2");
        let reports = trk.track_all(&["Collection", "Global"]).unwrap();
        assert!(!reports[0].modified());
        assert!(reports[1].modified());
        assert!(any_modified(&reports));
    }

    #[test]
    fn test_detach_drops_shadows() {
        let env = VariableList::from_pairs([("a", "1")]);
        let mut trk = VariableTracker::new();
        trk.attach("Environment", Arc::new(env.clone()), true).unwrap();
        trk.detach("Environment");
        assert!(!trk.is_attached("Environment"));

        let again = trk.attach("Environment", Arc::new(env), true).unwrap().unwrap();
        assert!(again.added, "fresh attachment starts without shadows");
    }

    #[test]
    fn test_list_does_not_consume_changes() {
        let env = VariableList::from_pairs([("a", "1")]);
        let mut trk = VariableTracker::new();
        trk.attach("Environment", Arc::new(env.clone()), true).unwrap();

        env.set("a", "2");
        let rows = trk.list("Environment").unwrap().unwrap();
        assert_eq!(rows[0].value, "2");
        assert!(trk.track("Environment").unwrap().unwrap().updated);
    }

    #[test]
    fn test_scope_names_keep_attachment_order() {
        let mut trk = VariableTracker::new();
        for name in ["Collection", "Environment", "Global"] {
            trk.attach(name, Arc::new(VariableList::new()), false).unwrap();
        }
        assert_eq!(trk.scope_names(), vec!["Collection", "Environment", "Global"]);
    }
}
