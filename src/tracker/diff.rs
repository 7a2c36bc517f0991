//! Change detection for a single scope
//!
//! Every `track()` compares the scope's current members against the shadow
//! copies taken on the previous call:
//!
//! 1. Members with a shadow are compared on key and value. A difference in
//!    either yields one `updated` record; the shadow is refreshed either way.
//! 2. Members without a shadow are `added` and get one.
//! 3. Shadows whose identity is gone are reported `deleted` with their last
//!    known key/value, then dropped.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::common::Result;

use super::scope::{VariableId, VariableScope};
use super::shadow::ShadowStore;

/// Kind of change reported for one variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffStatus {
    Added,
    Updated,
    Deleted,
}

impl fmt::Display for DiffStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => write!(f, "added"),
            Self::Updated => write!(f, "updated"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}

/// One change within a scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffRecord {
    pub status: DiffStatus,
    /// Current key (last known key for deletions)
    pub key: String,
    /// Current value (last known value for deletions)
    pub value: String,
    /// Scope name the variable belongs to
    pub scope: String,
    /// Old key, set only when an update changed the key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_key: Option<String>,
    /// Old value, set only when an update changed the value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_value: Option<String>,
}

impl DiffRecord {
    fn new(status: DiffStatus, key: &str, value: &str, scope: &str) -> Self {
        Self {
            status,
            key: key.to_string(),
            value: value.to_string(),
            scope: scope.to_string(),
            previous_key: None,
            previous_value: None,
        }
    }
}

/// Result of one `track()` call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffReport {
    pub scope: String,
    pub records: Vec<DiffRecord>,
    pub added: bool,
    pub updated: bool,
    pub deleted: bool,
}

impl DiffReport {
    fn empty(scope: &str) -> Self {
        Self {
            scope: scope.to_string(),
            ..Self::default()
        }
    }

    fn push(&mut self, record: DiffRecord) {
        match record.status {
            DiffStatus::Added => self.added = true,
            DiffStatus::Updated => self.updated = true,
            DiffStatus::Deleted => self.deleted = true,
        }
        self.records.push(record);
    }

    /// True when anything was added, updated or deleted
    pub fn modified(&self) -> bool {
        self.added || self.updated || self.deleted
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

/// Tracks one named scope against its private shadow store
pub struct ScopeTracker {
    name: String,
    scope: Arc<dyn VariableScope>,
    shadows: ShadowStore,
}

impl ScopeTracker {
    pub fn new(name: impl Into<String>, scope: Arc<dyn VariableScope>) -> Self {
        Self {
            name: name.into(),
            scope,
            shadows: ShadowStore::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> &Arc<dyn VariableScope> {
        &self.scope
    }

    /// Number of variables currently shadowed
    pub fn shadowed(&self) -> usize {
        self.shadows.len()
    }

    /// Diff the scope against the shadows and refresh them
    pub fn track(&mut self) -> Result<DiffReport> {
        let members = self.scope.members()?;
        let mut report = DiffReport::empty(&self.name);
        let mut present: HashSet<VariableId> = HashSet::with_capacity(members.len());

        for var in &members {
            present.insert(var.id);

            match self.shadows.get(var.id) {
                Some(shadow) => {
                    let key_changed = shadow.key != var.key;
                    let value_changed = shadow.value != var.value;

                    if key_changed || value_changed {
                        let mut record =
                            DiffRecord::new(DiffStatus::Updated, &var.key, &var.value, &self.name);
                        if key_changed {
                            record.previous_key = Some(shadow.key.clone());
                        }
                        if value_changed {
                            record.previous_value = Some(shadow.value.clone());
                        }
                        report.push(record);
                    }
                }
                None => {
                    report.push(DiffRecord::new(
                        DiffStatus::Added,
                        &var.key,
                        &var.value,
                        &self.name,
                    ));
                }
            }

            self.shadows.record(var.id, &var.key, &var.value);
        }

        for (_, gone) in self.shadows.evict_unless(|id| present.contains(&id)) {
            report.push(DiffRecord::new(
                DiffStatus::Deleted,
                &gone.key,
                &gone.value,
                &self.name,
            ));
        }

        tracing::trace!(
            scope = %self.name,
            changes = report.len(),
            shadowed = self.shadows.len(),
            "Tracked scope"
        );

        Ok(report)
    }
}
