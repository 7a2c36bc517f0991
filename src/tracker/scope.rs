//! Variable scopes as seen by the tracker
//!
//! A scope is owned and mutated by the run. The tracker only ever asks it
//! for a snapshot of its members, so it needs nothing beyond
//! [`VariableScope::members`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::common::{Error, Result};

/// Process-wide counter for variable identities.
static NEXT_VARIABLE_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of one variable.
///
/// Survives edits of the key or value. A variable that is removed and then
/// created again gets a fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VariableId(u64);

impl VariableId {
    /// Allocate a new, never used identity
    pub fn next() -> Self {
        Self(NEXT_VARIABLE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A snapshot of one variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub id: VariableId,
    pub key: String,
    pub value: String,
}

/// Read access to an externally owned collection of variables
pub trait VariableScope: Send + Sync {
    /// Current members in scope order.
    ///
    /// Implementations that cannot produce an ordered sequence must fail
    /// with [`Error::ScopeContract`] rather than return an empty list.
    fn members(&self) -> Result<Vec<Variable>>;
}

/// Shared, mutable variable list
///
/// Cloning gives another handle to the same list. The run mutates it
/// through these methods; trackers read it through [`VariableScope`].
#[derive(Debug, Clone, Default)]
pub struct VariableList {
    inner: Arc<RwLock<Vec<Variable>>>,
}

impl VariableList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a list from key/value pairs, preserving their order
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let list = Self::new();
        for (key, value) in pairs {
            list.insert(key, value);
        }
        list
    }

    /// Append a new variable and return its identity
    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) -> VariableId {
        let id = VariableId::next();
        self.write().push(Variable {
            id,
            key: key.into(),
            value: value.into(),
        });
        id
    }

    /// Set the value of the first variable with `key`, creating it if absent
    pub fn set(&self, key: &str, value: impl Into<String>) -> VariableId {
        let value = value.into();
        let mut vars = self.write();
        if let Some(var) = vars.iter_mut().find(|v| v.key == key) {
            var.value = value;
            return var.id;
        }
        let id = VariableId::next();
        vars.push(Variable {
            id,
            key: key.to_string(),
            value,
        });
        id
    }

    /// Change the key of an existing variable, keeping its identity
    pub fn rename(&self, id: VariableId, key: impl Into<String>) -> Result<()> {
        let mut vars = self.write();
        let var = vars
            .iter_mut()
            .find(|v| v.id == id)
            .ok_or(Error::VariableNotFound(id.as_u64()))?;
        var.key = key.into();
        Ok(())
    }

    /// Change the value of an existing variable, keeping its identity
    pub fn update(&self, id: VariableId, value: impl Into<String>) -> Result<()> {
        let mut vars = self.write();
        let var = vars
            .iter_mut()
            .find(|v| v.id == id)
            .ok_or(Error::VariableNotFound(id.as_u64()))?;
        var.value = value.into();
        Ok(())
    }

    /// Remove a variable by identity, returning it if present
    pub fn remove(&self, id: VariableId) -> Option<Variable> {
        let mut vars = self.write();
        let pos = vars.iter().position(|v| v.id == id)?;
        Some(vars.remove(pos))
    }

    /// Remove the first variable with `key`
    pub fn unset(&self, key: &str) -> Option<Variable> {
        let id = self.find(key)?.id;
        self.remove(id)
    }

    /// Look up the first variable with `key`
    pub fn find(&self, key: &str) -> Option<Variable> {
        self.read().iter().find(|v| v.key == key).cloned()
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Variable>> {
        // A panicking writer cannot leave the Vec half-updated, so recover the guard.
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Variable>> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl VariableScope for VariableList {
    fn members(&self) -> Result<Vec<Variable>> {
        Ok(self.read().clone())
    }
}
