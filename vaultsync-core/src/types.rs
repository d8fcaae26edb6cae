//! Domain types for variable reconciliation.
//!
//! A [`Snapshot`] is the full set of variables on one side of a sync
//! (vault-side desired state or platform-side current state). Records are
//! matched across snapshots by key only; [`VariableId`]s are local to the
//! snapshot that produced them.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Snapshot-local identifier of a variable record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariableId(pub String);

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for VariableId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VariableId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<usize> for VariableId {
    fn from(n: usize) -> Self {
        Self(n.to_string())
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A single environment variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableRecord {
    pub id: VariableId,
    pub key: String,
    pub value: String,
}

impl VariableRecord {
    pub fn new(id: impl Into<VariableId>, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A key present on both sides whose value differs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableUpdate {
    pub key: String,
    pub old_value: String,
    pub new_value: String,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Point-in-time set of variables, in materialisation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    records: Vec<VariableRecord>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from key/value pairs, assigning ids `"1"`, `"2"`, …
    /// in iteration order.
    ///
    /// Callers are responsible for key uniqueness; the parser and the
    /// platform client both hand over already-deduplicated pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let records = pairs
            .into_iter()
            .enumerate()
            .map(|(idx, (key, value))| VariableRecord::new(idx + 1, key, value))
            .collect();
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VariableRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[VariableRecord] {
        &self.records
    }

    /// Look up a record by key (case-sensitive).
    pub fn get(&self, key: &str) -> Option<&VariableRecord> {
        self.records.iter().find(|r| r.key == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.key.as_str())
    }
}

impl FromIterator<VariableRecord> for Snapshot {
    fn from_iter<T: IntoIterator<Item = VariableRecord>>(iter: T) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Snapshot {
    type Item = VariableRecord;
    type IntoIter = std::vec::IntoIter<VariableRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a VariableRecord;
    type IntoIter = std::slice::Iter<'a, VariableRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

// ---------------------------------------------------------------------------
// Diff result
// ---------------------------------------------------------------------------

/// Changes needed to bring current state in line with desired state.
///
/// Every key appears in at most one of the three lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    pub to_add: Vec<VariableRecord>,
    pub to_update: Vec<VariableUpdate>,
    pub to_delete: Vec<VariableRecord>,
}

impl DiffResult {
    /// `true` when there is nothing to reconcile.
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }

    pub fn change_count(&self) -> usize {
        self.to_add.len() + self.to_update.len() + self.to_delete.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
