//! Key-based diff between current and desired snapshots.

use std::collections::{HashMap, HashSet};

use crate::types::{DiffResult, Snapshot, VariableRecord, VariableUpdate};

/// Compute the changes that turn `current` into `desired`.
///
/// Keys are compared case-sensitively and values by exact string equality.
/// Output order follows the input snapshots: additions and updates in
/// `desired` order, deletions in `current` order. Should a snapshot repeat
/// a key, its last record wins and the key is emitted once.
pub fn diff(current: &Snapshot, desired: &Snapshot) -> DiffResult {
    let current_by_key = index_by_key(current);
    let desired_by_key = index_by_key(desired);

    let mut result = DiffResult::default();
    let mut seen = HashSet::new();

    for key in desired.keys() {
        if !seen.insert(key) {
            continue;
        }
        let wanted = desired_by_key[key];
        match current_by_key.get(key) {
            None => result.to_add.push(wanted.clone()),
            Some(existing) if existing.value != wanted.value => {
                result.to_update.push(VariableUpdate {
                    key: wanted.key.clone(),
                    old_value: existing.value.clone(),
                    new_value: wanted.value.clone(),
                });
            }
            Some(_) => {}
        }
    }

    seen.clear();
    for key in current.keys() {
        if !seen.insert(key) || desired_by_key.contains_key(key) {
            continue;
        }
        result.to_delete.push(current_by_key[key].clone());
    }

    result
}

fn index_by_key(snapshot: &Snapshot) -> HashMap<&str, &VariableRecord> {
    snapshot.iter().map(|r| (r.key.as_str(), r)).collect()
}
