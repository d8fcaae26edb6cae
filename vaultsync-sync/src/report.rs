//! Human-readable diff report.
//!
//! ```text
//! + NEW_KEY = value
//! ~ CHANGED: old -> new
//! - REMOVED (was value)
//! 3 changes: 1 added, 1 updated, 1 deleted
//! ```

use std::fmt;

use vaultsync_core::DiffResult;

const MASK: &str = "***";

/// Display adapter over a [`DiffResult`].
pub struct DiffReport<'a> {
    diff: &'a DiffResult,
    mask_values: bool,
}

impl<'a> DiffReport<'a> {
    pub fn new(diff: &'a DiffResult, mask_values: bool) -> Self {
        Self { diff, mask_values }
    }

    /// One line per changed key, then a summary line.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.diff.change_count() + 1);
        for record in &self.diff.to_add {
            lines.push(format!("+ {} = {}", record.key, self.value(&record.value)));
        }
        for update in &self.diff.to_update {
            lines.push(format!(
                "~ {}: {} -> {}",
                update.key,
                self.value(&update.old_value),
                self.value(&update.new_value)
            ));
        }
        for record in &self.diff.to_delete {
            lines.push(format!("- {} (was {})", record.key, self.value(&record.value)));
        }
        lines.push(self.summary());
        lines
    }

    pub fn summary(&self) -> String {
        if self.diff.is_empty() {
            return "no changes".to_string();
        }
        let total = self.diff.change_count();
        format!(
            "{total} change{}: {} added, {} updated, {} deleted",
            if total == 1 { "" } else { "s" },
            self.diff.to_add.len(),
            self.diff.to_update.len(),
            self.diff.to_delete.len()
        )
    }

    fn value<'v>(&self, value: &'v str) -> &'v str {
        if self.mask_values {
            MASK
        } else {
            value
        }
    }
}

impl fmt::Display for DiffReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.lines() {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}
