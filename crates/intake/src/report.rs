//! Collaborators told about successful moves.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

/// Receives one call per successful move.
pub trait Statistics: Send + Sync {
    fn record_file(&self, label: &str, category: &str, size: u64);
}

/// Receives one call per successful move.
pub trait History: Send + Sync {
    fn record_move(&self, source: &Path, destination: &Path, label: &str, category: &str);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub files: u64,
    pub bytes: u64,
}

/// In-memory per label and category tally.
#[derive(Debug, Default)]
pub struct Tally {
    entries: Mutex<BTreeMap<(String, String), Totals>>,
}
impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Totals keyed by `(label, category)`.
    pub fn snapshot(&self) -> BTreeMap<(String, String), Totals> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    pub fn total(&self) -> Totals {
        self.snapshot().values().fold(Totals::default(), |acc, t| Totals {
            files: acc.files + t.files,
            bytes: acc.bytes + t.bytes,
        })
    }

    pub fn log_summary(&self) {
        let total = self.total();
        tracing::info!(files = total.files, bytes = total.bytes, "Session summary");
        for ((label, category), totals) in self.snapshot() {
            tracing::info!(%label, %category, files = totals.files, bytes = totals.bytes, "Filed");
        }
    }
}
impl Statistics for Tally {
    fn record_file(&self, label: &str, category: &str, size: u64) {
        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let totals = entries.entry((label.to_string(), category.to_string())).or_default();
        totals.files += 1;
        totals.bytes += size;
    }
}

/// Writes every move as a structured event on the `tagdrop::history` target,
/// so a subscriber can route history wherever it likes.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingHistory;
impl History for TracingHistory {
    fn record_move(&self, source: &Path, destination: &Path, label: &str, category: &str) {
        tracing::info!(
            target: "tagdrop::history",
            source = %source.display(),
            destination = %destination.display(),
            label,
            category,
            "moved"
        );
    }
}
