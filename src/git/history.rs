//! Divergence between the edit branch and trunk
//!
//! This is an approximate merge-base scan, not a merge-base computation.
//! Each history is walked newest to oldest and the walk stops at the first
//! commit whose hash appears anywhere in the other history; everything
//! visited before that point counts as additional. It assumes linear,
//! non-rewritten history and will misreport after rebases.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::LogEntry;

/// A commit as reported to the editor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub hash: String,
    #[serde(rename = "date", with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,
    pub message: String,
    /// Set on the commit where the scan found the other branch
    #[serde(rename = "master")]
    pub shared_with_other_branch: bool,
}

impl From<LogEntry> for HistoryEntry {
    fn from(entry: LogEntry) -> Self {
        Self {
            hash: entry.hash,
            timestamp: DateTime::from_timestamp(entry.timestamp, 0).unwrap_or_default(),
            message: entry.subject,
            shared_with_other_branch: false,
        }
    }
}

/// Both annotated histories and the commits unique to each side
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Divergence {
    #[serde(rename = "history")]
    pub editor_history: Vec<HistoryEntry>,
    #[serde(rename = "historyMaster")]
    pub trunk_history: Vec<HistoryEntry>,
    #[serde(rename = "editorAdditional")]
    pub editor_additional_count: usize,
    #[serde(rename = "masterAdditional")]
    pub trunk_additional_count: usize,
}

impl Divergence {
    /// Compare two newest-first histories
    pub fn analyze(editor: Vec<LogEntry>, trunk: Vec<LogEntry>) -> Self {
        let editor_hashes: HashSet<String> = editor.iter().map(|e| e.hash.clone()).collect();
        let trunk_hashes: HashSet<String> = trunk.iter().map(|e| e.hash.clone()).collect();

        let mut editor_history: Vec<HistoryEntry> = editor.into_iter().map(Into::into).collect();
        let mut trunk_history: Vec<HistoryEntry> = trunk.into_iter().map(Into::into).collect();

        let editor_additional_count = scan_until_shared(&mut editor_history, &trunk_hashes);
        let trunk_additional_count = scan_until_shared(&mut trunk_history, &editor_hashes);

        Self {
            editor_history,
            trunk_history,
            editor_additional_count,
            trunk_additional_count,
        }
    }

    /// Trunk has nothing the edit branch lacks
    pub fn trunk_synced(&self) -> bool {
        self.trunk_additional_count == 0
    }

    /// Edit branch has nothing trunk lacks
    pub fn editor_synced(&self) -> bool {
        self.editor_additional_count == 0
    }
}

/// Mark the first entry present in `other` and return how many precede it
fn scan_until_shared(history: &mut [HistoryEntry], other: &HashSet<String>) -> usize {
    for (index, entry) in history.iter_mut().enumerate() {
        if other.contains(&entry.hash) {
            entry.shared_with_other_branch = true;
            return index;
        }
    }
    history.len()
}
