//! In-memory session history.
//!
//! Single writer (whoever drives the session), newest entry first, gone
//! when the process exits.

use crate::output::AnalysisOutput;
use crate::pipeline::structure::ResponseBlock;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One completed submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: u64,
    pub prompt_text: String,
    /// Name of the attached file, if there was one.
    pub file_name: Option<String>,
    pub response_text: String,
    pub response_blocks: Vec<ResponseBlock>,
    pub timestamp: DateTime<Utc>,
}

/// Append-only list of entries, most recent first.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<HistoryEntry>,
    next_id: u64,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished submission and return its entry.
    pub fn record(&mut self, output: &AnalysisOutput) -> &HistoryEntry {
        self.next_id += 1;
        let entry = HistoryEntry {
            id: self.next_id,
            prompt_text: output.prompt.clone(),
            file_name: output.file.as_ref().map(|f| f.name.clone()),
            response_text: output.response_text.clone(),
            response_blocks: output.blocks.clone(),
            timestamp: Utc::now(),
        };
        self.entries.insert(0, entry);
        &self.entries[0]
    }

    /// Entries, newest first.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.first()
    }

    pub fn get(&self, id: u64) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry. Ids keep increasing afterwards.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
