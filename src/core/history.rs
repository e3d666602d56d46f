use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One submitted command, as typed after the `<` marker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub index: usize,
    pub raw_text: String,
}

/// Append-only record of the commands sent during a session
#[derive(Debug, Default, Clone)]
pub struct CommandHistory {
    entries: Vec<HistoryEntry>,
}

impl CommandHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `raw_text` and return its index
    pub fn append(&mut self, raw_text: impl Into<String>) -> usize {
        let index = self.entries.len();
        self.entries.push(HistoryEntry {
            index,
            raw_text: raw_text.into(),
        });
        index
    }

    /// Entries in the order they were appended
    pub fn list(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Export history to JSON
    pub fn export_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.entries).context("Failed to serialize command history")
    }
}
