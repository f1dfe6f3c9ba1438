//! Append-only migration journal.
//!
//! Records the outcome of every record the migration visits. Entries name
//! the collection, record id, outcome and affected fields, never values.
//! Supports pluggable sinks for forwarding entries to a file or elsewhere.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FieldsealError;
use crate::model::{Collection, SensitiveField};

/// How the migration left one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOutcome {
    /// Every present field was already an envelope, or none was present.
    Unchanged,
    /// At least one field was encrypted and written back.
    Rewritten,
    /// Encryption or the write failed; the record keeps its old values.
    Failed,
}

/// A sink that receives journal entries.
pub trait JournalSink: Send {
    fn append(&mut self, entry: &JournalEntry);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub collection: Collection,
    pub record_id: String,
    pub outcome: RecordOutcome,
    /// Fields encrypted (or that would have been, for failures and dry runs).
    pub fields: Vec<SensitiveField>,
    /// Error kind for `Failed` entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub dry_run: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Default)]
pub struct MigrationJournal {
    entries: Vec<JournalEntry>,
    forward_sinks: Vec<Box<dyn JournalSink>>,
}

impl std::fmt::Debug for MigrationJournal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationJournal")
            .field("entries", &self.entries.len())
            .field("forward_sinks", &self.forward_sinks.len())
            .finish()
    }
}

impl MigrationJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink to receive a copy of every entry.
    pub fn add_forward_sink(&mut self, sink: Box<dyn JournalSink>) {
        self.forward_sinks.push(sink);
    }

    pub fn append(&mut self, entry: JournalEntry) {
        for sink in self.forward_sinks.iter_mut() {
            sink.append(&entry);
        }
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, JournalEntry> {
        self.entries.iter()
    }
}

// ---------------------------------------------------------------------------
// Built-in sink: file
// ---------------------------------------------------------------------------

/// Writes entries as JSON lines to a file, appending if it exists.
pub struct FileJournalSink {
    file: std::fs::File,
}

impl FileJournalSink {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, FieldsealError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file })
    }
}

impl JournalSink for FileJournalSink {
    fn append(&mut self, entry: &JournalEntry) {
        let line = match serde_json::to_string(entry) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "could not serialise journal entry");
                return;
            }
        };
        if let Err(e) = writeln!(self.file, "{line}").and_then(|_| self.file.flush()) {
            tracing::warn!(error = %e, "could not write journal entry");
        }
    }
}
