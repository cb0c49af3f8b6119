//! Change Ledger: append-only JSONL audit trail of edits.
//!
//! Each entry is one line, written with a single `write_all` on an
//! append-mode handle and synced before `append` returns. There is no update
//! or delete; corrections are new entries.

use crate::core::error::ContextNetError;
use crate::core::schemas;
use crate::core::time;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipRecord {
    pub source: String,
    pub target: String,
    pub rel_type: String,
}

impl RelationshipRecord {
    pub fn new(source: &str, target: &str, rel_type: &str) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            rel_type: rel_type.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeLedgerEntry {
    pub entry_id: String,
    pub date: String,
    pub actor: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub nodes_modified: Vec<String>,
    #[serde(default)]
    pub relationships_added: Vec<RelationshipRecord>,
    #[serde(default)]
    pub relationships_modified: Vec<RelationshipRecord>,
    #[serde(default)]
    pub follow_ups: Vec<String>,
}

impl ChangeLedgerEntry {
    pub fn new(actor: &str, summary: &str) -> Self {
        Self {
            entry_id: time::new_entry_id(),
            date: time::today(),
            actor: actor.to_string(),
            summary: summary.to_string(),
            nodes_modified: Vec::new(),
            relationships_added: Vec::new(),
            relationships_modified: Vec::new(),
            follow_ups: Vec::new(),
        }
    }

    pub fn with_node(mut self, id: &str) -> Self {
        if !self.nodes_modified.iter().any(|n| n == id) {
            self.nodes_modified.push(id.to_string());
        }
        self
    }

    pub fn with_relationship_added(mut self, record: RelationshipRecord) -> Self {
        self.relationships_added.push(record);
        self
    }

    pub fn with_relationship_modified(mut self, record: RelationshipRecord) -> Self {
        self.relationships_modified.push(record);
        self
    }

    pub fn with_follow_up(mut self, follow_up: &str) -> Self {
        self.follow_ups.push(follow_up.to_string());
        self
    }
}

static LEDGER_LOCK: Mutex<()> = Mutex::new(());

#[derive(Debug, Clone)]
pub struct ChangeLedger {
    path: PathBuf,
}

impl ChangeLedger {
    pub fn open(location: &Path) -> Self {
        Self {
            path: location.join(schemas::LEDGER_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: &ChangeLedgerEntry) -> Result<(), ContextNetError> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let _guard = LEDGER_LOCK
            .lock()
            .map_err(|_| ContextNetError::LedgerError("ledger lock poisoned".to_string()))?;
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                ContextNetError::LedgerError(format!("open {}: {}", self.path.display(), e))
            })?;
        f.write_all(line.as_bytes())
            .and_then(|_| f.sync_data())
            .map_err(|e| {
                ContextNetError::LedgerError(format!("append {}: {}", self.path.display(), e))
            })?;
        tracing::debug!(entry_id = %entry.entry_id, "appended ledger entry");
        Ok(())
    }

    /// Entries in append order. A line that does not parse is an error, never skipped.
    pub fn read_all(&self) -> Result<Vec<ChangeLedgerEntry>, ContextNetError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let f = fs::File::open(&self.path).map_err(ContextNetError::IoError)?;
        let mut entries = Vec::new();
        for (idx, line) in BufReader::new(f).lines().enumerate() {
            let line = line.map_err(ContextNetError::IoError)?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: ChangeLedgerEntry = serde_json::from_str(&line).map_err(|e| {
                ContextNetError::LedgerError(format!(
                    "{} line {}: {}",
                    self.path.display(),
                    idx + 1,
                    e
                ))
            })?;
            entries.push(entry);
        }
        Ok(entries)
    }
}
