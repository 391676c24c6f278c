//! Bounded, persistent generation history.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::constants::constants;
use crate::error::ScriptError;
use crate::prompt::{Mode, word_count};
use crate::storage::write_atomic;

/// One recorded generation. Immutable once created: the display timestamp
/// and word count are frozen at creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
  pub topic: String,
  pub mode: Mode,
  pub script_text: String,
  pub timestamp_display: String,
  pub word_count: usize,
}

impl HistoryEntry {
  pub fn new(topic: String, mode: Mode, script_text: String) -> Self {
    let timestamp_display = chrono::Local::now().format("%Y-%m-%d %H:%M").to_string();
    let word_count = word_count(&script_text);
    Self { topic, mode, script_text, timestamp_display, word_count }
  }
}

/// Newest-first log of recent generations, mirrored to a single JSON
/// file. Every mutation rewrites the whole file; the in-memory log is the
/// source of truth between writes.
pub struct HistoryStore {
  path: PathBuf,
  entries: Vec<HistoryEntry>,
}

impl HistoryStore {
  /// Open the store at `path`. A missing file starts an empty log;
  /// corruption is logged and discarded, never fatal.
  pub fn open(path: PathBuf) -> Self {
    let entries = match std::fs::read_to_string(&path) {
      Ok(raw) => match serde_json::from_str::<Vec<HistoryEntry>>(&raw) {
        Ok(entries) => {
          info!(count = entries.len(), "history loaded");
          entries
        }
        Err(e) => {
          warn!(path = %path.display(), err = %e, "history file is corrupt, starting empty");
          Vec::new()
        }
      },
      Err(_) => Vec::new(),
    };
    Self { path, entries }
  }

  pub fn entries(&self) -> &[HistoryEntry] {
    &self.entries
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Prepend an entry, evict the oldest beyond the cap, persist.
  pub fn add(&mut self, entry: HistoryEntry) -> Result<(), ScriptError> {
    self.entries.insert(0, entry);
    self.entries.truncate(constants().history_limit);
    self.persist()
  }

  /// Remove the entry at `index` and persist. An out-of-range index is a
  /// silent no-op.
  pub fn remove(&mut self, index: usize) -> Result<(), ScriptError> {
    if index >= self.entries.len() {
      return Ok(());
    }
    self.entries.remove(index);
    self.persist()
  }

  /// Rewrite the whole log. On failure the in-memory log keeps the
  /// mutation; only the disk copy is stale, and the caller hears about it.
  fn persist(&self) -> Result<(), ScriptError> {
    let raw = serde_json::to_vec_pretty(&self.entries)
      .map_err(|e| ScriptError::Storage(format!("failed to encode history: {}", e)))?;
    write_atomic(&self.path, &raw).map_err(|e| ScriptError::Storage(format!("failed to save history: {:#}", e)))
  }
}
