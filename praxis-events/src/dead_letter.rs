//! Dead-letter store
//!
//! One entry per (event, module) that exhausted its attempts. Entries stay
//! until replayed or cleared; they are the only place subscriber failures
//! surface, since `publish` never fails.

use crate::error::EventHandlerError;
use crate::event::DomainEvent;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A delivery that ran out of attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub id: Uuid,
    pub event: DomainEvent,
    pub module_name: String,
    /// Message of the last failure
    pub error: String,
    /// Whether the last failure was marked fatal by the handler
    pub fatal: bool,
    /// Attempts consumed before giving up
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
}

impl DeadLetterEntry {
    pub fn new(
        event: DomainEvent,
        module_name: impl Into<String>,
        error: &EventHandlerError,
        attempts: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event,
            module_name: module_name.into(),
            error: error.to_string(),
            fatal: error.is_fatal(),
            attempts,
            failed_at: Utc::now(),
        }
    }
}

/// Append-only list of dead letters, in failure order.
#[derive(Debug, Default)]
pub struct DeadLetterStore {
    entries: Mutex<Vec<DeadLetterEntry>>,
}

impl DeadLetterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: DeadLetterEntry) {
        self.entries.lock().push(entry);
    }

    /// Snapshot of all entries.
    pub fn list(&self) -> Vec<DeadLetterEntry> {
        self.entries.lock().clone()
    }

    pub fn for_module(&self, module_name: &str) -> Vec<DeadLetterEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.module_name == module_name)
            .cloned()
            .collect()
    }

    pub fn get(&self, id: Uuid) -> Option<DeadLetterEntry> {
        self.entries.lock().iter().find(|e| e.id == id).cloned()
    }

    pub fn take(&self, id: Uuid) -> Option<DeadLetterEntry> {
        let mut entries = self.entries.lock();
        let index = entries.iter().position(|e| e.id == id)?;
        Some(entries.remove(index))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Remove every entry, returning how many there were.
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.lock();
        let count = entries.len();
        entries.clear();
        count
    }
}
