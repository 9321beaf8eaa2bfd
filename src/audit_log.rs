//! Audit Log - records every executed command with its compiled predicate

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

/// Audit log entry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Entry ID
    pub id: String,

    /// Command text as received
    pub command: String,

    /// Recognized verb, if parsing got that far
    pub verb: Option<String>,

    /// Serialized predicate, if one was compiled
    pub predicate: Option<Value>,

    /// Rows matched or produced
    pub matched_rows: Option<usize>,

    /// Error message for failed commands
    pub error: Option<String>,

    /// RFC 3339 timestamp
    pub timestamp: String,
}

impl AuditLogEntry {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Bounded in-memory audit trail; the oldest entries are evicted first
pub struct AuditLog {
    entries: Arc<RwLock<VecDeque<AuditLogEntry>>>,
    max_entries: usize,
}

impl AuditLog {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(VecDeque::new())),
            max_entries,
        }
    }

    /// Log a successful command
    pub fn log_success(
        &self,
        command: &str,
        verb: &str,
        predicate: Option<Value>,
        matched_rows: Option<usize>,
    ) -> String {
        self.push(AuditLogEntry {
            id: uuid::Uuid::new_v4().to_string(),
            command: command.to_string(),
            verb: Some(verb.to_string()),
            predicate,
            matched_rows,
            error: None,
            timestamp: Self::now_timestamp(),
        })
    }

    /// Log a failed command
    pub fn log_failure(&self, command: &str, verb: Option<&str>, error: &str) -> String {
        self.push(AuditLogEntry {
            id: uuid::Uuid::new_v4().to_string(),
            command: command.to_string(),
            verb: verb.map(str::to_string),
            predicate: None,
            matched_rows: None,
            error: Some(error.to_string()),
            timestamp: Self::now_timestamp(),
        })
    }

    fn push(&self, entry: AuditLogEntry) -> String {
        let id = entry.id.clone();
        if self.max_entries == 0 {
            return id;
        }
        let mut entries = self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.push_back(entry);

        // Evict oldest if at capacity
        while entries.len() > self.max_entries {
            entries.pop_front();
        }
        id
    }

    /// Get all entries, oldest first
    pub fn get_entries(&self) -> Vec<AuditLogEntry> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// Get entry by ID
    pub fn get_entry(&self, entry_id: &str) -> Option<AuditLogEntry> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .find(|e| e.id == entry_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn now_timestamp() -> String {
        chrono::Utc::now().to_rfc3339()
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(1000) // Default: keep last 1000 entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_oldest() {
        let log = AuditLog::new(2);
        log.log_success("show a > 1", "show", None, Some(1));
        let second = log.log_success("show b > 1", "show", None, Some(2));
        log.log_failure("frobnicate", None, "unrecognized command verb");
        let entries = log.get_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, second);
        assert!(!entries[1].succeeded());
    }

    #[test]
    fn test_lookup_by_id() {
        let log = AuditLog::default();
        let id = log.log_success("highlight revenue is empty", "highlight", Some(serde_json::json!({"kind": "comparison"})), Some(3));
        let entry = log.get_entry(&id).unwrap();
        assert_eq!(entry.matched_rows, Some(3));
        assert_eq!(entry.verb.as_deref(), Some("highlight"));
        assert!(log.get_entry("missing").is_none());
    }
}
