//! An in-memory [`AuditLog`] for tests that don't need a persisted trail,
//! just the ability to inspect what was recorded.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tally_service::services::audit_log::{AuditEntryRecord, AuditError, AuditLog};
use tally_types::ElectionId;

/// An [`AuditLog`] backed by a `Vec` behind a lock, in append order.
#[derive(Clone, Default)]
pub struct InMemoryAuditLog {
    entries: Arc<Mutex<Vec<AuditEntryRecord>>>,
}

impl InMemoryAuditLog {
    /// Builds an empty audit log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every entry recorded so far, across all elections, in
    /// append order.
    pub fn all(&self) -> Vec<AuditEntryRecord> {
        self.entries.lock().clone()
    }
}

#[async_trait]
impl AuditLog for InMemoryAuditLog {
    async fn append(&self, entry: AuditEntryRecord) -> Result<(), AuditError> {
        self.entries.lock().push(entry);
        Ok(())
    }

    async fn list(&self, election_id: ElectionId) -> Result<Vec<AuditEntryRecord>, AuditError> {
        Ok(self
            .entries
            .lock()
            .iter()
            .filter(|entry| entry.election_id == election_id)
            .cloned()
            .collect())
    }
}
