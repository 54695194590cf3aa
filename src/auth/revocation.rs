use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::debug;

/// Revoked token ids and the instant they were revoked.
///
/// Reads lock only the shard they touch, so validation can run alongside
/// revocation and cleanup.
#[derive(Debug, Default)]
pub struct RevocationStore {
    revoked: DashMap<String, DateTime<Utc>>,
}

impl RevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a revocation. Revoking twice keeps the first instant.
    pub fn revoke(&self, token_id: &str, at: DateTime<Utc>) {
        self.revoked.entry(token_id.to_string()).or_insert(at);
    }

    pub fn is_revoked(&self, token_id: &str) -> bool {
        self.revoked.contains_key(token_id)
    }

    pub fn revoked_at(&self, token_id: &str) -> Option<DateTime<Utc>> {
        self.revoked.get(token_id).map(|entry| *entry.value())
    }

    /// Drops entries revoked before `before`. Returns how many were removed.
    pub fn cleanup(&self, before: DateTime<Utc>) -> usize {
        let start = self.revoked.len();
        self.revoked.retain(|_, revoked_at| *revoked_at >= before);
        let removed = start.saturating_sub(self.revoked.len());
        debug!("revocation cleanup removed {} entries", removed);
        removed
    }

    pub fn len(&self) -> usize {
        self.revoked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revoked.is_empty()
    }
}
