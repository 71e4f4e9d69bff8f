//! In-memory draft store with monotonic versioning and bounded history.
//!
//! Each session owns one slot: the current draft plus a bounded list of
//! prior snapshots. Slots live in a sharded map; all writes to one slot
//! happen under its shard entry lock with no await inside, which serializes
//! same-session writers while unrelated sessions proceed in parallel.
//! Drafts are ephemeral by design -- a restart clears them.

use std::collections::{HashMap, VecDeque};

use chrono::Utc;
use dashmap::DashMap;
use postmind_types::draft::{DraftContent, DraftPatch, DraftRecord};
use postmind_types::error::DraftError;
use tracing::debug;

/// Default bound on retained snapshots per session.
const DEFAULT_HISTORY_CAP: usize = 10;

/// One session's draft state: the current draft plus prior snapshots,
/// newest at the back.
#[derive(Default)]
struct DraftSlot {
    current: Option<DraftRecord>,
    history: VecDeque<DraftRecord>,
}

impl DraftSlot {
    fn push_snapshot(&mut self, record: DraftRecord, cap: usize) {
        self.history.push_back(record);
        while self.history.len() > cap {
            self.history.pop_front();
        }
    }

    fn next_version(&self) -> u32 {
        self.history.iter().map(|d| d.version).max().unwrap_or(0) + 1
    }
}

/// Aggregate draft-store counters for observability.
#[derive(Debug, Clone)]
pub struct DraftStats {
    /// Sessions currently holding a draft.
    pub sessions: usize,
    /// Snapshots retained across all sessions.
    pub history_entries: usize,
    /// Latest draft version per session.
    pub latest_versions: HashMap<String, u32>,
}

/// Per-session current draft plus bounded version history.
pub struct DraftStore {
    slots: DashMap<String, DraftSlot>,
    history_cap: usize,
}

impl DraftStore {
    /// Create a store with the default snapshot cap.
    pub fn new() -> Self {
        Self::with_cap(DEFAULT_HISTORY_CAP)
    }

    /// Create a store with a custom snapshot cap.
    pub fn with_cap(history_cap: usize) -> Self {
        Self {
            slots: DashMap::new(),
            history_cap,
        }
    }

    /// Save a full draft for a session.
    ///
    /// The new version is one past the highest version in the session's
    /// history (1 for the first save). Sets the current draft and appends a
    /// snapshot, evicting the oldest beyond the cap.
    pub fn save(&self, token: impl Into<String>, content: DraftContent) -> DraftRecord {
        let token = token.into();
        let now = Utc::now();
        let mut slot = self.slots.entry(token.clone()).or_default();

        let record = DraftRecord {
            session_token: token,
            to: content.to,
            subject: content.subject,
            body: content.body,
            provider_draft_id: content.provider_draft_id,
            version: slot.next_version(),
            saved_at: now,
            updated_at: now,
        };

        slot.current = Some(record.clone());
        slot.push_snapshot(record.clone(), self.history_cap);
        debug!(token = %record.session_token, version = record.version, "draft saved");
        record
    }

    /// The session's current draft, if any.
    pub fn get_last(&self, token: &str) -> Option<DraftRecord> {
        self.slots.get(token).and_then(|slot| slot.current.clone())
    }

    /// Merge partial fields into the session's current draft.
    ///
    /// Fails -- creating nothing -- when the session has no current draft.
    /// Otherwise bumps the version by 1, stamps `updated_at`, and appends
    /// the new snapshot to history.
    pub fn update(&self, token: &str, patch: DraftPatch) -> Result<DraftRecord, DraftError> {
        let Some(mut slot) = self.slots.get_mut(token) else {
            return Err(DraftError::NotFound(token.to_string()));
        };
        let Some(current) = slot.current.as_ref() else {
            return Err(DraftError::NotFound(token.to_string()));
        };

        let mut next = current.clone();
        if let Some(to) = patch.to {
            next.to = to;
        }
        if let Some(subject) = patch.subject {
            next.subject = subject;
        }
        if let Some(body) = patch.body {
            next.body = body;
        }
        if let Some(provider_draft_id) = patch.provider_draft_id {
            next.provider_draft_id = Some(provider_draft_id);
        }
        next.version += 1;
        next.updated_at = Utc::now();

        slot.current = Some(next.clone());
        slot.push_snapshot(next.clone(), self.history_cap);
        debug!(%token, version = next.version, "draft updated");
        Ok(next)
    }

    /// Snapshots for a session, most recent first.
    pub fn history(&self, token: &str, limit: usize) -> Vec<DraftRecord> {
        self.slots
            .get(token)
            .map(|slot| slot.history.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    /// Remove the session's current draft and all history.
    pub fn clear(&self, token: &str) {
        if self.slots.remove(token).is_some() {
            debug!(%token, "draft state cleared");
        }
    }

    /// Aggregate counters across all sessions.
    pub fn stats(&self) -> DraftStats {
        let mut sessions = 0;
        let mut history_entries = 0;
        let mut latest_versions = HashMap::new();
        for entry in self.slots.iter() {
            history_entries += entry.value().history.len();
            if let Some(current) = &entry.value().current {
                sessions += 1;
                latest_versions.insert(entry.key().clone(), current.version);
            }
        }
        DraftStats {
            sessions,
            history_entries,
            latest_versions,
        }
    }

    /// Configured snapshot cap.
    pub fn history_cap(&self) -> usize {
        self.history_cap
    }
}

impl Default for DraftStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DraftStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DraftStore")
            .field("sessions", &self.slots.len())
            .field("history_cap", &self.history_cap)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn content(to: &str, subject: &str) -> DraftContent {
        DraftContent {
            to: to.to_string(),
            subject: subject.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn versions_are_sequential_from_one() {
        let store = DraftStore::new();
        for expected in 1..=3 {
            let record = store.save("s1", content("a@x.com", "Hi"));
            assert_eq!(record.version, expected);
        }
    }

    #[test]
    fn update_without_save_fails_and_creates_nothing() {
        let store = DraftStore::new();
        let err = store
            .update(
                "s1",
                DraftPatch {
                    subject: Some("Hi".to_string()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, DraftError::NotFound(_)));
        assert!(store.get_last("s1").is_none());
        assert_eq!(store.stats().sessions, 0);
    }

    #[test]
    fn save_then_update_merges_fields() {
        let store = DraftStore::new();
        store.save("s1", content("a@x.com", "Hi"));
        store
            .update(
                "s1",
                DraftPatch {
                    subject: Some("Hi there".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        let last = store.get_last("s1").unwrap();
        assert_eq!(last.version, 2);
        assert_eq!(last.subject, "Hi there");
        assert_eq!(last.to, "a@x.com");
    }

    #[test]
    fn history_cap_evicts_oldest_first() {
        let store = DraftStore::with_cap(3);
        for _ in 0..5 {
            store.save("s1", content("a@x.com", "Hi"));
        }

        let history = store.history("s1", 10);
        assert_eq!(history.len(), 3);
        let versions: Vec<u32> = history.iter().map(|d| d.version).collect();
        assert_eq!(versions, vec![5, 4, 3]);
    }

    #[test]
    fn history_is_most_recent_first_and_limited() {
        let store = DraftStore::new();
        for _ in 0..4 {
            store.save("s1", content("a@x.com", "Hi"));
        }

        let history = store.history("s1", 2);
        let versions: Vec<u32> = history.iter().map(|d| d.version).collect();
        assert_eq!(versions, vec![4, 3]);
    }

    #[test]
    fn clear_removes_current_and_history() {
        let store = DraftStore::new();
        store.save("s1", content("a@x.com", "Hi"));
        store.save("s1", content("a@x.com", "Hi again"));

        store.clear("s1");
        assert!(store.get_last("s1").is_none());
        assert!(store.history("s1", 10).is_empty());

        // Versioning restarts after a clear
        let record = store.save("s1", content("a@x.com", "Fresh"));
        assert_eq!(record.version, 1);
    }

    #[test]
    fn stats_aggregate_across_sessions() {
        let store = DraftStore::new();
        store.save("s1", content("a@x.com", "one"));
        store.save("s1", content("a@x.com", "two"));
        store.save("s2", content("b@x.com", "other"));

        let stats = store.stats();
        assert_eq!(stats.sessions, 2);
        assert_eq!(stats.history_entries, 3);
        assert_eq!(stats.latest_versions["s1"], 2);
        assert_eq!(stats.latest_versions["s2"], 1);
    }

    #[tokio::test]
    async fn concurrent_saves_stay_gapless() {
        let store = Arc::new(DraftStore::with_cap(64));
        let mut tasks = Vec::new();
        for _ in 0..4 {
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                for _ in 0..5 {
                    store.save("s1", DraftContent::default());
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let mut versions: Vec<u32> = store
            .history("s1", 64)
            .iter()
            .map(|d| d.version)
            .collect();
        versions.sort_unstable();
        assert_eq!(versions, (1..=20).collect::<Vec<u32>>());
    }
}
