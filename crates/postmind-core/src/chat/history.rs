//! Chat history store: message persistence over the repository port.
//!
//! Builds records (uuid v7, current time, unread), enforces the per-session
//! retention cap on every write, and presents history in chronological
//! order. Persistence failures always propagate -- silent loss of chat
//! history is unacceptable.

use chrono::Utc;
use postmind_types::error::RepositoryError;
use postmind_types::session::{ChatMessageRecord, MessageKind, MessageSender};
use tracing::debug;
use uuid::Uuid;

use super::repository::ChatRepository;

/// Default per-session message retention cap.
const DEFAULT_HISTORY_CAP: u32 = 500;

/// Durable, ordered log of messages per session.
pub struct ChatHistoryStore<R: ChatRepository> {
    repo: R,
    history_cap: u32,
}

impl<R: ChatRepository> ChatHistoryStore<R> {
    /// Create a store with the default retention cap.
    pub fn new(repo: R) -> Self {
        Self::with_cap(repo, DEFAULT_HISTORY_CAP)
    }

    /// Create a store with a custom per-session retention cap.
    pub fn with_cap(repo: R, history_cap: u32) -> Self {
        Self { repo, history_cap }
    }

    /// Access the underlying repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Persist a message and return the materialized record.
    ///
    /// The session's log is trimmed to the retention cap after the insert,
    /// oldest records first.
    pub async fn save_message(
        &self,
        token: impl Into<String>,
        sender: MessageSender,
        content: impl Into<String>,
        kind: MessageKind,
    ) -> Result<ChatMessageRecord, RepositoryError> {
        let record = ChatMessageRecord {
            id: Uuid::now_v7(),
            session_token: token.into(),
            sender,
            content: content.into(),
            kind,
            read: false,
            created_at: Utc::now(),
        };

        self.repo.insert_message(&record).await?;
        let evicted = self
            .repo
            .trim_messages(&record.session_token, self.history_cap)
            .await?;
        if evicted > 0 {
            debug!(
                token = %record.session_token,
                evicted,
                "history cap enforced"
            );
        }
        Ok(record)
    }

    /// The most recent `limit` messages, oldest first.
    ///
    /// The store returns newest-first; this reverses into chronological
    /// order for replay.
    pub async fn history(
        &self,
        token: &str,
        limit: i64,
    ) -> Result<Vec<ChatMessageRecord>, RepositoryError> {
        let mut messages = self.repo.recent_messages(token, limit).await?;
        messages.reverse();
        Ok(messages)
    }

    /// Mark all of a session's messages read. Returns the number changed.
    pub async fn mark_read(&self, token: &str) -> Result<u64, RepositoryError> {
        self.repo.mark_all_read(token).await
    }

    /// Count of unread messages for a session.
    pub async fn unread_count(&self, token: &str) -> Result<u64, RepositoryError> {
        self.repo.unread_count(token).await
    }

    /// Delete messages older than `days` days, across all sessions.
    ///
    /// Transactional in the repository: a mid-delete failure rolls back and
    /// the error propagates. Returns the number deleted.
    pub async fn prune_older_than(&self, days: i64) -> Result<u64, RepositoryError> {
        let cutoff = Utc::now() - chrono::Duration::days(days);
        let deleted = self.repo.delete_messages_before(cutoff).await?;
        if deleted > 0 {
            debug!(deleted, days, "pruned aged messages");
        }
        Ok(deleted)
    }

    /// Configured per-session retention cap.
    pub fn history_cap(&self) -> u32 {
        self.history_cap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The store is exercised against the SQLite repository in
    // postmind-infra; here we only pin the generic surface.
    fn _assert_store_generic<R: ChatRepository>() {
        fn _takes_store<R: ChatRepository>(_s: &ChatHistoryStore<R>) {}
    }
}
