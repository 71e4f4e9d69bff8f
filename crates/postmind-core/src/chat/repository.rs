//! ChatRepository trait definition.
//!
//! Provides the durable-store operations for sessions and their message
//! logs. Implementations live in postmind-infra (e.g.
//! `SqliteChatRepository`). Uses native async fn in traits (RPITIT, Rust
//! 2024 edition).

use chrono::{DateTime, Utc};
use postmind_types::error::RepositoryError;
use postmind_types::session::{ChatMessageRecord, Session};

/// Repository trait for session and chat message persistence.
///
/// The durable store is the sole cross-restart truth; every in-memory
/// registry re-derives from it.
pub trait ChatRepository: Send + Sync {
    /// Create a new session row.
    fn create_session(
        &self,
        session: &Session,
    ) -> impl std::future::Future<Output = Result<Session, RepositoryError>> + Send;

    /// Get a session by its token.
    fn get_session(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<Option<Session>, RepositoryError>> + Send;

    /// Update an existing session (activity timestamp, active flag).
    fn update_session(
        &self,
        session: &Session,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Stamp a session's `last_activity`.
    fn touch_session(
        &self,
        token: &str,
        at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Sessions whose `last_activity` is older than `cutoff`.
    fn sessions_inactive_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Vec<Session>, RepositoryError>> + Send;

    /// Delete one session and its messages, messages first, in a single
    /// transaction.
    fn purge_session(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Insert a message record.
    fn insert_message(
        &self,
        record: &ChatMessageRecord,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// The most recent `limit` messages for a session, newest first.
    fn recent_messages(
        &self,
        token: &str,
        limit: i64,
    ) -> impl std::future::Future<Output = Result<Vec<ChatMessageRecord>, RepositoryError>> + Send;

    /// Set the read flag on all of a session's messages. Returns the number
    /// of rows changed.
    fn mark_all_read(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Count of unread messages for a session.
    fn unread_count(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Delete all messages older than `cutoff`, across sessions, in a
    /// single transaction. Returns the number deleted.
    fn delete_messages_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Delete a session's oldest messages beyond the newest `keep`.
    /// Returns the number deleted.
    fn trim_messages(
        &self,
        token: &str,
        keep: u32,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
