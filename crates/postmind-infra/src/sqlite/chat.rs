//! SQLite chat repository implementation.
//!
//! Implements `ChatRepository` from `postmind-core` using sqlx with split
//! read/write pools: raw queries, private Row structs, rfc3339 text
//! timestamps. Multi-statement operations (`purge_session`,
//! `delete_messages_before`) run inside explicit transactions so a
//! mid-operation failure rolls back instead of leaving partial deletions.

use chrono::{DateTime, Utc};
use postmind_core::chat::repository::ChatRepository;
use postmind_types::error::RepositoryError;
use postmind_types::session::{ChatMessageRecord, MessageKind, MessageSender, Session};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ChatRepository`.
pub struct SqliteChatRepository {
    pool: DatabasePool,
}

impl SqliteChatRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

/// Internal row type for mapping SQLite rows to domain Session.
struct SessionRow {
    token: String,
    user_id: String,
    created_at: String,
    last_activity: String,
    is_active: i64,
}

impl SessionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            token: row.try_get("token")?,
            user_id: row.try_get("user_id")?,
            created_at: row.try_get("created_at")?,
            last_activity: row.try_get("last_activity")?,
            is_active: row.try_get("is_active")?,
        })
    }

    fn into_session(self) -> Result<Session, RepositoryError> {
        let user_id = Uuid::parse_str(&self.user_id)
            .map_err(|e| RepositoryError::Query(format!("invalid user_id: {e}")))?;
        Ok(Session {
            token: self.token,
            user_id,
            created_at: parse_datetime(&self.created_at)?,
            last_activity: parse_datetime(&self.last_activity)?,
            is_active: self.is_active != 0,
        })
    }
}

/// Internal row type for mapping SQLite rows to domain ChatMessageRecord.
struct ChatMessageRow {
    id: String,
    session_token: String,
    sender: String,
    content: String,
    kind: String,
    is_read: i64,
    created_at: String,
}

impl ChatMessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            session_token: row.try_get("session_token")?,
            sender: row.try_get("sender")?,
            content: row.try_get("content")?,
            kind: row.try_get("kind")?,
            is_read: row.try_get("is_read")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_record(self) -> Result<ChatMessageRecord, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid message id: {e}")))?;
        let sender: MessageSender = self
            .sender
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        let kind: MessageKind = self
            .kind
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(ChatMessageRecord {
            id,
            session_token: self.session_token,
            sender,
            content: self.content,
            kind,
            read: self.is_read != 0,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

// ---------------------------------------------------------------------------
// ChatRepository implementation
// ---------------------------------------------------------------------------

impl ChatRepository for SqliteChatRepository {
    async fn create_session(&self, session: &Session) -> Result<Session, RepositoryError> {
        sqlx::query(
            r#"INSERT INTO sessions (token, user_id, created_at, last_activity, is_active)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(&session.token)
        .bind(session.user_id.to_string())
        .bind(format_datetime(&session.created_at))
        .bind(format_datetime(&session.last_activity))
        .bind(i64::from(session.is_active))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.message().contains("UNIQUE") {
                    return RepositoryError::Conflict(format!(
                        "session token '{}' already exists",
                        session.token
                    ));
                }
            }
            RepositoryError::Query(e.to_string())
        })?;

        Ok(session.clone())
    }

    async fn get_session(&self, token: &str) -> Result<Option<Session>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM sessions WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let session_row =
                    SessionRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(session_row.into_session()?))
            }
            None => Ok(None),
        }
    }

    async fn update_session(&self, session: &Session) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE sessions
               SET user_id = ?, last_activity = ?, is_active = ?
               WHERE token = ?"#,
        )
        .bind(session.user_id.to_string())
        .bind(format_datetime(&session.last_activity))
        .bind(i64::from(session.is_active))
        .bind(&session.token)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn touch_session(&self, token: &str, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE sessions SET last_activity = ? WHERE token = ?")
            .bind(format_datetime(&at))
            .bind(token)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn sessions_inactive_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Session>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM sessions WHERE last_activity < ? ORDER BY last_activity ASC",
        )
        .bind(format_datetime(&cutoff))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in &rows {
            let session_row =
                SessionRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            sessions.push(session_row.into_session()?);
        }

        Ok(sessions)
    }

    async fn purge_session(&self, token: &str) -> Result<(), RepositoryError> {
        // Messages before the session row, one transaction per session.
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        sqlx::query("DELETE FROM chat_messages WHERE session_token = ?")
            .bind(token)
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn insert_message(&self, record: &ChatMessageRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO chat_messages (id, session_token, sender, content, kind, is_read, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(record.id.to_string())
        .bind(&record.session_token)
        .bind(record.sender.to_string())
        .bind(&record.content)
        .bind(record.kind.to_string())
        .bind(i64::from(record.read))
        .bind(format_datetime(&record.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn recent_messages(
        &self,
        token: &str,
        limit: i64,
    ) -> Result<Vec<ChatMessageRecord>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT * FROM chat_messages
               WHERE session_token = ?
               ORDER BY created_at DESC, id DESC
               LIMIT ?"#,
        )
        .bind(token)
        .bind(limit)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let msg_row =
                ChatMessageRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            messages.push(msg_row.into_record()?);
        }

        Ok(messages)
    }

    async fn mark_all_read(&self, token: &str) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE chat_messages SET is_read = 1 WHERE session_token = ? AND is_read = 0",
        )
        .bind(token)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn unread_count(&self, token: &str) -> Result<u64, RepositoryError> {
        let row = sqlx::query(
            "SELECT COUNT(*) as cnt FROM chat_messages WHERE session_token = ? AND is_read = 0",
        )
        .bind(token)
        .fetch_one(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let count: i64 = row
            .try_get("cnt")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(count as u64)
    }

    async fn delete_messages_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let result = sqlx::query("DELETE FROM chat_messages WHERE created_at < ?")
            .bind(format_datetime(&cutoff))
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn trim_messages(&self, token: &str, keep: u32) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r#"DELETE FROM chat_messages
               WHERE session_token = ?
                 AND id NOT IN (
                     SELECT id FROM chat_messages
                     WHERE session_token = ?
                     ORDER BY created_at DESC, id DESC
                     LIMIT ?
                 )"#,
        )
        .bind(token)
        .bind(token)
        .bind(i64::from(keep))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected())
    }
}
