//! Session and chat message types for Postmind.
//!
//! A session is one conversation between a user and the assistant,
//! identified by an opaque token. Messages are the durable, ordered log of
//! that conversation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Who authored a chat message.
///
/// Maps to the CHECK constraint in the SQLite schema:
/// `CHECK (sender IN ('user', 'assistant'))`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageSender {
    User,
    Assistant,
}

impl fmt::Display for MessageSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageSender::User => write!(f, "user"),
            MessageSender::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for MessageSender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(MessageSender::User),
            "assistant" => Ok(MessageSender::Assistant),
            other => Err(format!("invalid message sender: '{other}'")),
        }
    }
}

/// What kind of content a chat message carries.
///
/// `Text` is ordinary conversation, `Action` records a structured action the
/// assistant performed (e.g. a draft being composed), `System` is
/// connection-level notices replayed into history.
///
/// Maps to `CHECK (kind IN ('text', 'action', 'system'))`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Action,
    System,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Text => write!(f, "text"),
            MessageKind::Action => write!(f, "action"),
            MessageKind::System => write!(f, "system"),
        }
    }
}

impl FromStr for MessageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(MessageKind::Text),
            "action" => Ok(MessageKind::Action),
            "system" => Ok(MessageKind::System),
            other => Err(format!("invalid message kind: '{other}'")),
        }
    }
}

impl Default for MessageKind {
    fn default() -> Self {
        MessageKind::Text
    }
}

/// A chat session between one user and the assistant.
///
/// The `token` is opaque and unique; it keys every in-memory registry as
/// well as the durable row. `last_activity` drives validity and cleanup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub is_active: bool,
}

impl Session {
    /// Create a fresh active session for a user with the given token.
    pub fn new(token: impl Into<String>, user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            token: token.into(),
            user_id,
            created_at: now,
            last_activity: now,
            is_active: true,
        }
    }
}

/// A single message within a session's durable history.
///
/// Immutable once written, except for the `read` flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageRecord {
    pub id: Uuid,
    pub session_token: String,
    pub sender: MessageSender,
    pub content: String,
    pub kind: MessageKind,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}
