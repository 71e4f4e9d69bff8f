use std::time::Duration;

use thiserror::Error;

/// Errors from repository operations (used by trait definitions in
/// postmind-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors surfaced synchronously to an `enqueue` caller.
///
/// The core never retries these; the orchestrator translates them into a
/// user-visible "slow down" message.
#[derive(Debug, Error)]
pub enum EnqueueError {
    /// The session exceeded its per-minute request allowance.
    #[error("rate limit exceeded for session {token}: max {max_per_window} requests per {window:?}")]
    RateLimited {
        token: String,
        max_per_window: u32,
        window: Duration,
    },

    /// The bounded queue stayed full for the whole enqueue wait.
    #[error("request queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// The queue has been stopped and accepts no further work.
    #[error("request queue is closed")]
    Closed,
}

/// Errors from draft store operations.
#[derive(Debug, Error)]
pub enum DraftError {
    /// Update was called for a session with no current draft.
    #[error("no draft exists for session {0}")]
    NotFound(String),
}
