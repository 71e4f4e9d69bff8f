//! Session validity and expiry cleanup.
//!
//! `is_valid` is a pure predicate over a session's durable record; the
//! `SessionSweeper` removes long-inactive sessions (messages before the
//! session row) on a cancellable daily schedule.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use postmind_types::error::RepositoryError;
use postmind_types::session::Session;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::repository::ChatRepository;

/// Whether a session may still be used.
///
/// False when the session was deactivated or when it has been inactive
/// longer than `max_inactivity_hours`. Pure: no I/O, no mutation.
pub fn is_valid(session: &Session, max_inactivity_hours: i64) -> bool {
    if !session.is_active {
        return false;
    }
    let idle = Utc::now() - session.last_activity;
    idle <= chrono::Duration::hours(max_inactivity_hours)
}

/// Running cleanup task state.
struct SweeperHandle {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Removes sessions (and their messages) inactive beyond a retention
/// window.
pub struct SessionSweeper<R: ChatRepository> {
    repo: R,
    task: Mutex<Option<SweeperHandle>>,
}

impl<R: ChatRepository + 'static> SessionSweeper<R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            task: Mutex::new(None),
        }
    }

    /// Access the underlying repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Delete sessions whose `last_activity` is older than `days` days.
    ///
    /// Each session is purged in its own transaction (messages deleted
    /// before the session row), so one failure cannot corrupt or block the
    /// cleanup of unrelated sessions. Returns the number of sessions
    /// removed. A failure listing candidates propagates.
    pub async fn cleanup_old_sessions(&self, days: i64) -> Result<u64, RepositoryError> {
        let cutoff = Utc::now() - chrono::Duration::days(days);
        let candidates = self.repo.sessions_inactive_since(cutoff).await?;

        let mut removed = 0u64;
        for session in &candidates {
            match self.repo.purge_session(&session.token).await {
                Ok(()) => {
                    removed += 1;
                    debug!(token = %session.token, "purged expired session");
                }
                Err(err) => {
                    warn!(
                        token = %session.token,
                        error = %err,
                        "failed to purge session, continuing"
                    );
                }
            }
        }

        if removed > 0 {
            info!(removed, days, "session cleanup complete");
        }
        Ok(removed)
    }

    /// Start the periodic cleanup task. Idempotent while one is running.
    pub async fn start(self: Arc<Self>, every: Duration, retention_days: i64) {
        let mut slot = self.task.lock().await;
        if slot.is_some() {
            debug!("session sweeper already running");
            return;
        }

        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let sweeper = Arc::clone(&self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(err) = sweeper.cleanup_old_sessions(retention_days).await {
                            warn!(error = %err, "session cleanup pass failed");
                        }
                    }
                }
            }
            debug!("session sweeper stopped");
        });

        *slot = Some(SweeperHandle { cancel, handle });
        info!(?every, retention_days, "session sweeper started");
    }

    /// Cancel the cleanup task and wait for it to exit.
    pub async fn stop(&self) {
        let mut slot = self.task.lock().await;
        if let Some(SweeperHandle { cancel, handle }) = slot.take() {
            cancel.cancel();
            if let Err(err) = handle.await {
                warn!(error = %err, "session sweeper join error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn session(last_activity_hours_ago: i64, is_active: bool) -> Session {
        let mut s = Session::new("tok-1", Uuid::now_v7());
        s.last_activity = Utc::now() - chrono::Duration::hours(last_activity_hours_ago);
        s.is_active = is_active;
        s
    }

    #[test]
    fn fresh_active_session_is_valid() {
        assert!(is_valid(&session(0, true), 24));
    }

    #[test]
    fn inactive_flag_invalidates() {
        assert!(!is_valid(&session(0, false), 24));
    }

    #[test]
    fn stale_session_is_invalid() {
        assert!(!is_valid(&session(25, true), 24));
    }

    #[test]
    fn session_inside_threshold_is_valid() {
        assert!(is_valid(&session(23, true), 24));
    }
}
