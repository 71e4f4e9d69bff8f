//! Connection registry: live handles, typing state, per-connection metadata,
//! and the idle-connection reaper.
//!
//! One handle per session token; a new connect for the same token replaces
//! the previous mapping and hands the stale handle back to the caller, who
//! is responsible for closing it. All sends are bounded by a timeout so a
//! slow client cannot stall delivery to others; a failed or timed-out send
//! is treated as an implicit disconnect.
//!
//! Every map is its own `DashMap`; key sets are snapshotted before
//! iteration, and no shard guard is held across an await.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use postmind_types::event::OutboundEvent;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::transport::{ConnectionTransport, TransportError};

/// Default bound on a single transport send.
const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Close code sent when the reaper removes an idle connection.
const IDLE_CLOSE_CODE: u16 = 4000;

/// In-memory metadata for one live connection. Never persisted.
#[derive(Debug, Clone)]
pub struct ConnectionMeta {
    pub token: String,
    pub connected_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub message_count: u64,
}

/// Running reaper task state.
struct ReaperHandle {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Tracks live connections per session token.
///
/// Generic over the transport so the socket framework stays outside the
/// core. Shared across connection tasks and the reaper via `Arc`.
pub struct ConnectionRegistry<T: ConnectionTransport> {
    handles: DashMap<String, Arc<T>>,
    typing: DashMap<String, bool>,
    meta: DashMap<String, ConnectionMeta>,
    send_timeout: Duration,
    reaper: Mutex<Option<ReaperHandle>>,
}

impl<T: ConnectionTransport> ConnectionRegistry<T> {
    /// Create a registry with the given per-send timeout.
    pub fn new(send_timeout: Duration) -> Self {
        Self {
            handles: DashMap::new(),
            typing: DashMap::new(),
            meta: DashMap::new(),
            send_timeout,
            reaper: Mutex::new(None),
        }
    }

    /// Register a connection for a token, replacing any existing mapping.
    ///
    /// Overwrite is the documented policy: the previous handle (if any) is
    /// returned and the caller must close it. Metadata is reset to a fresh
    /// connect time and zero message count.
    pub fn connect(&self, token: impl Into<String>, handle: Arc<T>) -> Option<Arc<T>> {
        let token = token.into();
        let now = Utc::now();
        self.meta.insert(
            token.clone(),
            ConnectionMeta {
                token: token.clone(),
                connected_at: now,
                last_activity: now,
                message_count: 0,
            },
        );
        self.typing.insert(token.clone(), false);
        let previous = self.handles.insert(token.clone(), handle);
        if previous.is_some() {
            debug!(%token, "connection replaced an existing handle");
        } else {
            debug!(%token, "connection registered");
        }
        previous
    }

    /// Remove a connection's handle, typing flag, and metadata.
    ///
    /// Idempotent: unknown tokens and repeated calls are no-ops.
    pub fn disconnect(&self, token: &str) {
        let removed = self.handles.remove(token).is_some();
        self.typing.remove(token);
        self.meta.remove(token);
        if removed {
            debug!(%token, "connection unregistered");
        }
    }

    /// Best-effort send to one token.
    ///
    /// Returns whether the event was delivered. Any transport failure or
    /// timeout implicitly disconnects the token; the error is logged, never
    /// propagated. A delivered message bumps `message_count` and
    /// `last_activity`.
    pub async fn send_to_one(&self, token: &str, event: OutboundEvent) -> bool {
        let Some(handle) = self.handle_of(token) else {
            return false;
        };
        match self.deliver(&handle, event).await {
            Ok(()) => {
                if let Some(mut meta) = self.meta.get_mut(token) {
                    meta.message_count += 1;
                    meta.last_activity = Utc::now();
                }
                true
            }
            Err(err) => {
                debug!(%token, error = %err, "send failed, disconnecting");
                self.disconnect(token);
                false
            }
        }
    }

    /// Send an event to every live connection except `exclude`.
    ///
    /// The token set is snapshotted before the pass, so connections added or
    /// removed mid-broadcast are simply not part of it. Returns the
    /// per-connection delivery outcome; failed connections are disconnected
    /// after the pass completes.
    pub async fn broadcast(
        &self,
        event: OutboundEvent,
        exclude: Option<&str>,
    ) -> Vec<(String, bool)> {
        let tokens: Vec<String> = self.handles.iter().map(|e| e.key().clone()).collect();
        let mut outcomes = Vec::with_capacity(tokens.len());
        let mut failed = Vec::new();

        for token in tokens {
            if Some(token.as_str()) == exclude {
                continue;
            }
            let Some(handle) = self.handle_of(&token) else {
                continue;
            };
            match self.deliver(&handle, event.clone()).await {
                Ok(()) => outcomes.push((token, true)),
                Err(err) => {
                    warn!(%token, error = %err, "broadcast delivery failed");
                    failed.push(token.clone());
                    outcomes.push((token, false));
                }
            }
        }

        for token in &failed {
            self.disconnect(token);
        }
        outcomes
    }

    /// Record typing state for a token and notify that client.
    ///
    /// The notification is best-effort and does not count toward the
    /// connection's message total.
    pub async fn typing_indicator(&self, token: &str, is_typing: bool) {
        let Some(handle) = self.handle_of(token) else {
            return;
        };
        self.typing.insert(token.to_string(), is_typing);
        if let Err(err) = self.deliver(&handle, OutboundEvent::typing(is_typing)).await {
            debug!(%token, error = %err, "typing notification failed, disconnecting");
            self.disconnect(token);
        }
    }

    /// Record inbound activity for a token (keeps the reaper away).
    pub fn touch(&self, token: &str) {
        if let Some(mut meta) = self.meta.get_mut(token) {
            meta.last_activity = Utc::now();
        }
    }

    /// Close and remove every connection idle longer than `max_idle`.
    ///
    /// Returns the number of connections reaped. Called by the reaper task
    /// on each tick; callable directly for an immediate pass.
    pub async fn sweep_idle(&self, max_idle: chrono::Duration) -> usize {
        let cutoff = Utc::now() - max_idle;
        let stale: Vec<String> = self
            .meta
            .iter()
            .filter(|e| e.value().last_activity < cutoff)
            .map(|e| e.key().clone())
            .collect();

        for token in &stale {
            if let Some(handle) = self.handle_of(token) {
                handle.close(IDLE_CLOSE_CODE, "idle timeout").await;
            }
            self.disconnect(token);
            info!(%token, "reaped idle connection");
        }
        stale.len()
    }

    /// Start the periodic reaper task. Idempotent while one is running.
    ///
    /// Every `every`, connections idle longer than `idle_after` are closed
    /// and unregistered. Runs until [`stop_reaper`](Self::stop_reaper).
    pub async fn start_reaper(self: Arc<Self>, idle_after: chrono::Duration, every: Duration) {
        let mut slot = self.reaper.lock().await;
        if slot.is_some() {
            debug!("reaper already running");
            return;
        }

        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let registry = Arc::clone(&self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let reaped = registry.sweep_idle(idle_after).await;
                        if reaped > 0 {
                            info!(reaped, "reaper pass complete");
                        }
                    }
                }
            }
            debug!("reaper stopped");
        });

        *slot = Some(ReaperHandle { cancel, handle });
        info!(?idle_after, ?every, "reaper started");
    }

    /// Cancel the reaper task and wait for it to exit.
    pub async fn stop_reaper(&self) {
        let mut slot = self.reaper.lock().await;
        if let Some(ReaperHandle { cancel, handle }) = slot.take() {
            cancel.cancel();
            if let Err(err) = handle.await {
                warn!(error = %err, "reaper task join error");
            }
        }
    }

    /// Tokens with a live connection.
    pub fn active_sessions(&self) -> Vec<String> {
        self.handles.iter().map(|e| e.key().clone()).collect()
    }

    /// Whether a token currently has a live connection.
    pub fn is_connected(&self, token: &str) -> bool {
        self.handles.contains_key(token)
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.handles.len()
    }

    /// Last recorded typing state for a token.
    pub fn is_typing(&self, token: &str) -> bool {
        self.typing.get(token).map(|t| *t).unwrap_or(false)
    }

    /// Snapshot of a connection's metadata.
    pub fn meta(&self, token: &str) -> Option<ConnectionMeta> {
        self.meta.get(token).map(|m| m.clone())
    }

    /// Clone the handle out of the map so no shard guard outlives this call.
    fn handle_of(&self, token: &str) -> Option<Arc<T>> {
        self.handles.get(token).map(|h| Arc::clone(h.value()))
    }

    /// Run a send with the registry's timeout bound.
    async fn deliver(&self, handle: &Arc<T>, event: OutboundEvent) -> Result<(), TransportError> {
        match tokio::time::timeout(self.send_timeout, handle.send(event)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(self.send_timeout)),
        }
    }
}

impl<T: ConnectionTransport> Default for ConnectionRegistry<T> {
    fn default() -> Self {
        Self::new(DEFAULT_SEND_TIMEOUT)
    }
}

impl<T: ConnectionTransport> std::fmt::Debug for ConnectionRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("connections", &self.handles.len())
            .field("send_timeout", &self.send_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingTransport {
        sent: StdMutex<Vec<OutboundEvent>>,
        closed: StdMutex<Option<(u16, String)>>,
        fail_sends: AtomicBool,
    }

    impl RecordingTransport {
        fn failing() -> Self {
            let t = Self::default();
            t.fail_sends.store(true, Ordering::SeqCst);
            t
        }

        fn sent_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    impl ConnectionTransport for RecordingTransport {
        async fn send(&self, event: OutboundEvent) -> Result<(), TransportError> {
            if self.fail_sends.load(Ordering::SeqCst) {
                return Err(TransportError::Closed);
            }
            self.sent.lock().unwrap().push(event);
            Ok(())
        }

        async fn close(&self, code: u16, reason: &str) {
            *self.closed.lock().unwrap() = Some((code, reason.to_string()));
        }
    }

    fn registry() -> ConnectionRegistry<RecordingTransport> {
        ConnectionRegistry::default()
    }

    #[tokio::test]
    async fn connect_overwrite_returns_stale_handle() {
        let reg = registry();
        let first = Arc::new(RecordingTransport::default());
        let second = Arc::new(RecordingTransport::default());

        assert!(reg.connect("tok-1", Arc::clone(&first)).is_none());
        let stale = reg.connect("tok-1", Arc::clone(&second)).unwrap();
        assert!(Arc::ptr_eq(&stale, &first));
        assert_eq!(reg.connection_count(), 1);

        // Meta was reset by the second connect
        assert_eq!(reg.meta("tok-1").unwrap().message_count, 0);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let reg = registry();
        reg.connect("tok-1", Arc::new(RecordingTransport::default()));

        reg.disconnect("tok-1");
        reg.disconnect("tok-1");
        reg.disconnect("never-connected");
        assert!(!reg.is_connected("tok-1"));
        assert_eq!(reg.connection_count(), 0);
    }

    #[tokio::test]
    async fn send_to_one_delivers_and_updates_meta() {
        let reg = registry();
        let conn = Arc::new(RecordingTransport::default());
        reg.connect("tok-1", Arc::clone(&conn));

        assert!(reg.send_to_one("tok-1", OutboundEvent::system("hi")).await);
        assert_eq!(conn.sent_count(), 1);
        assert_eq!(reg.meta("tok-1").unwrap().message_count, 1);
    }

    #[tokio::test]
    async fn send_to_unknown_token_returns_false() {
        let reg = registry();
        assert!(!reg.send_to_one("ghost", OutboundEvent::pong()).await);
    }

    #[tokio::test]
    async fn send_failure_implicitly_disconnects() {
        let reg = registry();
        reg.connect("tok-1", Arc::new(RecordingTransport::failing()));

        assert!(!reg.send_to_one("tok-1", OutboundEvent::system("hi")).await);
        assert!(!reg.is_connected("tok-1"));
    }

    #[tokio::test]
    async fn broadcast_excludes_reports_and_disconnects_failures() {
        let reg = registry();
        let alive = Arc::new(RecordingTransport::default());
        reg.connect("alive", Arc::clone(&alive));
        reg.connect("broken", Arc::new(RecordingTransport::failing()));
        reg.connect("sender", Arc::new(RecordingTransport::default()));

        let outcomes = reg
            .broadcast(OutboundEvent::system("update"), Some("sender"))
            .await;

        assert_eq!(outcomes.len(), 2);
        let delivered = |tok: &str| outcomes.iter().find(|(t, _)| t == tok).unwrap().1;
        assert!(delivered("alive"));
        assert!(!delivered("broken"));

        // Failures are removed after the pass; the rest stay connected.
        assert!(!reg.is_connected("broken"));
        assert!(reg.is_connected("alive"));
        assert!(reg.is_connected("sender"));
        assert_eq!(alive.sent_count(), 1);
    }

    #[tokio::test]
    async fn typing_indicator_records_and_notifies() {
        let reg = registry();
        let conn = Arc::new(RecordingTransport::default());
        reg.connect("tok-1", Arc::clone(&conn));

        reg.typing_indicator("tok-1", true).await;
        assert!(reg.is_typing("tok-1"));

        let sent = conn.sent.lock().unwrap();
        assert!(matches!(
            sent.last(),
            Some(OutboundEvent::Typing { is_typing: true, .. })
        ));
        // Typing notifications do not count as messages
        drop(sent);
        assert_eq!(reg.meta("tok-1").unwrap().message_count, 0);
    }

    #[tokio::test]
    async fn sweep_reaps_only_stale_connections() {
        let reg = registry();
        let stale = Arc::new(RecordingTransport::default());
        reg.connect("stale", Arc::clone(&stale));
        reg.connect("fresh", Arc::new(RecordingTransport::default()));

        // Backdate one connection past the 30-minute threshold
        reg.meta.get_mut("stale").unwrap().last_activity =
            Utc::now() - chrono::Duration::minutes(31);

        let reaped = reg.sweep_idle(chrono::Duration::minutes(30)).await;
        assert_eq!(reaped, 1);
        assert!(!reg.is_connected("stale"));
        assert!(reg.is_connected("fresh"));

        let closed = stale.closed.lock().unwrap();
        let (code, reason) = closed.as_ref().unwrap();
        assert_eq!(*code, IDLE_CLOSE_CODE);
        assert_eq!(reason, "idle timeout");
    }

    #[tokio::test]
    async fn reaper_task_reaps_and_stops() {
        let reg = Arc::new(registry());
        reg.connect("stale", Arc::new(RecordingTransport::default()));
        reg.meta.get_mut("stale").unwrap().last_activity =
            Utc::now() - chrono::Duration::minutes(31);

        Arc::clone(&reg)
            .start_reaper(chrono::Duration::minutes(30), Duration::from_millis(10))
            .await;
        // Second start is a no-op while running
        Arc::clone(&reg)
            .start_reaper(chrono::Duration::minutes(30), Duration::from_millis(10))
            .await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!reg.is_connected("stale"));

        reg.stop_reaper().await;
        // Stop is idempotent too
        reg.stop_reaper().await;
    }

    #[tokio::test]
    async fn active_sessions_lists_live_tokens() {
        let reg = registry();
        reg.connect("a", Arc::new(RecordingTransport::default()));
        reg.connect("b", Arc::new(RecordingTransport::default()));

        let mut tokens = reg.active_sessions();
        tokens.sort();
        assert_eq!(tokens, vec!["a".to_string(), "b".to_string()]);
    }
}
