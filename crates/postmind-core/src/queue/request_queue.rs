//! Bounded request queue with a single worker task.
//!
//! Inbound work is rate-checked, then pushed onto a bounded `mpsc` channel
//! with a short wait -- a full queue rejects rather than buffering
//! unboundedly. One background worker drains FIFO, skipping items whose
//! connection died while they waited, and frames each unit of work with
//! typing-start/typing-stop signals.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use postmind_types::error::EnqueueError;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::connection::{ConnectionRegistry, ConnectionTransport};
use super::limiter::RateLimiter;

/// Default wait on a full queue before rejecting.
const DEFAULT_ENQUEUE_TIMEOUT: Duration = Duration::from_secs(5);

/// A unit of inbound work waiting for the worker.
///
/// `priority` is recorded for observability; dispatch is strictly FIFO so
/// that items from one session never reorder.
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub session_token: String,
    pub payload: String,
    pub priority: u8,
    pub enqueued_at: DateTime<Utc>,
}

/// The unit of work the worker runs per item (response generation lives
/// behind this boundary, outside the core).
pub type RequestHandler =
    Arc<dyn Fn(QueueItem) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Running worker task state.
struct WorkerHandle {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Bounded, rate-limited work queue for inbound session requests.
pub struct RequestQueue {
    tx: mpsc::Sender<QueueItem>,
    /// Taken by the worker on start; a stopped queue cannot be restarted.
    rx: Mutex<Option<mpsc::Receiver<QueueItem>>>,
    limiter: RateLimiter,
    capacity: usize,
    enqueue_timeout: Duration,
    worker: Mutex<Option<WorkerHandle>>,
}

impl RequestQueue {
    /// Create a queue with the given capacity, enqueue wait, and limiter.
    pub fn new(capacity: usize, enqueue_timeout: Duration, limiter: RateLimiter) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            limiter,
            capacity,
            enqueue_timeout,
            worker: Mutex::new(None),
        }
    }

    /// Create a queue with the default enqueue wait and limiter.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(capacity, DEFAULT_ENQUEUE_TIMEOUT, RateLimiter::default())
    }

    /// Queue a request for the worker.
    ///
    /// The rate window is checked first: a session at its per-minute
    /// allowance fails with [`EnqueueError::RateLimited`] and nothing is
    /// enqueued. Otherwise the push waits up to the configured timeout for
    /// queue space and fails with [`EnqueueError::QueueFull`] if none frees.
    pub async fn enqueue(
        &self,
        token: impl Into<String>,
        payload: impl Into<String>,
        priority: u8,
    ) -> Result<(), EnqueueError> {
        let token = token.into();
        if !self.limiter.check(&token) {
            debug!(%token, "enqueue rejected by rate limiter");
            return Err(EnqueueError::RateLimited {
                token,
                max_per_window: self.limiter.max_per_window(),
                window: self.limiter.window(),
            });
        }

        let item = QueueItem {
            session_token: token,
            payload: payload.into(),
            priority,
            enqueued_at: Utc::now(),
        };

        match self.tx.send_timeout(item, self.enqueue_timeout).await {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => Err(EnqueueError::QueueFull {
                capacity: self.capacity,
            }),
            Err(SendTimeoutError::Closed(_)) => Err(EnqueueError::Closed),
        }
    }

    /// Start the worker loop. Idempotent while a worker is running.
    ///
    /// The worker dequeues FIFO. Items whose connection is gone are dropped
    /// silently (no redelivery); live items run inside a typing-on /
    /// typing-off frame. Handler failures are logged and do not stop the
    /// loop.
    pub async fn start<T: ConnectionTransport>(
        &self,
        registry: Arc<ConnectionRegistry<T>>,
        handler: RequestHandler,
    ) {
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            debug!("queue worker already running");
            return;
        }
        let Some(mut rx) = self.rx.lock().await.take() else {
            warn!("queue worker cannot restart after stop");
            return;
        };

        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    maybe_item = rx.recv() => {
                        let Some(item) = maybe_item else { break };
                        let token = item.session_token.clone();

                        if !registry.is_connected(&token) {
                            debug!(%token, "dropping queued item for dead connection");
                            continue;
                        }

                        registry.typing_indicator(&token, true).await;
                        if let Err(err) = handler(item).await {
                            warn!(%token, error = %err, "request handler failed");
                        }
                        registry.typing_indicator(&token, false).await;
                    }
                }
            }
            debug!("queue worker stopped");
        });

        *worker = Some(WorkerHandle { cancel, handle });
        info!(capacity = self.capacity, "queue worker started");
    }

    /// Cancel the worker and wait for it to exit.
    ///
    /// An item already handed to the handler finishes before the loop
    /// exits; items still queued are dropped with the receiver.
    pub async fn stop(&self) {
        let mut worker = self.worker.lock().await;
        if let Some(WorkerHandle { cancel, handle }) = worker.take() {
            cancel.cancel();
            if let Err(err) = handle.await {
                warn!(error = %err, "queue worker join error");
            }
        }
    }

    /// Items currently waiting in the queue.
    pub fn queue_size(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    /// Whether the worker task is running.
    pub async fn is_running(&self) -> bool {
        self.worker.lock().await.is_some()
    }

    /// The limiter guarding this queue.
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }
}

impl std::fmt::Debug for RequestQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestQueue")
            .field("capacity", &self.capacity)
            .field("queued", &self.queue_size())
            .finish()
    }
}
