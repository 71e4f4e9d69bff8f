//! Connection transport port.
//!
//! The session core is transport-agnostic: any full-duplex, message-oriented
//! connection (WebSocket, TCP framing, an in-process channel in tests) is
//! represented by this trait. Implementations live in the embedding
//! application; the registry only ever sends structured [`OutboundEvent`]s
//! and closes with a code and reason.

use std::future::Future;
use std::time::Duration;

use postmind_types::event::OutboundEvent;
use thiserror::Error;

/// Errors a transport can report on send.
///
/// The registry treats every variant the same way: the connection is
/// considered dead and is removed.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer is gone or the underlying channel is closed.
    #[error("connection closed")]
    Closed,

    /// The send did not complete within the registry's send timeout.
    #[error("send timed out after {0:?}")]
    Timeout(Duration),

    /// Any other transport-level failure.
    #[error("send failed: {0}")]
    Send(String),
}

/// A live, message-oriented connection to one client.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition), same as the
/// repository ports.
pub trait ConnectionTransport: Send + Sync + 'static {
    /// Push one structured event to the client.
    fn send(
        &self,
        event: OutboundEvent,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Close the connection with a code and human-readable reason.
    ///
    /// Best-effort: errors closing an already-dead connection are not
    /// interesting to any caller.
    fn close(&self, code: u16, reason: &str) -> impl Future<Output = ()> + Send;
}
