//! Live connection tracking: the registry, the transport port, and the
//! idle-connection reaper.

pub mod registry;
pub mod transport;

pub use registry::{ConnectionMeta, ConnectionRegistry};
pub use transport::{ConnectionTransport, TransportError};
