//! Transport capability for the SASL session.
//!
//! The session never touches a socket. It consumes [`TransportEvent`]s and
//! asks a [`Transport`] to write bytes or disconnect. Backends:
//!
//! - **[`TcpClient`]**: tokio TCP driver for real servers
//! - **[`MemoryTransport`]**: records writes, for tests and transcript replay
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          Session (state machine)         │
//! │     handle_event(event) -> actions       │
//! └──────────────────┬──────────────────────┘
//!                    │ write / disconnect
//!          ┌────────┴────────┐
//!          ▼                 ▼
//! ┌─────────────────┐ ┌─────────────────┐
//! │   TcpClient     │ │ MemoryTransport │
//! │  (tokio net)    │ │   (recorder)    │
//! └─────────────────┘ └─────────────────┘
//! ```
//!
//! Events must be delivered serially. A session is not meant to be driven
//! from two threads at once.

mod memory;
mod tcp;

pub use memory::MemoryTransport;
pub use tcp::{Negotiation, TcpClient};

use bytes::Bytes;

/// Events delivered by a transport to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is established
    Connected,
    /// A chunk of bytes arrived; boundaries are arbitrary
    DataReceived(Bytes),
    /// The transport failed
    Errored(String),
}

impl From<Bytes> for TransportEvent {
    fn from(bytes: Bytes) -> Self {
        TransportEvent::DataReceived(bytes)
    }
}

/// Outbound half of a transport.
///
/// Writes are fire-and-forget: buffering, retries and backpressure belong
/// to the implementation.
pub trait Transport {
    /// Queue bytes for the peer.
    fn write(&mut self, bytes: &[u8]);

    /// Tear the connection down. Must be safe to call more than once.
    fn disconnect(&mut self);
}
