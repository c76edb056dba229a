//! In-memory transport that records what the session asks for.

use bytes::Bytes;

use super::Transport;

/// Transport that keeps every write in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryTransport {
    writes: Vec<Bytes>,
    disconnects: usize,
}

impl MemoryTransport {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Individual writes in order
    pub fn writes(&self) -> &[Bytes] {
        &self.writes
    }

    /// All written bytes concatenated
    pub fn written(&self) -> Vec<u8> {
        self.writes.concat()
    }

    /// Drain recorded writes
    pub fn take_writes(&mut self) -> Vec<Bytes> {
        std::mem::take(&mut self.writes)
    }

    /// Whether `disconnect` has been called
    pub fn is_disconnected(&self) -> bool {
        self.disconnects > 0
    }

    /// Number of `disconnect` calls
    pub fn disconnects(&self) -> usize {
        self.disconnects
    }
}

impl Transport for MemoryTransport {
    fn write(&mut self, bytes: &[u8]) {
        self.writes.push(Bytes::copy_from_slice(bytes));
    }

    fn disconnect(&mut self) {
        self.disconnects += 1;
    }
}
