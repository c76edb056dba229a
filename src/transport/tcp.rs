//! TCP driver for the SASL session.
//!
//! Connects with tokio, turns socket reads into [`TransportEvent`]s and
//! flushes whatever the session queued after each step. The session itself
//! has no timeouts; this driver bounds both the connect and every read.

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::{Transport, TransportEvent};
use crate::config::{Config, ServerConfig, SessionConfig};
use crate::error::{Result, SaslError};
use crate::protocol::{Challenge, Mechanism, Session, SessionStats};

/// Result of a negotiation that reached the first server challenge.
#[derive(Debug, Clone)]
pub struct Negotiation {
    /// Mechanism announced to the server
    pub mechanism: Mechanism,
    /// First decoded challenge
    pub challenge: Challenge,
    /// Session counters at the time the challenge arrived
    pub stats: SessionStats,
}

/// Writes queued by the session during one step.
#[derive(Debug, Default)]
struct Outbox {
    pending: Vec<Bytes>,
    disconnect: bool,
}

impl Transport for Outbox {
    fn write(&mut self, bytes: &[u8]) {
        self.pending.push(Bytes::copy_from_slice(bytes));
    }

    fn disconnect(&mut self) {
        self.disconnect = true;
    }
}

/// TCP client driving one session at a time.
#[derive(Debug, Clone)]
pub struct TcpClient {
    server: ServerConfig,
    session: SessionConfig,
}

impl TcpClient {
    /// Create a new TCP client.
    pub fn new(server: ServerConfig, session: SessionConfig) -> Self {
        Self { server, session }
    }

    /// Create from a full configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.server.clone(), config.session.clone())
    }

    /// Get the address this client connects to.
    pub fn connect_addr(&self) -> String {
        self.server.connect_addr()
    }

    /// Run `session` until the first challenge arrives or the session fails.
    pub async fn negotiate(&self, mut session: Session) -> Result<Negotiation> {
        let addr = self.connect_addr();
        tracing::info!(session = %session.id(), "connecting to {}", addr);

        let mut stream = match timeout(self.session.connect_timeout(), TcpStream::connect(&addr)).await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                session.close();
                return Err(SaslError::Transport(format!("Failed to connect to {addr}: {e}")));
            },
            Err(_) => {
                session.close();
                return Err(SaslError::Timeout(format!("connecting to {addr}")));
            },
        };

        let mut outbox = Outbox::default();
        let mut read_buf = vec![0u8; self.session.read_buffer_size.max(1)];
        let mut event = TransportEvent::Connected;

        loop {
            let step = session.dispatch(event, &mut outbox);
            let flushed = flush(&mut stream, &mut outbox).await;
            let challenges = step?;
            flushed?;

            if let Some(challenge) = challenges.into_iter().next() {
                // Server aborted right behind the challenge
                if let Some(err) = session.take_error() {
                    return Err(err);
                }
                let mechanism = session.mechanism().ok_or_else(|| {
                    SaslError::InvalidState("challenge before mechanism selection".into())
                })?;
                return Ok(Negotiation {
                    mechanism,
                    challenge,
                    stats: session.stats(),
                });
            }

            event = match timeout(self.session.read_timeout(), stream.read(&mut read_buf)).await {
                Ok(Ok(0)) => TransportEvent::Errored("connection closed by peer".to_string()),
                Ok(Ok(n)) => TransportEvent::DataReceived(Bytes::copy_from_slice(&read_buf[..n])),
                Ok(Err(e)) => TransportEvent::Errored(e.to_string()),
                Err(_) => {
                    let state = session.state();
                    session.close();
                    if let Err(e) = stream.shutdown().await {
                        tracing::debug!(session = %session.id(), "shutdown after timeout failed: {e}");
                    }
                    return Err(SaslError::Timeout(format!(
                        "no data within {}s in state {state:?}",
                        self.session.read_timeout_secs
                    )));
                },
            };
        }
    }
}

async fn flush(stream: &mut TcpStream, outbox: &mut Outbox) -> Result<()> {
    for bytes in outbox.pending.drain(..) {
        stream.write_all(&bytes).await?;
    }
    stream.flush().await?;
    if outbox.disconnect {
        outbox.disconnect = false;
        stream.shutdown().await?;
    }
    Ok(())
}
