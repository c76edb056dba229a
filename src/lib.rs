//! # XMPP SASL Core - Authentication Negotiation Engine
//!
//! Client-side SASL negotiation for XMPP-style streaming XML servers, built
//! to run on transports that deliver bytes in arbitrary chunks.
//!
//! ## Features
//!
//! - **Incremental framing**: delimiter-based span extraction over a growing buffer
//! - **Mechanism selection**: SCRAM-SHA-1 > DIGEST-MD5, PLAIN refused
//! - **SCRAM initial message**: GS2 header, escaped username, random nonce
//! - **Challenge decoding**: base64 payloads with a `key=value` view
//! - **Sans-IO session**: pure state machine driven by transport events
//!
//! ## Protocol Overview
//!
//! ```text
//! Client                                   Server
//!    |------- <stream:stream to=host> ------>|
//!    |<------ <stream:features> -------------|
//!    |------- <auth mechanism=...> --------->|
//!    |<------ <challenge>base64</challenge> -|
//! ```
//!
//! ### State Machine
//!
//! ```text
//!                       Connected
//!     [InitializeStream] ─────────> [SelectAuthenticationMechanism]
//!                                               │
//!                                               │ <stream:features> complete
//!                                               v
//!                                   [DecodeBase64Challenge] ──┐
//!                                               ^             │ <challenge> complete
//!                                               └─────────────┘
//!
//!     any state ── error / <failure> / <stream:error> ──> [Closed]
//! ```
//!
//! ## Quick Start
//!
//! ### Driving a Session by Hand
//!
//! ```rust,ignore
//! use xmppsasl::protocol::{Credentials, Session, SessionState};
//! use xmppsasl::transport::{MemoryTransport, TransportEvent};
//!
//! let mut session = Session::new(Credentials::new("example.com", "juliet", "r0m30"));
//! let mut transport = MemoryTransport::new();
//!
//! session.dispatch(TransportEvent::Connected, &mut transport)?;
//! assert_eq!(session.state(), SessionState::SelectAuthenticationMechanism);
//!
//! // Feed server bytes as they arrive, in any chunking
//! for chunk in server_chunks {
//!     for challenge in session.dispatch(TransportEvent::DataReceived(chunk), &mut transport)? {
//!         println!("challenge: {:?}", challenge.params());
//!     }
//! }
//! ```
//!
//! ### Over TCP
//!
//! ```rust,ignore
//! use xmppsasl::{Config, Session, TcpClient};
//!
//! let config = Config::from_file("config.toml")?;
//! let client = TcpClient::from_config(&config);
//! let negotiation = client.negotiate(Session::new(config.credentials()?)).await?;
//! println!("{} -> {:?}", negotiation.mechanism, negotiation.challenge.as_str());
//! ```
//!
//! ## Modules
//!
//! - [`codec`]: Span extraction and base64
//! - [`protocol`]: Mechanisms, messages, challenges and the session state machine
//! - [`transport`]: Transport capability, in-memory recorder, TCP driver
//! - [`config`]: Configuration management
//! - [`error`]: Error types and result aliases

pub mod codec;
pub mod config;
pub mod error;
pub mod protocol;
pub mod transport;

// Re-exports for convenience
pub use codec::StreamBuffer;
pub use config::Config;
pub use error::{Result, SaslError};
pub use protocol::{
    select, Challenge, Credentials, Mechanism, MechanismSet, Message, Session, SessionState,
    SessionStats,
};
pub use transport::{MemoryTransport, Negotiation, TcpClient, Transport, TransportEvent};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
