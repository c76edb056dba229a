//! XMPP SASL negotiation.
//!
//! Implements the client side of the opening SASL exchange: open the
//! stream, read the server's mechanism announcement, pick a mechanism,
//! announce it, and decode the challenges that follow.
//!
//! # Message Flow
//!
//! ```text
//! Client                                   Server
//!    |                                        |
//!    |------- <stream:stream to=host> ------>|  on connect
//!    |                                        |
//!    |<------ <stream:features>  ------------|  mechanisms offered
//!    |           <mechanism>...</mechanism>   |
//!    |                                        |
//!    |------- <auth mechanism=NAME> -------->|  SCRAM carries client-first
//!    |                                        |
//!    |<------ <challenge>base64</challenge> -|  handed to the caller
//!    |     or <failure>...</failure>          |  fatal
//! ```
//!
//! ## State Machine
//!
//! | State                           | Event       | Next                            |
//! |---------------------------------|-------------|---------------------------------|
//! | `InitializeStream`              | connected   | `SelectAuthenticationMechanism` |
//! | `SelectAuthenticationMechanism` | features    | `DecodeBase64Challenge`         |
//! | `DecodeBase64Challenge`         | challenge   | `DecodeBase64Challenge`         |
//! | any                             | fatal error | `Closed`                        |
//!
//! Incomplete data never moves the state: the session keeps buffering until
//! the span it is waiting for is complete.
//!
//! ## Mechanism Priority
//!
//! | Offered            | Selected                   |
//! |--------------------|----------------------------|
//! | `SCRAM-SHA-1`      | [`Mechanism::Sha1`]        |
//! | `DIGEST-MD5`       | [`Mechanism::Md5`]         |
//! | anything else      | [`Mechanism::None`]        |
//!
//! # Usage
//!
//! ```rust,ignore
//! use xmppsasl::protocol::{Credentials, Session};
//! use xmppsasl::transport::{MemoryTransport, TransportEvent};
//!
//! let mut session = Session::new(Credentials::new("example.com", "juliet", "r0m30"));
//! let mut transport = MemoryTransport::new();
//!
//! session.dispatch(TransportEvent::Connected, &mut transport)?;
//! session.dispatch(TransportEvent::DataReceived(features.into()), &mut transport)?;
//! let challenges = session.dispatch(TransportEvent::DataReceived(chunk.into()), &mut transport)?;
//! ```

mod challenge;
mod mechanism;
mod message;
mod nonce;
mod session;
pub mod xml;

pub use challenge::Challenge;
pub use mechanism::{select, Mechanism, MechanismSet};
pub use message::{saslname, scram_client_first, scram_client_first_bare, Message, GS2_HEADER};
pub use nonce::{generate_nonce, generate_nonce_with, NONCE_LEN};
pub use session::{Action, Credentials, Session, SessionState, SessionStats};
pub use xml::{parse_mechanisms, XmlNode};

/// Default namespace of client streams
pub const CLIENT_NS: &str = "jabber:client";

/// Namespace bound to the `stream:` prefix
pub const STREAM_NS: &str = "http://etherx.jabber.org/streams";

/// SASL namespace for `<auth>`, `<challenge>`, `<failure>`
pub const SASL_NS: &str = "urn:ietf:params:xml:ns:xmpp-sasl";

/// Span delimiters for the stanzas the session waits for.
pub mod delimiters {
    /// Start of the server feature announcement (attributes may follow)
    pub const FEATURES_START: &str = "<stream:features";
    /// End of the server feature announcement
    pub const FEATURES_END: &str = "</stream:features>";
    /// Start of a SASL challenge (attributes follow)
    pub const CHALLENGE_START: &str = "<challenge";
    /// End of a SASL challenge
    pub const CHALLENGE_END: &str = "</challenge>";
    /// Start of a SASL failure
    pub const FAILURE_START: &str = "<failure";
    /// End of a SASL failure
    pub const FAILURE_END: &str = "</failure>";
    /// Start of a stream-level error
    pub const STREAM_ERROR_START: &str = "<stream:error";
    /// End of a stream-level error
    pub const STREAM_ERROR_END: &str = "</stream:error>";
}
