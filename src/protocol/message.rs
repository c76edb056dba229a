//! Outbound stanzas for the SASL negotiation.
//!
//! Only the client's side of the opening exchange is built here: the stream
//! header and the `<auth>` element. Output is a pure function of the inputs,
//! so the same mechanism, username and nonce always give identical bytes.

use bytes::Bytes;
use quick_xml::escape::escape;

use super::mechanism::Mechanism;
use super::{CLIENT_NS, SASL_NS, STREAM_NS};
use crate::codec::base64;

/// GS2 header for a client without channel binding support.
pub const GS2_HEADER: &str = "n,,";

/// Client-to-server stanzas
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// XML declaration plus `<stream:stream>` open tag
    StreamHeader {
        /// Domain the stream is addressed to
        to: String,
    },
    /// SASL `<auth>` element
    Auth {
        /// Selected mechanism
        mechanism: Mechanism,
        /// Base64 initial response, if the mechanism sends one
        initial_response: Option<String>,
    },
}

impl Message {
    /// Create the stream header addressed to `host`
    pub fn stream_header(host: &str) -> Self {
        Message::StreamHeader {
            to: host.to_string(),
        }
    }

    /// Create the `<auth>` element for `mechanism`.
    ///
    /// SCRAM-SHA-1 embeds the client-first message; the other mechanisms
    /// announce themselves with an empty element and wait for a challenge.
    pub fn auth(mechanism: Mechanism, username: &str, nonce: &str) -> Self {
        let initial_response = mechanism
            .has_initial_response()
            .then(|| base64::encode(scram_client_first(username, nonce)));
        Message::Auth {
            mechanism,
            initial_response,
        }
    }

    /// Render as XML text
    pub fn to_xml(&self) -> String {
        match self {
            Message::StreamHeader { to } => format!(
                "<?xml version='1.0'?><stream:stream to='{}' xmlns='{CLIENT_NS}' \
                 xmlns:stream='{STREAM_NS}' version='1.0'>",
                escape(to.as_str())
            ),
            Message::Auth {
                mechanism,
                initial_response: None,
            } => format!("<auth xmlns='{SASL_NS}' mechanism='{}'/>", mechanism.name()),
            Message::Auth {
                mechanism,
                initial_response: Some(payload),
            } => format!(
                "<auth xmlns='{SASL_NS}' mechanism='{}'>{payload}</auth>",
                mechanism.name()
            ),
        }
    }

    /// Render as bytes ready for the transport
    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.to_xml())
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_xml())
    }
}

/// SCRAM client-first message: GS2 header followed by `n=<user>,r=<nonce>`.
pub fn scram_client_first(username: &str, nonce: &str) -> String {
    format!("{GS2_HEADER}{}", scram_client_first_bare(username, nonce))
}

/// SCRAM client-first message without the GS2 header.
pub fn scram_client_first_bare(username: &str, nonce: &str) -> String {
    format!("n={},r={nonce}", saslname(username))
}

/// Escape a username for SCRAM: `=` becomes `=3D` and `,` becomes `=2C`.
pub fn saslname(username: &str) -> String {
    let mut escaped = String::with_capacity(username.len());
    for c in username.chars() {
        match c {
            '=' => escaped.push_str("=3D"),
            ',' => escaped.push_str("=2C"),
            _ => escaped.push(c),
        }
    }
    escaped
}
