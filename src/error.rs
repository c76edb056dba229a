//! SASL negotiation error types.
//!
//! # Error Classification
//!
//! Every variant here is fatal to the session that produced it: the session
//! moves to `Closed` and the transport is disconnected. Incomplete data is
//! never an error; the extractor reports it as `None` and the session simply
//! waits for the next read.
//!
//! - **Server said no**: `Rejected`, `StreamError`, `UnsupportedMechanism`
//! - **Server sent garbage**: `Xml`, `Base64`
//! - **Local faults**: `Transport`, `Timeout`, `InvalidState`, `Io`, `Config`

use thiserror::Error;

/// SASL negotiation errors.
#[derive(Error, Debug)]
pub enum SaslError {
    /// A fully delimited span was not well-formed XML.
    #[error("XML parse error: {0}")]
    Xml(String),

    /// A challenge payload was not valid base64.
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The server offered no mechanism this client will use.
    #[error("Unsupported mechanism: {0}")]
    UnsupportedMechanism(String),

    /// The server answered with a SASL `<failure>`.
    #[error("Authentication rejected: {0}")]
    Rejected(String),

    /// The server closed the stream with a `<stream:error>`.
    #[error("Stream error: {0}")]
    StreamError(String),

    /// The transport reported an error.
    #[error("Transport error: {0}")]
    Transport(String),

    /// No expected data arrived within the configured window.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// An event arrived that the current state cannot accept.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for SASL operations
pub type Result<T> = std::result::Result<T, SaslError>;

impl From<quick_xml::Error> for SaslError {
    fn from(err: quick_xml::Error) -> Self {
        SaslError::Xml(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for SaslError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        SaslError::Xml(format!("attribute: {err}"))
    }
}

impl From<toml::de::Error> for SaslError {
    fn from(err: toml::de::Error) -> Self {
        SaslError::Config(err.to_string())
    }
}
