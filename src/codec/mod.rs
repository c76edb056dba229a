//! Byte-level codecs for the SASL negotiation.
//!
//! Two concerns live here, both independent of XMPP semantics:
//!
//! - [`buffer`]: delimiter-based span extraction over the receive buffer
//! - [`base64`]: single-line base64 for SASL payloads
//!
//! # Usage
//!
//! ```rust,ignore
//! use xmppsasl::codec::{self, StreamBuffer};
//!
//! let mut buffer = StreamBuffer::new();
//! buffer.extend(b"<challenge xmlns='urn:ietf:params:xml:ns:xmpp-sasl'>cj1h");
//! assert!(buffer.extract("<challenge", "</challenge>").is_none());
//!
//! buffer.extend(b"YmM=</challenge>");
//! let span = buffer.extract("<challenge", "</challenge>").unwrap();
//!
//! let payload = codec::base64::decode("cj1hYmM=")?;
//! assert_eq!(payload, b"r=abc");
//! ```

pub mod base64;
pub mod buffer;

pub use buffer::{extract, StreamBuffer};
