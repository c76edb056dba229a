//! Base64 transport encoding for SASL payloads.
//!
//! SASL data travels as the text content of `<auth>`, `<challenge>` and
//! `<response>` elements, so encoded output is always a single line.
//! Servers are allowed to fold long challenges; ASCII whitespace is stripped
//! before decoding.

use ::base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::error::Result;

/// Encode bytes as single-line padded base64.
pub fn encode(bytes: impl AsRef<[u8]>) -> String {
    let mut encoded = BASE64.encode(bytes);
    // The engine never folds, but the payload must stay a single text node
    encoded.retain(|c| c != '\n' && c != '\r');
    encoded
}

/// Decode standard padded base64 into raw bytes.
pub fn decode(text: impl AsRef<[u8]>) -> Result<Vec<u8>> {
    let text = text.as_ref();
    if text.iter().any(u8::is_ascii_whitespace) {
        let compact: Vec<u8> = text
            .iter()
            .copied()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        return Ok(BASE64.decode(compact)?);
    }
    Ok(BASE64.decode(text)?)
}
