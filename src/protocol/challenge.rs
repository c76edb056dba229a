//! Decoded server challenges.
//!
//! A `<challenge>` carries base64 text. Both DIGEST-MD5 and SCRAM encode
//! the decoded payload as comma-separated `key=value` pairs, which
//! [`Challenge::params`] exposes for whoever continues the exchange.

use std::collections::BTreeMap;

use super::xml::XmlNode;
use crate::codec::base64;
use crate::error::{Result, SaslError};

/// A decoded SASL challenge payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    payload: Vec<u8>,
}

impl Challenge {
    /// Wrap an already decoded payload
    pub fn new(payload: Vec<u8>) -> Self {
        Self { payload }
    }

    /// Decode a complete `<challenge>...</challenge>` span.
    pub fn decode(span: &[u8]) -> Result<Self> {
        let node = XmlNode::parse_bytes(span)?;
        if node.local_name() != "challenge" {
            return Err(SaslError::Xml(format!(
                "expected <challenge>, got <{}>",
                node.name
            )));
        }
        Ok(Self::new(base64::decode(node.text.as_bytes())?))
    }

    /// Raw decoded bytes
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Decoded bytes as text, if UTF-8
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    /// Parse `key=value` pairs, unquoting `"..."` values.
    ///
    /// Commas inside quoted values do not split. Entries without `=` are
    /// skipped; a repeated key keeps its last value.
    pub fn params(&self) -> BTreeMap<String, String> {
        let text = String::from_utf8_lossy(&self.payload);
        let mut params = BTreeMap::new();

        for entry in split_unquoted(&text) {
            let Some((key, value)) = entry.split_once('=') else {
                continue;
            };
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            params.insert(key.trim().to_string(), value.to_string());
        }
        params
    }

    /// Consume into the raw payload
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

fn split_unquoted(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quoted = false;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '"' => quoted = !quoted,
            ',' if !quoted => {
                parts.push(&text[start..i]);
                start = i + 1;
            },
            _ => {},
        }
    }
    parts.push(&text[start..]);
    parts.retain(|part| !part.trim().is_empty());
    parts
}
