//! SASL mechanism selection.
//!
//! The server advertises what it accepts; the client picks by a fixed
//! priority, strongest first. Selection never fails: when nothing stronger
//! is offered the result is [`Mechanism::None`] (PLAIN), and the session
//! decides what to do with that.

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SaslError;

/// Mechanism names advertised by one `<stream:features>` announcement.
pub type MechanismSet = BTreeSet<String>;

/// Supported SASL mechanisms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mechanism {
    /// SCRAM-SHA-1 (RFC 5802)
    Sha1,
    /// DIGEST-MD5 (RFC 2831)
    Md5,
    /// No negotiated mechanism, PLAIN fallback
    None,
}

/// Selection priority, first match wins.
static PRIORITY: [Mechanism; 2] = [Mechanism::Sha1, Mechanism::Md5];

impl Mechanism {
    /// Get the SASL mechanism name used on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Mechanism::Sha1 => "SCRAM-SHA-1",
            Mechanism::Md5 => "DIGEST-MD5",
            Mechanism::None => "PLAIN",
        }
    }

    /// All mechanisms in preference order
    pub fn all() -> &'static [Mechanism] {
        &[Mechanism::Sha1, Mechanism::Md5, Mechanism::None]
    }

    /// Whether the `<auth>` element carries an initial response
    pub fn has_initial_response(&self) -> bool {
        matches!(self, Mechanism::Sha1)
    }
}

impl std::fmt::Display for Mechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Mechanism {
    type Err = SaslError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SCRAM-SHA-1" | "SHA1" => Ok(Mechanism::Sha1),
            "DIGEST-MD5" | "MD5" => Ok(Mechanism::Md5),
            "PLAIN" | "NONE" => Ok(Mechanism::None),
            _ => Err(SaslError::UnsupportedMechanism(s.to_string())),
        }
    }
}

/// Pick the strongest supported mechanism from the server's offer.
pub fn select(mechanisms: &MechanismSet) -> Mechanism {
    PRIORITY
        .iter()
        .copied()
        .find(|mechanism| mechanisms.contains(mechanism.name()))
        .unwrap_or(Mechanism::None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> MechanismSet {
        names.iter().map(|name| (*name).to_string()).collect()
    }

    #[test]
    fn test_select_priority() {
        assert_eq!(
            select(&set(&["DIGEST-MD5", "SCRAM-SHA-1", "PLAIN"])),
            Mechanism::Sha1
        );
        assert_eq!(select(&set(&["DIGEST-MD5"])), Mechanism::Md5);
        assert_eq!(select(&set(&["PLAIN", "DIGEST-MD5"])), Mechanism::Md5);
        assert_eq!(select(&set(&[])), Mechanism::None);
        assert_eq!(select(&set(&["PLAIN", "X-OAUTH2"])), Mechanism::None);
    }

    #[test]
    fn test_select_is_case_sensitive() {
        // Mechanism names are registered in upper case
        assert_eq!(select(&set(&["scram-sha-1"])), Mechanism::None);
    }

    #[test]
    fn test_mechanism_names() {
        assert_eq!(Mechanism::Sha1.to_string(), "SCRAM-SHA-1");
        assert_eq!(Mechanism::Md5.name(), "DIGEST-MD5");
        assert_eq!(Mechanism::None.name(), "PLAIN");
        assert!(Mechanism::Sha1.has_initial_response());
        assert!(!Mechanism::Md5.has_initial_response());
        assert_eq!(Mechanism::all().len(), 3);
    }

    #[test]
    fn test_mechanism_from_str() {
        assert_eq!("scram-sha-1".parse::<Mechanism>().unwrap(), Mechanism::Sha1);
        assert_eq!("DIGEST-MD5".parse::<Mechanism>().unwrap(), Mechanism::Md5);
        assert_eq!("plain".parse::<Mechanism>().unwrap(), Mechanism::None);
        assert!("GSSAPI".parse::<Mechanism>().is_err());
    }
}
