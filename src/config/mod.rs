//! Configuration management.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables
//! - CLI arguments (merged by the binary)

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SaslError};
use crate::protocol::Credentials;

/// Main configuration struct
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Server address
    #[serde(default)]
    pub server: ServerConfig,

    /// Login credentials
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Session/driver tuning
    #[serde(default)]
    pub session: SessionConfig,
}

impl Config {
    /// Default config file location (`<config_dir>/xmpp-sasl/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("xmpp-sasl").join("config.toml"))
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SaslError::Config(format!("Failed to read config file {}: {e}", path.display()))
        })?;

        Ok(toml::from_str(&content)?)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("XMPP_SASL_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("XMPP_SASL_PORT") {
            if let Ok(port) = port.parse() {
                config.server.port = port;
            }
        }
        if let Ok(username) = std::env::var("XMPP_SASL_USERNAME") {
            config.credentials.username = username;
        }
        if let Ok(password) = std::env::var("XMPP_SASL_PASSWORD") {
            config.credentials.password = password;
        }
        if let Ok(val) = std::env::var("XMPP_SASL_READ_TIMEOUT") {
            if let Ok(val) = val.parse() {
                config.session.read_timeout_secs = val;
            }
        }

        config
    }

    /// Merge with another config (other's non-default values take precedence)
    pub fn merge(self, other: Self) -> Self {
        let server_default = ServerConfig::default();
        let session_default = SessionConfig::default();

        Self {
            server: ServerConfig {
                host: pick(self.server.host, other.server.host, &server_default.host),
                port: pick(self.server.port, other.server.port, &server_default.port),
                service: pick(
                    self.server.service,
                    other.server.service,
                    &server_default.service,
                ),
            },
            credentials: CredentialsConfig {
                username: pick(
                    self.credentials.username,
                    other.credentials.username,
                    &String::new(),
                ),
                password: pick(
                    self.credentials.password,
                    other.credentials.password,
                    &String::new(),
                ),
            },
            session: SessionConfig {
                connect_timeout_secs: pick(
                    self.session.connect_timeout_secs,
                    other.session.connect_timeout_secs,
                    &session_default.connect_timeout_secs,
                ),
                read_timeout_secs: pick(
                    self.session.read_timeout_secs,
                    other.session.read_timeout_secs,
                    &session_default.read_timeout_secs,
                ),
                read_buffer_size: pick(
                    self.session.read_buffer_size,
                    other.session.read_buffer_size,
                    &session_default.read_buffer_size,
                ),
            },
        }
    }

    /// Credentials for a new session
    pub fn credentials(&self) -> Result<Credentials> {
        if self.server.host.is_empty() {
            return Err(SaslError::Config("server host is not set".to_string()));
        }
        if self.credentials.username.is_empty() {
            return Err(SaslError::Config("username is not set".to_string()));
        }
        Ok(Credentials::new(
            &self.server.host,
            &self.credentials.username,
            &self.credentials.password,
        ))
    }
}

fn pick<T: PartialEq>(base: T, other: T, default: &T) -> T {
    if other != *default {
        other
    } else {
        base
    }
}

/// Server address configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// XMPP domain, also used to connect when no SRV lookup is done
    pub host: String,

    /// Client-to-server port
    pub port: u16,

    /// Service name (informational, `xmpp-client`)
    pub service: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5222,
            service: "xmpp-client".to_string(),
        }
    }
}

impl ServerConfig {
    /// Get the `host:port` connect address
    pub fn connect_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Credentials configuration
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Authentication identity
    pub username: String,

    /// Password
    pub password: String,
}

impl std::fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Driver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// TCP connect timeout in seconds
    pub connect_timeout_secs: u64,

    /// Maximum wait for the next read in seconds
    pub read_timeout_secs: u64,

    /// Size of the socket read buffer
    pub read_buffer_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            read_timeout_secs: 30,
            read_buffer_size: 4096,
        }
    }
}

impl SessionConfig {
    /// Connect timeout as a duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Read timeout as a duration
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}
