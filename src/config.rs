//! Session configuration.
//!
//! [`SessionConfig`] carries everything a front end decides before talking
//! to the reader. It can be built with chained setters or loaded from a
//! JSON profile; missing fields take their defaults.
//!
//! ```
//! use cartwire::{CartridgeFamily, SessionConfig};
//!
//! let config = SessionConfig::from_json(r#"{ "port": "/dev/ttyACM1", "family": "game_boy" }"#).unwrap();
//! assert_eq!(config.port, "/dev/ttyACM1");
//! assert_eq!(config.family, CartridgeFamily::GameBoy);
//! assert_eq!(config.baud_rate, 500_000);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::{HandshakePolicy, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_MISSES};
use crate::dump::{RetryPolicy, DEFAULT_MAX_ATTEMPTS};
use crate::error::Result;
use crate::header::CartridgeFamily;
use crate::transport::{SerialLink, DEFAULT_BAUD_RATE};

/// Default serial port.
pub const DEFAULT_PORT: &str = "/dev/ttyACM0";

/// Parameters for one reader session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub port: String,
    pub baud_rate: u32,
    /// Per-read timeout. `None` uses the family's default.
    pub timeout_ms: Option<u64>,
    pub family: CartridgeFamily,
    /// Stop after reading the header.
    pub header_only: bool,
    pub handshake_misses: u32,
    /// Overall connect deadline. `None` waits forever.
    pub connect_timeout_ms: Option<u64>,
    pub sector_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: None,
            family: CartridgeFamily::default(),
            header_only: false,
            handshake_misses: DEFAULT_MAX_MISSES,
            connect_timeout_ms: Some(DEFAULT_CONNECT_TIMEOUT.as_millis() as u64),
            sector_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl SessionConfig {
    /// Config for `port` and `family` with everything else defaulted.
    pub fn new(port: impl Into<String>, family: CartridgeFamily) -> Self {
        Self {
            port: port.into(),
            family,
            ..Self::default()
        }
    }

    /// Parse a JSON profile.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON profile from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Set the baud rate.
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the per-read timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Only read the header.
    pub fn header_only(mut self, header_only: bool) -> Self {
        self.header_only = header_only;
        self
    }

    /// Set the connect deadline.
    pub fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout_ms = timeout.map(|t| t.as_millis() as u64);
        self
    }

    /// Set the attempts per sector.
    pub fn sector_attempts(mut self, attempts: u32) -> Self {
        self.sector_attempts = attempts;
        self
    }

    /// Effective per-read timeout.
    pub fn read_timeout(&self) -> Duration {
        self.timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.family.default_timeout())
    }

    /// Serial endpoint for this config.
    pub fn link(&self) -> SerialLink {
        SerialLink::new(self.port.clone())
            .baud_rate(self.baud_rate)
            .timeout(self.read_timeout())
    }

    /// Handshake policy for this config.
    pub fn handshake(&self) -> HandshakePolicy {
        HandshakePolicy::new()
            .max_misses(self.handshake_misses)
            .connect_timeout(self.connect_timeout_ms.map(Duration::from_millis))
    }

    /// Retry policy for this config.
    pub fn retry(&self) -> RetryPolicy {
        RetryPolicy::new(self.sector_attempts)
    }
}
