//! Client configuration
//!
//! Configuration is static: it is loaded once at startup and handed to
//! [`ClientBuilder`](crate::ClientBuilder). It can come from:
//! - a TOML file ([`ClientConfig::from_file`])
//! - a TOML string ([`ClientConfig::from_toml_str`])
//! - defaults, with the endpoint overridable through `HIVEWIRE_ENDPOINT`
//!
//! Every field has a default, so a file only needs the values it changes:
//!
//! ```toml
//! endpoint = "wss://focushive.example/ws"
//! max_reconnect_attempts = 5
//! heartbeat_interval_ms = 15000
//! ```

use hivewire_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Realtime client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// WebSocket URL of the broker
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Value of the STOMP `host` header
    #[serde(default = "default_host")]
    pub host: String,

    /// Backoff delay for the first reconnection attempt
    #[serde(default = "default_base_reconnect_delay")]
    pub base_reconnect_delay_ms: u64,

    /// Upper bound on any backoff delay (before jitter)
    #[serde(default = "default_max_reconnect_delay")]
    pub max_reconnect_delay_ms: u64,

    /// Reconnection attempts before the client gives up
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Period of the liveness message while connected
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_ms: u64,

    /// Minimum spacing between two presence status sends
    #[serde(default = "default_presence_quiet_interval")]
    pub presence_quiet_interval_ms: u64,

    /// Deadline for transport open plus STOMP handshake
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_ms: u64,

    /// Destination of the liveness message
    #[serde(default = "default_heartbeat_destination")]
    pub heartbeat_destination: String,

    /// Destination of local presence status changes
    #[serde(default = "default_presence_status_destination")]
    pub presence_status_destination: String,

    /// Destinations containing this segment carry presence frames
    #[serde(default = "default_presence_segment")]
    pub presence_segment: String,

    /// The connected user, if known; lets local status changes show up in
    /// presence queries before the broker echoes them
    #[serde(default)]
    pub user_id: Option<i64>,
}

fn default_endpoint() -> String {
    std::env::var("HIVEWIRE_ENDPOINT").unwrap_or_else(|_| "ws://localhost:8080/ws".to_string())
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_base_reconnect_delay() -> u64 {
    1_000
}

fn default_max_reconnect_delay() -> u64 {
    30_000
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

fn default_heartbeat_interval() -> u64 {
    30_000
}

fn default_presence_quiet_interval() -> u64 {
    1_000
}

fn default_handshake_timeout() -> u64 {
    10_000
}

fn default_heartbeat_destination() -> String {
    "/app/presence/ws-heartbeat".to_string()
}

fn default_presence_status_destination() -> String {
    "/app/presence/status".to_string()
}

fn default_presence_segment() -> String {
    "/presence".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            host: default_host(),
            base_reconnect_delay_ms: default_base_reconnect_delay(),
            max_reconnect_delay_ms: default_max_reconnect_delay(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            heartbeat_interval_ms: default_heartbeat_interval(),
            presence_quiet_interval_ms: default_presence_quiet_interval(),
            handshake_timeout_ms: default_handshake_timeout(),
            heartbeat_destination: default_heartbeat_destination(),
            presence_status_destination: default_presence_status_destination(),
            presence_segment: default_presence_segment(),
            user_id: None,
        }
    }
}

impl ClientConfig {
    /// Defaults pointed at a specific endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Load and validate configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: ClientConfig = toml::from_str(contents)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.is_empty() {
            return Err(Error::Config("endpoint must not be empty".to_string()));
        }
        if self.max_reconnect_attempts == 0 {
            return Err(Error::Config(
                "max_reconnect_attempts must be positive".to_string(),
            ));
        }
        if self.base_reconnect_delay_ms > self.max_reconnect_delay_ms {
            return Err(Error::Config(format!(
                "base_reconnect_delay_ms ({}) exceeds max_reconnect_delay_ms ({})",
                self.base_reconnect_delay_ms, self.max_reconnect_delay_ms
            )));
        }
        if self.presence_segment.trim().is_empty() {
            return Err(Error::Config(
                "presence_segment must not be empty".to_string(),
            ));
        }
        let intervals = [
            ("heartbeat_interval_ms", self.heartbeat_interval_ms),
            ("presence_quiet_interval_ms", self.presence_quiet_interval_ms),
            ("handshake_timeout_ms", self.handshake_timeout_ms),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(Error::Config(format!("{} must be positive", name)));
            }
        }
        Ok(())
    }

    pub fn base_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.base_reconnect_delay_ms)
    }

    pub fn max_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.max_reconnect_delay_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn presence_quiet_interval(&self) -> Duration {
        Duration::from_millis(self.presence_quiet_interval_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}
