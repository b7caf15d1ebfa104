//! Configuration types and loading
//!
//! YAML config with a fallback chain: explicit `--config` path, then
//! `./.rentquery.yml`, then the user config directory. Every field has a
//! default; the built-in defaults reproduce the classic two-port /
//! two-provider demo setup.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::provider::{Fleet, sample_fleet_downtown};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bus endpoint addresses
    pub bus: BusConfig,

    /// Coordinator collect defaults
    pub collect: CollectConfig,

    /// Provider identity and fleet
    pub provider: ProviderConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call early in startup to fail fast with a clear message.
    pub fn validate(&self) -> Result<()> {
        if self.collect.reply_timeout_ms == 0 {
            return Err(eyre::eyre!("collect.reply-timeout-ms must be positive"));
        }
        if self.provider.name.trim().is_empty() {
            return Err(eyre::eyre!("provider.name must not be empty"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let local_config = PathBuf::from(".rentquery.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("rentquery").join("rentquery.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).context(format!("Failed to read {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&contents).context("Failed to parse YAML config")?;
        Ok(config)
    }
}

/// Bus endpoint addresses
///
/// Two well-known endpoints - one for broadcast, one for directed
/// replies. Any agreed values work; the defaults match the classic
/// 5555/5556 port pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Broadcast (fan-out) endpoint bound by the coordinator
    #[serde(rename = "broadcast-addr")]
    pub broadcast_addr: String,

    /// Directed reply endpoint bound by the coordinator
    #[serde(rename = "reply-addr")]
    pub reply_addr: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            broadcast_addr: "127.0.0.1:5555".to_string(),
            reply_addr: "127.0.0.1:5556".to_string(),
        }
    }
}

/// Coordinator collect defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectConfig {
    /// Number of provider replies to wait for
    #[serde(rename = "expected-replies")]
    pub expected_replies: usize,

    /// Per-reply wait budget in milliseconds
    #[serde(rename = "reply-timeout-ms")]
    pub reply_timeout_ms: u64,

    /// Grace period between bind and broadcast so slow-connecting
    /// providers catch the command
    #[serde(rename = "settle-ms")]
    pub settle_ms: u64,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            expected_replies: 2,
            reply_timeout_ms: 5000,
            settle_ms: 2000,
        }
    }
}

impl CollectConfig {
    /// Per-reply timeout as a Duration
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    /// Settle grace as a Duration
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// Provider identity and fleet
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider identity, unique per instance for the session
    pub name: String,

    /// Opaque contact endpoint advertised in replies
    #[serde(rename = "contact-uri")]
    pub contact_uri: String,

    /// Bound on the wait for the acknowledgment; `null` waits forever
    #[serde(rename = "ack-timeout-ms")]
    pub ack_timeout_ms: Option<u64>,

    /// The fleet to advertise from
    pub fleet: Fleet,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: "Downtown Rentals".to_string(),
            contact_uri: "http://api.downtown.example/rental".to_string(),
            ack_timeout_ms: Some(5000),
            fleet: sample_fleet_downtown(),
        }
    }
}

impl ProviderConfig {
    /// Ack wait bound as a Duration, `None` meaning unbounded
    pub fn ack_timeout(&self) -> Option<Duration> {
        self.ack_timeout_ms.map(Duration::from_millis)
    }
}
