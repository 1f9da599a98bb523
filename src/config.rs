//! Slot registry and host configuration.
//!
//! Limits default to the compatibility constants and may be overridden from
//! a YAML file or the environment:
//!
//! ```yaml
//! max_message_size: 128
//! max_slots: 256
//! ```
//!
//! # Environment Variables
//!
//! - `MESSAGE_SLOT_MAX_MESSAGE_SIZE` — maximum message size in bytes
//! - `MESSAGE_SLOT_MAX_SLOTS` — number of admissible slot identifiers
//! - `MESSAGE_SLOT_ADDR` — host bind address (overrides `PORT`)
//! - `PORT` — host port on all interfaces (default: 7350)
//! - `MESSAGE_SLOT_URL` — base URL the CLIs use to reach the host

use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{MAX_MESSAGE_SIZE, MAX_SLOTS};

/// Default port for the slot host.
pub const DEFAULT_PORT: u16 = 7350;

/// Default base URL for clients.
pub const DEFAULT_URL: &str = "http://127.0.0.1:7350";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A value was present but unusable.
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

/// Sizing limits for a [`ChannelRegistry`](crate::registry::ChannelRegistry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotConfig {
    /// Largest message a channel accepts, in bytes.
    pub max_message_size: usize,
    /// Slot identifiers are admissible in `0..max_slots`.
    pub max_slots: usize,
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self {
            max_message_size: MAX_MESSAGE_SIZE,
            max_slots: MAX_SLOTS,
        }
    }
}

impl SlotConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from YAML text. Missing keys keep defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Defaults overridden by `MESSAGE_SLOT_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(raw) = lookup("MESSAGE_SLOT_MAX_MESSAGE_SIZE") {
            config.max_message_size = parse_usize("MESSAGE_SLOT_MAX_MESSAGE_SIZE", &raw)?;
        }
        if let Some(raw) = lookup("MESSAGE_SLOT_MAX_SLOTS") {
            config.max_slots = parse_usize("MESSAGE_SLOT_MAX_SLOTS", &raw)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Reject limits that would make every operation fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_message_size == 0 {
            return Err(ConfigError::Invalid {
                key: "max_message_size".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_slots == 0 {
            return Err(ConfigError::Invalid {
                key: "max_slots".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_usize(key: &str, raw: &str) -> Result<usize, ConfigError> {
    raw.trim().parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// Settings for the `slot_host` daemon and its clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    /// Address the host listens on.
    pub bind_addr: SocketAddr,
    /// Base URL clients use to reach the host.
    pub base_url: String,
    /// Registry limits.
    pub slots: SlotConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            base_url: DEFAULT_URL.to_string(),
            slots: SlotConfig::default(),
        }
    }
}

impl HostConfig {
    /// Read host settings from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self {
            slots: SlotConfig::from_lookup(&lookup)?,
            ..Self::default()
        };

        if let Some(addr) = lookup("MESSAGE_SLOT_ADDR") {
            config.bind_addr = addr.trim().parse().map_err(|e: std::net::AddrParseError| {
                ConfigError::Invalid {
                    key: "MESSAGE_SLOT_ADDR".to_string(),
                    reason: e.to_string(),
                }
            })?;
        } else if let Some(port) = lookup("PORT") {
            let port: u16 = port.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::Invalid {
                    key: "PORT".to_string(),
                    reason: e.to_string(),
                }
            })?;
            config.bind_addr = SocketAddr::from(([0, 0, 0, 0], port));
        }

        if let Some(url) = lookup("MESSAGE_SLOT_URL") {
            config.base_url = url.trim().trim_end_matches('/').to_string();
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_match_constants() {
        let config = SlotConfig::default();
        assert_eq!(config.max_message_size, 128);
        assert_eq!(config.max_slots, 256);
    }

    #[test]
    fn test_from_yaml_partial() {
        let config = SlotConfig::from_yaml("max_message_size: 64\n").unwrap();
        assert_eq!(config.max_message_size, 64);
        assert_eq!(config.max_slots, MAX_SLOTS);
    }

    #[test]
    fn test_from_yaml_rejects_zero() {
        let err = SlotConfig::from_yaml("max_slots: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "max_slots"));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_message_size: 16\nmax_slots: 4").unwrap();
        let config = SlotConfig::from_file(file.path()).unwrap();
        assert_eq!(
            config,
            SlotConfig {
                max_message_size: 16,
                max_slots: 4
            }
        );
    }

    #[test]
    fn test_from_file_missing() {
        let err = SlotConfig::from_file("/nonexistent/slots.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_env_overrides() {
        let config = SlotConfig::from_lookup(lookup_from(&[
            ("MESSAGE_SLOT_MAX_MESSAGE_SIZE", "32"),
            ("MESSAGE_SLOT_MAX_SLOTS", " 8 "),
        ]))
        .unwrap();
        assert_eq!(config.max_message_size, 32);
        assert_eq!(config.max_slots, 8);
    }

    #[test]
    fn test_env_rejects_garbage() {
        let err =
            SlotConfig::from_lookup(lookup_from(&[("MESSAGE_SLOT_MAX_SLOTS", "many")])).unwrap_err();
        assert!(err.to_string().contains("MESSAGE_SLOT_MAX_SLOTS"));
    }

    #[test]
    fn test_host_defaults() {
        let config = HostConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, HostConfig::default());
    }

    #[test]
    fn test_host_port_and_url() {
        let config = HostConfig::from_lookup(lookup_from(&[
            ("PORT", "9000"),
            ("MESSAGE_SLOT_URL", "http://slots.local:9000/"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr, SocketAddr::from(([0, 0, 0, 0], 9000)));
        assert_eq!(config.base_url, "http://slots.local:9000");
    }

    #[test]
    fn test_host_addr_wins_over_port() {
        let config = HostConfig::from_lookup(lookup_from(&[
            ("PORT", "9000"),
            ("MESSAGE_SLOT_ADDR", "127.0.0.1:9100"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr, SocketAddr::from(([127, 0, 0, 1], 9100)));
    }
}
