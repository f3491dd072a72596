//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Host-side endpoint configuration
    pub host: Option<HostConfig>,
    /// Joining endpoint configuration
    pub client: Option<ClientConfig>,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, crate::Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load configuration, falling back to defaults when the file does
    /// not exist (everything can be supplied as CLI flags instead).
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, crate::Error> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), crate::Error> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::Error::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| crate::Error::Config(format!("Failed to write config: {}", e)))
    }
}

/// Host-side endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Address the overlay link listens on
    pub listen: String,
    /// Local service port tunneled streams connect to
    pub target_port: u16,
    /// Seconds between liveness probes
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:7777".to_string(),
            target_port: 0,
            ping_interval_secs: default_ping_interval(),
        }
    }
}

/// Joining endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Address of the host's overlay link
    pub server: String,
    /// Local port offered to TCP clients
    pub ingress_port: u16,
    /// Seconds between liveness probes
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: "127.0.0.1:7777".to_string(),
            ingress_port: crate::DEFAULT_INGRESS_PORT,
            ping_interval_secs: default_ping_interval(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

fn default_ping_interval() -> u64 {
    crate::tunnel::DEFAULT_PING_INTERVAL.as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_through_toml() {
        let config = Config {
            host: Some(HostConfig {
                listen: "0.0.0.0:9000".to_string(),
                target_port: 25565,
                ping_interval_secs: 2,
            }),
            client: None,
            logging: LoggingConfig::default(),
        };

        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();

        let host = parsed.host.unwrap();
        assert_eq!(host.listen, "0.0.0.0:9000");
        assert_eq!(host.target_port, 25565);
        assert_eq!(host.ping_interval_secs, 2);
        assert!(parsed.client.is_none());
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let parsed: Config = toml::from_str(
            r#"
            [client]
            server = "203.0.113.9:7777"
            ingress_port = 8888
            "#,
        )
        .unwrap();

        let client = parsed.client.unwrap();
        assert_eq!(client.ping_interval_secs, 5);
        assert_eq!(parsed.logging.level, "info");
    }
}
