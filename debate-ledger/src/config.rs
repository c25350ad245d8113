//! Configuration for the ledger

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory for the JSON collections
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Display name stored when an opponent cannot be resolved
    pub unknown_opponent_name: String,

    /// Pretty-print collection files
    pub pretty_json: bool,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/debate-ledger"),
            service_name: "debate-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            unknown_opponent_name: "Unknown participant".to_string(),
            pretty_json: true,
            logging: LoggingConfig::default(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable single line
    Compact,
    /// One JSON object per event
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive; `RUST_LOG` overrides it
    pub filter: String,

    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,debate_ledger=info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("DEBATE_LEDGER_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(filter) = std::env::var("DEBATE_LEDGER_LOG") {
            config.logging.filter = filter;
        }

        if let Ok(format) = std::env::var("DEBATE_LEDGER_LOG_FORMAT") {
            config.logging.format = match format.as_str() {
                "json" => LogFormat::Json,
                "compact" => LogFormat::Compact,
                other => {
                    return Err(crate::Error::Config(format!(
                        "Unknown log format: {}",
                        other
                    )))
                }
            };
        }

        if let Ok(name) = std::env::var("DEBATE_LEDGER_UNKNOWN_NAME") {
            config.unknown_opponent_name = name;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "debate-ledger");
        assert_eq!(config.unknown_opponent_name, "Unknown participant");
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert!(config.pretty_json);
    }

    #[test]
    fn test_from_file_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.toml");
        std::fs::write(
            &path,
            "data_dir = \"/var/lib/debates\"\n\n[logging]\nformat = \"json\"\n",
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/debates"));
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.filter, LoggingConfig::default().filter);
        assert_eq!(config.unknown_opponent_name, "Unknown participant");
    }

    #[test]
    fn test_from_file_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.toml");
        std::fs::write(&path, "data_dir = [").unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }
}
