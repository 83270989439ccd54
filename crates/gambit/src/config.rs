//! Configuration management for the Gambit session server.
//!
//! This module handles loading, validation, and conversion of server
//! configuration from TOML files and command-line arguments.

use serde::{Deserialize, Serialize};
use session_server::ServerConfig;
use std::path::PathBuf;
use tracing::info;

fn default_max_connections() -> usize {
    1000
}

/// Default per-side clock allotment, in seconds.
fn default_base_time() -> u64 {
    300
}

/// Application configuration loaded from TOML file.
///
/// This is the main configuration structure that encompasses all server
/// settings including networking, session defaults, and logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration settings
    pub server: ServerSettings,
    /// Logging configuration settings
    pub logging: LoggingSettings,
}

/// Server-specific configuration settings.
///
/// Controls network binding, connection limits, and session defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Network address to bind the server to (e.g., "127.0.0.1:8080")
    pub bind_address: String,
    /// Maximum number of concurrent client connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Per-side clock allotment for rooms that do not specify one, in seconds
    #[serde(default = "default_base_time")]
    pub default_base_time: u64,
}

/// Logging system configuration.
///
/// Controls log output format, levels, and destination settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
    /// Optional file path for log output (None means stdout only)
    pub file_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                bind_address: "127.0.0.1:8080".to_string(),
                max_connections: default_max_connections(),
                default_base_time: default_base_time(),
            },
            logging: LoggingSettings {
                level: "info".to_string(),
                json_format: false,
                file_path: None,
            },
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, creates a default configuration file at
    /// the specified path and returns the default configuration.
    pub async fn load_from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Converts the application configuration to a session server
    /// configuration.
    pub fn to_server_config(&self) -> Result<ServerConfig, Box<dyn std::error::Error>> {
        Ok(ServerConfig {
            bind_address: self.server.bind_address.parse()?,
            max_connections: self.server.max_connections,
            default_base_time: self.server.default_base_time,
        })
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the configuration is valid, or an error string describing
    /// the issue.
    pub fn validate(&self) -> Result<(), String> {
        if self
            .server
            .bind_address
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            return Err(format!(
                "Invalid bind address: {}",
                &self.server.bind_address
            ));
        }

        if self.server.default_base_time == 0 {
            return Err("server.default_base_time must be greater than 0".to_string());
        }

        if self.server.max_connections == 0 {
            return Err("server.max_connections must be greater than 0".to_string());
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;
    use tokio::fs;

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();

        assert_eq!(config.server.bind_address, "127.0.0.1:8080");
        assert_eq!(config.server.max_connections, 1000);
        assert_eq!(config.server.default_base_time, 300);

        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json_format);
        assert!(config.logging.file_path.is_none());
    }

    #[tokio::test]
    async fn test_load_from_nonexistent_file_creates_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(config.server.bind_address, "127.0.0.1:8080");
        assert_eq!(config.server.default_base_time, 300);

        // Should create the file
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_load_from_existing_file() {
        let toml_content = r#"
[server]
bind_address = "0.0.0.0:3000"
max_connections = 2000
default_base_time = 600

[logging]
level = "debug"
json_format = true
file_path = "/tmp/test.log"
"#;

        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), toml_content).await.unwrap();

        let config = AppConfig::load_from_file(&temp_file.path().to_path_buf())
            .await
            .unwrap();

        assert_eq!(config.server.bind_address, "0.0.0.0:3000");
        assert_eq!(config.server.max_connections, 2000);
        assert_eq!(config.server.default_base_time, 600);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);
        assert_eq!(config.logging.file_path, Some("/tmp/test.log".to_string()));
    }

    #[test]
    fn test_serde_deserialization_with_defaults() {
        let toml_content = r#"
[server]
bind_address = "127.0.0.1:8080"

[logging]
level = "info"
json_format = false
"#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();

        // Should use default values for missing fields
        assert_eq!(config.server.max_connections, 1000);
        assert_eq!(config.server.default_base_time, 300);
        assert!(config.logging.file_path.is_none());
    }

    #[test]
    fn test_to_server_config_conversion() {
        let mut config = AppConfig::default();
        config.server.bind_address = "192.168.1.100:9000".to_string();
        config.server.max_connections = 50;
        config.server.default_base_time = 120;

        let server_config = config.to_server_config().unwrap();
        assert_eq!(server_config.bind_address.to_string(), "192.168.1.100:9000");
        assert_eq!(server_config.max_connections, 50);
        assert_eq!(server_config.default_base_time, 120);
    }

    #[test]
    fn test_validation_valid_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_bind_address() {
        let mut config = AppConfig::default();
        config.server.bind_address = "invalid_address".to_string();

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("Invalid bind address"));
    }

    #[test]
    fn test_validation_zero_base_time() {
        let mut config = AppConfig::default();
        config.server.default_base_time = 0;

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("default_base_time"));
    }

    #[test]
    fn test_validation_invalid_log_level() {
        let mut config = AppConfig::default();
        config.logging.level = "invalid_level".to_string();

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("Invalid log level"));
    }

    #[test]
    fn test_validation_valid_log_levels() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            let mut config = AppConfig::default();
            config.logging.level = level.to_string();
            assert!(config.validate().is_ok(), "Level '{level}' should be valid");
        }
    }
}
