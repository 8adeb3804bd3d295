//! Configuration for the echo server
//!
//! Sources, lowest precedence first:
//! - Default values
//! - Configuration file (config.toml, or the path in WSRPC_CONFIG_FILE)
//! - Environment variables with the WSRPC prefix (WSRPC__SERVER__PORT=4000)
//! - Legacy HOST, PORT and RUST_LOG variables

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tracing::{debug, info};

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const VALID_FORMATS: [&str; 2] = ["pretty", "compact"];

/// Main configuration struct for the echo server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to (default: 127.0.0.1)
    pub host: IpAddr,

    /// Port to bind to (default: 3000)
    pub port: u16,

    /// Route serving the WebSocket endpoint (default: /ws)
    pub websocket_path: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    pub level: String,

    /// Log format (pretty, compact)
    pub format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3000,
            websocket_path: "/ws".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment and optional config file
    pub fn load() -> Result<Self> {
        let config_path =
            std::env::var("WSRPC_CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        let mut settings = Self::load_from(&config_path)?;

        settings.apply_env_overrides()?;
        settings.validate()?;

        Ok(settings)
    }

    /// Layer the given config file (if present) and WSRPC__ variables over the defaults
    pub fn load_from(config_path: &str) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if std::path::Path::new(config_path).exists() {
            info!("Loading configuration from {}", config_path);
            builder = builder.add_source(File::with_name(config_path));
        } else {
            debug!("No config file found at {}, using defaults", config_path);
        }

        builder = builder.add_source(
            Environment::with_prefix("WSRPC")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;
        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Apply direct environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("HOST") {
            info!("Using HOST environment variable");
            self.server.host = host.parse().context("Invalid HOST value")?;
        }

        if let Ok(port) = std::env::var("PORT") {
            info!("Using PORT environment variable");
            self.server.port = port.parse().context("Invalid PORT value")?;
        }

        if let Ok(log_level) = std::env::var("RUST_LOG") {
            info!("Using RUST_LOG environment variable");
            self.logging.level = log_level;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port cannot be 0");
        }

        if !self.server.websocket_path.starts_with('/') {
            anyhow::bail!(
                "WebSocket path '{}' must start with '/'",
                self.server.websocket_path
            );
        }

        if !self.is_filter_directive() {
            let level_lower = self.logging.level.to_lowercase();
            if !VALID_LEVELS.contains(&level_lower.as_str()) {
                anyhow::bail!(
                    "Invalid log level '{}'. Must be one of: {:?}",
                    self.logging.level,
                    VALID_LEVELS
                );
            }
        }

        let format_lower = self.logging.format.to_lowercase();
        if !VALID_FORMATS.contains(&format_lower.as_str()) {
            anyhow::bail!(
                "Invalid log format '{}'. Must be one of: {:?}",
                self.logging.format,
                VALID_FORMATS
            );
        }

        Ok(())
    }

    fn is_filter_directive(&self) -> bool {
        self.logging.level.contains('=') || self.logging.level.contains(',')
    }

    /// Get the socket address for the server
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.server.host, self.server.port))
    }

    /// Get the log filter string for tracing
    pub fn log_filter(&self) -> String {
        if self.is_filter_directive() {
            self.logging.level.clone()
        } else {
            let level = self.logging.level.to_lowercase();
            format!(
                "wsrpc_echo_server={},ras_wsrpc_server={},{}",
                level, level, level
            )
        }
    }

    pub fn compact_logs(&self) -> bool {
        self.logging.format.eq_ignore_ascii_case("compact")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3000");
        assert_eq!(config.server.websocket_path, "/ws");
        assert!(!config.compact_logs());
    }

    #[test]
    fn test_invalid_config() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        config.server.port = 3000;
        config.server.websocket_path = "ws".to_string();
        assert!(config.validate().is_err());

        config.server.websocket_path = "/rpc".to_string();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "debug".to_string();
        config.logging.format = "json".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_filter() {
        let mut config = Config::default();
        config.logging.level = "DEBUG".to_string();
        assert_eq!(
            config.log_filter(),
            "wsrpc_echo_server=debug,ras_wsrpc_server=debug,debug"
        );

        config.logging.level = "warn,ras_wsrpc_server=trace".to_string();
        assert!(config.validate().is_ok());
        assert_eq!(config.log_filter(), "warn,ras_wsrpc_server=trace");
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[server]\nport = 4100\nwebsocket_path = \"/rpc\"\n\n[logging]\nformat = \"compact\""
        )
        .unwrap();

        let config = Config::load_from(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.server.port, 4100);
        assert_eq!(config.server.websocket_path, "/rpc");
        assert_eq!(config.server.host, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.logging.level, "info");
        assert!(config.compact_logs());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load_from("/nonexistent/wsrpc-config.toml").unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.logging.format, "pretty");
    }
}
