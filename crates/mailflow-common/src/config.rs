//! Configuration for Mailflow

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Outbound SMTP relay configuration
    #[serde(default)]
    pub smtp: SmtpConfig,

    /// API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Hostname used in activation links
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// Bind address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Secret key for activation token signing
    #[serde(default)]
    pub secret_key: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            bind_address: default_bind_address(),
            secret_key: String::new(),
        }
    }
}

fn default_hostname() -> String {
    "localhost".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

/// Outbound SMTP relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// Relay hostname
    #[serde(default = "default_smtp_host")]
    pub host: String,

    /// Relay port
    #[serde(default = "default_smtp_port")]
    pub port: u16,

    /// Relay username (if the relay requires authentication)
    pub username: Option<String>,

    /// Relay password
    pub password: Option<String>,

    /// Fallback From address when a mailing has no sender email
    #[serde(default = "default_from_address")]
    pub from_address: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            username: None,
            password: None,
            from_address: default_from_address(),
        }
    }
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from_address() -> String {
    "noreply@localhost".to_string()
}

/// API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API port
    #[serde(default = "default_api_port")]
    pub port: u16,

    /// Statistics cache window in seconds, served as a public
    /// Cache-Control max-age
    #[serde(default = "default_stats_cache_secs")]
    pub stats_cache_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_api_port(),
            stats_cache_secs: default_stats_cache_secs(),
        }
    }
}

fn default_api_port() -> u16 {
    8080
}

fn default_stats_cache_secs() -> u64 {
    300
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Load configuration from default locations
    pub fn load() -> crate::Result<Self> {
        let paths = [
            std::path::PathBuf::from("./config.toml"),
            std::path::PathBuf::from("/etc/mailflow/config.toml"),
        ];

        for path in paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Err(crate::Error::Config(
            "No configuration file found".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let server = ServerConfig::default();
        assert_eq!(server.hostname, "localhost");
        assert_eq!(server.bind_address, "0.0.0.0");

        let api = ApiConfig::default();
        assert_eq!(api.port, 8080);
        assert_eq!(api.stats_cache_secs, 300);

        let smtp = SmtpConfig::default();
        assert_eq!(smtp.port, 587);
        assert!(smtp.username.is_none());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[server]
hostname = "lists.example.com"
secret_key = "not-a-real-secret"

[database]
url = "postgres://localhost/mailflow"

[smtp]
host = "smtp.example.com"
port = 465
from_address = "news@example.com"

[api]
port = 9090
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.hostname, "lists.example.com");
        assert_eq!(config.database.url, "postgres://localhost/mailflow");
        assert_eq!(config.smtp.host, "smtp.example.com");
        assert_eq!(config.smtp.from_address, "news@example.com");
        assert_eq!(config.api.port, 9090);
        assert_eq!(config.api.stats_cache_secs, 300);
    }
}
