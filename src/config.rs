//! Configuration module for CloudVault.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use url::Url;

use crate::{Result, VaultError};

/// Upload engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Maximum number of concurrent network operations (uploads and folder creations).
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Per-transfer timeout in seconds (0 = no timeout).
    #[serde(default)]
    pub transfer_timeout_secs: u64,
    /// Size of the body chunks streamed to the object store, in kilobytes.
    ///
    /// This is also the progress reporting granularity.
    #[serde(default = "default_chunk_size_kb")]
    pub chunk_size_kb: usize,
}

fn default_concurrency() -> usize {
    3
}

fn default_chunk_size_kb() -> usize {
    64
}

impl UploadConfig {
    /// Get the transfer timeout, if any.
    pub fn transfer_timeout(&self) -> Option<Duration> {
        (self.transfer_timeout_secs > 0).then(|| Duration::from_secs(self.transfer_timeout_secs))
    }

    /// Get the chunk size in bytes.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size_kb.max(1) * 1024
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            transfer_timeout_secs: 0,
            chunk_size_kb: default_chunk_size_kb(),
        }
    }
}

/// Drive API configuration (folder creation and upload URL issuance).
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the drive API.
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    /// Session token sent as a bearer token.
    #[serde(default)]
    pub token: String,
    /// Timeout in seconds for API requests, not object transfers (0 = no timeout).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl ApiConfig {
    /// Get the request timeout, if any.
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

fn default_api_base_url() -> String {
    "http://127.0.0.1:3000/api".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            token: String::new(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Drive server configuration: drive API routes and the upload-finalize webhook.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_server_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_server_port")]
    pub port: u16,
    /// Shared secret for the webhook HMAC signature.
    #[serde(default)]
    pub webhook_secret: String,
    /// Object store base URL; upload URLs are this plus the object key.
    #[serde(default = "default_object_base_url")]
    pub object_base_url: String,
}

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    3001
}

fn default_object_base_url() -> String {
    "http://127.0.0.1:9000/cloudvault".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            webhook_secret: String::new(),
            object_base_url: default_object_base_url(),
        }
    }
}

impl ServerConfig {
    /// Validate the settings `serve` depends on.
    pub fn validate(&self) -> Result<()> {
        if self.webhook_secret.is_empty() {
            return Err(VaultError::Config(
                "server.webhook_secret is not set. \
                 Set it in config.toml or via CLOUDVAULT_WEBHOOK_SECRET environment variable."
                    .to_string(),
            ));
        }

        Url::parse(&self.object_base_url)
            .map_err(|e| VaultError::Config(format!("invalid server.object_base_url: {e}")))?;
        Ok(())
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/cloudvault.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/cloudvault.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Upload engine configuration.
    #[serde(default)]
    pub upload: UploadConfig,
    /// Drive API configuration.
    #[serde(default)]
    pub api: ApiConfig,
    /// Drive server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(VaultError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| VaultError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `CLOUDVAULT_API_TOKEN`: Override the drive API session token
    /// - `CLOUDVAULT_WEBHOOK_SECRET`: Override the webhook signing secret
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("CLOUDVAULT_API_TOKEN") {
            if !token.is_empty() {
                self.api.token = token;
            }
        }

        if let Ok(secret) = std::env::var("CLOUDVAULT_WEBHOOK_SECRET") {
            if !secret.is_empty() {
                self.server.webhook_secret = secret;
            }
        }
    }

    /// Validate the upload client configuration.
    ///
    /// Returns an error if:
    /// - Upload concurrency is zero
    /// - The API base URL is not a valid URL
    ///
    /// Server settings are checked separately by [`ServerConfig::validate`].
    pub fn validate(&self) -> Result<()> {
        if self.upload.concurrency == 0 {
            return Err(VaultError::Config(
                "upload.concurrency must be at least 1".to_string(),
            ));
        }

        Url::parse(&self.api.base_url)
            .map_err(|e| VaultError::Config(format!("invalid api.base_url: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.upload.concurrency, 3);
        assert_eq!(config.upload.transfer_timeout_secs, 0);
        assert!(config.upload.transfer_timeout().is_none());
        assert_eq!(config.upload.chunk_size(), 64 * 1024);
        assert_eq!(config.api.base_url, "http://127.0.0.1:3000/api");
        assert_eq!(config.api.request_timeout_secs, 30);
        assert_eq!(config.api.request_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.server.port, 3001);
        assert!(config.server.webhook_secret.is_empty());
        assert_eq!(config.database.path, "data/cloudvault.db");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.file, "logs/cloudvault.log");
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[upload]
concurrency = 6
transfer_timeout_secs = 900
chunk_size_kb = 256

[api]
base_url = "https://drive.example.com/api"
token = "session-token"
request_timeout_secs = 10

[server]
host = "127.0.0.1"
port = 8081
webhook_secret = "hook-secret"
object_base_url = "https://objects.example.com/vault"

[database]
path = "custom/vault.db"

[logging]
level = "debug"
file = "custom/logs/vault.log"
"#;

        let config = Config::parse(toml).unwrap();

        assert_eq!(config.upload.concurrency, 6);
        assert_eq!(
            config.upload.transfer_timeout(),
            Some(Duration::from_secs(900))
        );
        assert_eq!(config.upload.chunk_size(), 256 * 1024);

        assert_eq!(config.api.base_url, "https://drive.example.com/api");
        assert_eq!(config.api.token, "session-token");
        assert_eq!(config.api.request_timeout_secs, 10);

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.webhook_secret, "hook-secret");
        assert_eq!(config.server.object_base_url, "https://objects.example.com/vault");
        assert!(config.server.validate().is_ok());

        assert_eq!(config.database.path, "custom/vault.db");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.file, "custom/logs/vault.log");

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
[upload]
concurrency = 1
"#;

        let config = Config::parse(toml).unwrap();

        assert_eq!(config.upload.concurrency, 1);
        assert_eq!(config.upload.chunk_size_kb, 64);
        assert_eq!(config.api.base_url, "http://127.0.0.1:3000/api");
    }

    #[test]
    fn test_parse_empty_config() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.upload.concurrency, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_invalid_config() {
        let toml = "this is not valid toml [[[";
        let result = Config::parse(toml);

        assert!(result.is_err());
        if let Err(VaultError::Config(msg)) = result {
            assert!(msg.contains("config parse error"));
        } else {
            panic!("Expected Config error");
        }
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = Config::load("nonexistent.toml");

        assert!(result.is_err());
        assert!(matches!(result, Err(VaultError::Io(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[upload]\nconcurrency = 2\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.upload.concurrency, 2);
    }

    #[test]
    fn test_apply_env_overrides_webhook_secret() {
        let original = std::env::var("CLOUDVAULT_WEBHOOK_SECRET").ok();

        std::env::set_var("CLOUDVAULT_WEBHOOK_SECRET", "env-secret");

        let mut config = Config::default();
        config.server.webhook_secret = "file-secret".to_string();
        config.apply_env_overrides();

        assert_eq!(config.server.webhook_secret, "env-secret");

        if let Some(val) = original {
            std::env::set_var("CLOUDVAULT_WEBHOOK_SECRET", val);
        } else {
            std::env::remove_var("CLOUDVAULT_WEBHOOK_SECRET");
        }
    }

    #[test]
    fn test_validate_zero_concurrency() {
        let mut config = Config::default();
        config.upload.concurrency = 0;

        let result = config.validate();
        assert!(matches!(result, Err(VaultError::Config(msg)) if msg.contains("concurrency")));
    }

    #[test]
    fn test_validate_invalid_base_url() {
        let mut config = Config::default();
        config.api.base_url = "not a url".to_string();

        let result = config.validate();
        assert!(matches!(result, Err(VaultError::Config(msg)) if msg.contains("base_url")));
    }

    #[test]
    fn test_validate_zero_request_timeout() {
        let mut config = Config::default();
        config.api.request_timeout_secs = 0;

        assert!(config.validate().is_ok());
        assert!(config.api.request_timeout().is_none());
    }

    #[test]
    fn test_upload_ignores_missing_webhook_secret() {
        let config = Config::parse("[server]\nport = 4000\n").unwrap();
        assert!(config.server.webhook_secret.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_server_validate_requires_secret() {
        let config = ServerConfig::default();

        let result = config.validate();
        assert!(matches!(result, Err(VaultError::Config(msg)) if msg.contains("webhook_secret")));
    }

    #[test]
    fn test_server_validate_object_base_url() {
        let config = ServerConfig {
            webhook_secret: "s".to_string(),
            object_base_url: "not a url".to_string(),
            ..Default::default()
        };

        let result = config.validate();
        assert!(matches!(result, Err(VaultError::Config(msg)) if msg.contains("object_base_url")));
    }
}
