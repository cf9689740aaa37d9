//! Configuration for download-rs

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{DownloadError, Result};

/// Main download configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DownloadConfig {
    /// Quota configuration
    #[serde(default)]
    pub quota: QuotaConfig,
    /// Download secret configuration
    #[serde(default)]
    pub secret: SecretConfig,
    /// Audit log configuration
    #[serde(default)]
    pub audit: AuditConfig,
    /// Key-value storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Quota configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuotaConfig {
    /// Maximum downloads per identity per month
    #[serde(default = "default_max_downloads")]
    pub max_downloads_per_month: u64,
}

/// Download secret configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SecretConfig {
    /// Lifetime of an issued secret in seconds
    #[serde(default = "default_secret_ttl")]
    pub ttl_seconds: u64,
}

/// Audit log configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuditConfig {
    /// Master switch; when false no records are written even when hosted
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Environment variable whose presence marks a hosted deployment
    #[serde(default = "default_deployment_env_var")]
    pub deployment_env_var: String,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Database URL (e.g., "sqlite://download.db")
    #[serde(default = "default_database_url")]
    pub database_url: String,
    /// First key segment shared by counters and secrets
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_max_downloads() -> u64 {
    100
}

fn default_secret_ttl() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

fn default_deployment_env_var() -> String {
    "DOWNLOAD_RS_DEPLOYMENT_ID".to_string()
}

fn default_database_url() -> String {
    "sqlite://download.db".to_string()
}

fn default_namespace() -> String {
    "download".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            max_downloads_per_month: default_max_downloads(),
        }
    }
}

impl Default for SecretConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_secret_ttl(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            deployment_env_var: default_deployment_env_var(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            namespace: default_namespace(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl SecretConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

impl DownloadConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DownloadError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| DownloadError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.secret.ttl_seconds == 0 {
            return Err(DownloadError::Config(
                "secret.ttl_seconds must be greater than zero".to_string(),
            ));
        }

        if self.storage.namespace.is_empty() {
            return Err(DownloadError::Config(
                "storage.namespace must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
