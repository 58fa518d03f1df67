//! Configuration management for watchtrail
//!
//! This module provides configuration structures and defaults for the
//! monitor, the event database, and mail delivery.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Global configuration for watchtrail
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchtrailConfig {
    /// Monitor configuration
    pub monitor: MonitorConfig,
    /// Event database configuration
    pub database: DatabaseConfig,
    /// Mail delivery configuration
    pub mail: MailConfig,
}

/// Configuration for the filesystem monitor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Default extension filter; empty means record everything
    pub extension: String,
    /// How often recorded events are flushed to the database, in milliseconds
    pub flush_interval_ms: u64,
}

/// Configuration for event persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path of the SQLite database file
    pub path: String,
}

/// Configuration for mail delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    /// App password for the sending account; prefer the
    /// WATCHTRAIL_SMTP_PASSWORD environment variable over the config file
    pub password: String,
    /// Sender address
    pub from: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            extension: String::new(),
            flush_interval_ms: 500,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "watchtrail.db".to_string(),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            username: String::new(),
            password: String::new(),
            from: String::new(),
        }
    }
}

impl MonitorConfig {
    /// Get the flush interval as a duration
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

/// Configuration loading and management
impl WatchtrailConfig {
    /// Load configuration from a TOML file if given, apply environment
    /// overrides, and fall back to defaults for anything unset.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                toml::from_str(&raw)
                    .with_context(|| format!("failed to parse config {}", path.display()))?
            }
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Override settings from environment variables if present.
    pub fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("WATCHTRAIL_DB_PATH") {
            self.database.path = val;
        }
        if let Ok(val) = std::env::var("WATCHTRAIL_EXTENSION") {
            self.monitor.extension = val;
        }
        if let Ok(val) = std::env::var("WATCHTRAIL_FLUSH_INTERVAL_MS") {
            if let Ok(ms) = val.parse::<u64>() {
                self.monitor.flush_interval_ms = ms;
            }
        }
        if let Ok(val) = std::env::var("WATCHTRAIL_SMTP_HOST") {
            self.mail.smtp_host = val;
        }
        if let Ok(val) = std::env::var("WATCHTRAIL_SMTP_PORT") {
            if let Ok(port) = val.parse::<u16>() {
                self.mail.smtp_port = port;
            }
        }
        if let Ok(val) = std::env::var("WATCHTRAIL_SMTP_USERNAME") {
            self.mail.username = val;
        }
        if let Ok(val) = std::env::var("WATCHTRAIL_SMTP_PASSWORD") {
            self.mail.password = val;
        }
        if let Ok(val) = std::env::var("WATCHTRAIL_SMTP_FROM") {
            self.mail.from = val;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.database.path.is_empty() {
            return Err("database path must not be empty".to_string());
        }

        if self.monitor.flush_interval_ms == 0 {
            return Err("flush_interval_ms must be greater than 0".to_string());
        }

        if self.mail.smtp_port == 0 {
            return Err("smtp_port must be greater than 0".to_string());
        }

        Ok(())
    }
}
