use crate::error::ConfigError;
use crate::readings::MonitoredUnit;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the snapshot file inside the state directory
pub const SNAPSHOT_FILE_NAME: &str = "state.json";

/// Application configuration, loaded from a TOML file
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub units: Vec<MonitoredUnit>,
}

/// Where and how readings are fetched
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Query endpoint URL
    pub url: String,
    #[serde(default = "default_aid")]
    pub aid: String,
    #[serde(default = "default_account")]
    pub account: String,
    #[serde(default = "default_area")]
    pub area: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

/// Transport security for the SMTP connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// TLS from the first byte (usually port 465)
    #[default]
    Tls,
    /// Plain connection upgraded with STARTTLS (usually port 587)
    Starttls,
    /// No encryption at all
    Plain,
}

/// Outbound mail settings
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub server: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Sender address; defaults to the username
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub security: SmtpSecurity,
    #[serde(default)]
    pub accept_invalid_certs: bool,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl SmtpConfig {
    pub fn sender(&self) -> &str {
        self.from.as_deref().unwrap_or(&self.username)
    }
}

/// Locations of persisted state and the message template
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    /// HTML template for notifications; the built-in one is used when unset
    #[serde(default)]
    pub template_path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            template_path: None,
        }
    }
}

impl StorageConfig {
    pub fn snapshot_path(&self) -> PathBuf {
        self.state_dir.join(SNAPSHOT_FILE_NAME)
    }
}

/// Check cycle timing
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// Interval between cycles after a success
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u64,
    /// Interval between retries after a failure
    #[serde(default = "default_retry_minutes")]
    pub retry_minutes: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_hours: default_interval_hours(),
            retry_minutes: default_retry_minutes(),
        }
    }
}

impl ScheduleConfig {
    pub fn normal_interval(&self) -> Duration {
        Duration::from_secs(self.interval_hours.saturating_mul(60 * 60))
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_minutes.saturating_mul(60))
    }
}

fn default_aid() -> String {
    "0030000000002501".to_string()
}

fn default_account() -> String {
    "138791".to_string()
}

fn default_area() -> String {
    "1".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_smtp_port() -> u16 {
    465
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("cache")
}

fn default_interval_hours() -> u64 {
    8
}

fn default_retry_minutes() -> u64 {
    10
}

impl Config {
    /// Load and validate configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadError` if the file cannot be read,
    /// `ConfigError::TomlError` if it is not valid TOML for this schema and
    /// `ConfigError::ValidationError` if values are inconsistent.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the daemon cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "source.url must not be empty".to_string(),
            ));
        }
        if self.units.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one [[units]] entry is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for unit in &self.units {
            if unit.id.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "unit id must not be empty".to_string(),
                ));
            }
            if !seen.insert(unit.id.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate unit id '{}'",
                    unit.id
                )));
            }
        }

        if self.schedule.interval_hours == 0 || self.schedule.retry_minutes == 0 {
            return Err(ConfigError::ValidationError(
                "schedule intervals must be greater than zero".to_string(),
            ));
        }
        if self.schedule.interval_hours.checked_mul(60 * 60).is_none()
            || self.schedule.retry_minutes.checked_mul(60).is_none()
        {
            return Err(ConfigError::ValidationError(
                "schedule intervals are too large".to_string(),
            ));
        }

        Ok(())
    }
}
