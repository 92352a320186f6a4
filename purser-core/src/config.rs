//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/purser/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/purser/` (~/.config/purser/)
//! - Data: `$XDG_DATA_HOME/purser/` (~/.local/share/purser/)
//! - State/Logs: `$XDG_STATE_HOME/purser/` (~/.local/state/purser/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Scheduling and prediction settings
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// Collection size limits
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Storage overrides
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Periods of the background analysis tasks.
#[derive(Debug, Deserialize, Clone)]
pub struct AnalyticsConfig {
    /// Seconds between system health snapshots
    #[serde(default = "default_health_interval")]
    pub health_interval_secs: u64,

    /// Seconds between anomaly detection passes
    #[serde(default = "default_anomaly_interval")]
    pub anomaly_interval_secs: u64,

    /// Seconds between insight generation passes
    #[serde(default = "default_insight_interval")]
    pub insight_interval_secs: u64,

    /// Seconds between recommendation passes
    #[serde(default = "default_recommendation_interval")]
    pub recommendation_interval_secs: u64,

    /// Delay before the one-shot full analysis after startup
    #[serde(default = "default_initial_delay")]
    pub initial_delay_secs: u64,

    /// Memory budget in MB used for capacity utilization predictions
    #[serde(default = "default_memory_budget")]
    pub memory_budget_mb: f64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            health_interval_secs: default_health_interval(),
            anomaly_interval_secs: default_anomaly_interval(),
            insight_interval_secs: default_insight_interval(),
            recommendation_interval_secs: default_recommendation_interval(),
            initial_delay_secs: default_initial_delay(),
            memory_budget_mb: default_memory_budget(),
        }
    }
}

impl AnalyticsConfig {
    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs)
    }

    pub fn anomaly_interval(&self) -> Duration {
        Duration::from_secs(self.anomaly_interval_secs)
    }

    pub fn insight_interval(&self) -> Duration {
        Duration::from_secs(self.insight_interval_secs)
    }

    pub fn recommendation_interval(&self) -> Duration {
        Duration::from_secs(self.recommendation_interval_secs)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        let periods = [
            ("analytics.health_interval_secs", self.health_interval_secs),
            ("analytics.anomaly_interval_secs", self.anomaly_interval_secs),
            ("analytics.insight_interval_secs", self.insight_interval_secs),
            (
                "analytics.recommendation_interval_secs",
                self.recommendation_interval_secs,
            ),
        ];
        for (name, value) in periods {
            if value == 0 {
                return Err(Error::Config(format!("{} must be greater than 0", name)));
            }
        }
        if self.memory_budget_mb <= 0.0 {
            return Err(Error::Config(
                "analytics.memory_budget_mb must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_health_interval() -> u64 {
    30
}

fn default_anomaly_interval() -> u64 {
    60
}

fn default_insight_interval() -> u64 {
    300
}

fn default_recommendation_interval() -> u64 {
    600
}

fn default_initial_delay() -> u64 {
    5
}

fn default_memory_budget() -> f64 {
    200.0
}

/// Maximum sizes of the bounded collections.
#[derive(Debug, Deserialize, Clone)]
pub struct RetentionConfig {
    #[serde(default = "default_change_log_limit")]
    pub change_log: usize,

    /// Applies to each of the three metric series
    #[serde(default = "default_metric_series_limit")]
    pub metric_series: usize,

    #[serde(default = "default_insight_limit")]
    pub insights: usize,

    #[serde(default = "default_anomaly_limit")]
    pub anomalies: usize,

    #[serde(default = "default_recommendation_limit")]
    pub recommendations: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            change_log: default_change_log_limit(),
            metric_series: default_metric_series_limit(),
            insights: default_insight_limit(),
            anomalies: default_anomaly_limit(),
            recommendations: default_recommendation_limit(),
        }
    }
}

impl RetentionConfig {
    pub fn validate(&self) -> Result<()> {
        let limits = [
            ("retention.change_log", self.change_log),
            ("retention.metric_series", self.metric_series),
            ("retention.insights", self.insights),
            ("retention.anomalies", self.anomalies),
            ("retention.recommendations", self.recommendations),
        ];
        for (name, value) in limits {
            if value == 0 {
                return Err(Error::Config(format!("{} must be greater than 0", name)));
            }
        }
        Ok(())
    }
}

fn default_change_log_limit() -> usize {
    1000
}

fn default_metric_series_limit() -> usize {
    1000
}

fn default_insight_limit() -> usize {
    50
}

fn default_anomaly_limit() -> usize {
    100
}

fn default_recommendation_limit() -> usize {
    30
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

/// Storage overrides
#[derive(Debug, Deserialize, Default)]
pub struct StorageConfig {
    /// Use this database file instead of the XDG data path
    pub database_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.analytics.validate()?;
        self.retention.validate()
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/purser/config.toml` (~/.config/purser/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("purser").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("purser")
    }

    /// Returns the state directory path (for logs)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("purser")
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/purser/data.db` (~/.local/share/purser/data.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("data.db")
    }

    /// Database path honoring the `[storage]` override.
    pub fn resolved_database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(Self::database_path)
    }

    /// Returns the log file path
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("purser.log")
    }
}
