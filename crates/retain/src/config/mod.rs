use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, RetainError};
use crate::storage::{RetentionConfig, TierConfig};

/// Main configuration structure for Retain
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Snapshot location and write behaviour
    #[serde(default)]
    pub storage: StorageConfig,
    /// Working / short-term capacities
    #[serde(default)]
    pub tiers: TierConfig,
    /// Consolidation and decay thresholds
    #[serde(default)]
    pub retention: RetentionConfig,
    /// Classification of incoming information
    #[serde(default)]
    pub processor: ProcessorConfig,
    /// Maintenance scheduling for the daemon
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

impl Config {
    /// Load configuration from `path`, or from the first default location
    /// that exists, falling back to built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match Self::locate(path) {
            Some(path) => {
                tracing::info!("Loading config from: {}", path.display());
                Self::from_file(&path)
            }
            None => {
                tracing::info!("No config file found, using defaults");
                Ok(Config::default())
            }
        }
    }

    /// The file `load` would read: `path` if given, else the first of
    /// `~/.retain/config.toml`, `<config dir>/retain/config.toml` and
    /// `./config.toml` that exists.
    pub fn locate(path: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = path {
            return Some(path.to_path_buf());
        }

        let default_paths = [
            dirs::home_dir().map(|h| h.join(".retain").join("config.toml")),
            dirs::config_dir().map(|c| c.join("retain").join("config.toml")),
            Some(PathBuf::from("config.toml")),
        ];

        default_paths.into_iter().flatten().find(|p| p.exists())
    }

    /// Parse and validate a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RetainError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| RetainError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would break store invariants
    pub fn validate(&self) -> Result<()> {
        self.tiers.validate()?;
        self.retention.validate()?;
        self.processor.validate()?;
        if self.maintenance.interval_secs == 0 {
            return Err(RetainError::Config(
                "maintenance.interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Snapshot storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Base directory for the snapshot file
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Snapshot file name inside `data_dir`
    #[serde(default = "default_snapshot_file")]
    pub snapshot_file: String,
    /// Quiet period before a burst of mutations is written out
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Write snapshots at all (false keeps the store purely in memory)
    #[serde(default = "default_persist")]
    pub persist: bool,
}

impl StorageConfig {
    /// Full path of the snapshot file
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(&self.snapshot_file)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            snapshot_file: default_snapshot_file(),
            debounce_ms: default_debounce_ms(),
            persist: default_persist(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".retain"))
        .unwrap_or_else(|| PathBuf::from(".retain"))
}

fn default_snapshot_file() -> String {
    "memories.json".to_string()
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_persist() -> bool {
    true
}

/// Classification thresholds used when new information arrives
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ProcessorConfig {
    /// Importance at or above which information goes straight to long-term
    #[serde(default = "default_long_term_threshold")]
    pub long_term_threshold: f32,
    /// Importance at or above which information goes to short-term
    #[serde(default = "default_short_term_threshold")]
    pub short_term_threshold: f32,
    /// Importance assigned by the built-in fixed scorer
    #[serde(default = "default_importance")]
    pub default_importance: f32,
}

impl ProcessorConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("processor.long_term_threshold", self.long_term_threshold),
            ("processor.short_term_threshold", self.short_term_threshold),
            ("processor.default_importance", self.default_importance),
        ] {
            check_unit_interval(name, value)?;
        }
        if self.short_term_threshold > self.long_term_threshold {
            return Err(RetainError::Config(
                "processor.short_term_threshold must not exceed processor.long_term_threshold"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            long_term_threshold: default_long_term_threshold(),
            short_term_threshold: default_short_term_threshold(),
            default_importance: default_importance(),
        }
    }
}

fn default_long_term_threshold() -> f32 {
    0.8
}

fn default_short_term_threshold() -> f32 {
    0.4
}

fn default_importance() -> f32 {
    0.5
}

/// Maintenance scheduling for the `retain` daemon
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct MaintenanceConfig {
    /// Seconds between consolidation + decay passes
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl MaintenanceConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_interval_secs() -> u64 {
    3600
}

pub(crate) fn check_unit_interval(name: &str, value: f32) -> Result<()> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(RetainError::Config(format!(
            "{name} must be within [0.0, 1.0], got {value}"
        )));
    }
    Ok(())
}
