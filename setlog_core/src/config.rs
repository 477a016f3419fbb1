//! Configuration file support for setlog.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/setlog/config.toml`.

use crate::stats::MAX_PERIOD_DAYS;
use crate::{Error, Goal, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub user: UserConfig,

    #[serde(default)]
    pub dashboard: DashboardConfig,

    #[serde(default)]
    pub goals: Vec<Goal>,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl DataConfig {
    /// JSONL file holding completed executions
    pub fn executions_path(&self) -> PathBuf {
        self.data_dir.join("executions.jsonl")
    }

    /// In-progress session snapshot
    pub fn draft_path(&self) -> PathBuf {
        self.data_dir.join("draft.json")
    }

    /// Directory scanned for user-defined `*.toml` templates
    pub fn templates_dir(&self) -> PathBuf {
        self.data_dir.join("templates")
    }
}

/// Identity of the local user
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default = "default_user_id")]
    pub id: String,

    #[serde(default)]
    pub body_weight: Option<f64>,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            id: default_user_id(),
            body_weight: None,
        }
    }
}

/// Dashboard defaults
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_period_days")]
    pub default_period_days: i64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            default_period_days: default_period_days(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("setlog")
}

fn default_user_id() -> String {
    "local".into()
}

fn default_period_days() -> i64 {
    30
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Reject values the rest of the system cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.user.id.trim().is_empty() {
            return Err(Error::Config("user.id must not be empty".into()));
        }
        if !(1..=MAX_PERIOD_DAYS).contains(&self.dashboard.default_period_days) {
            return Err(Error::Config(format!(
                "dashboard.default_period_days must be between 1 and {}, got {}",
                MAX_PERIOD_DAYS, self.dashboard.default_period_days
            )));
        }
        if let Some(goal) = self
            .goals
            .iter()
            .find(|g| !g.target.is_finite() || g.target <= 0.0)
        {
            return Err(Error::Config(format!(
                "goal target must be positive, got {}",
                goal.target
            )));
        }
        Ok(())
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("setlog").join("config.toml")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
