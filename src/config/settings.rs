//! TOML-based configuration for the planner.
//!
//! Example configuration:
//! ```toml
//! [markers]
//! strategy = "sequential"   # or "uuid"
//! prefix = "OUTER_JOIN"
//!
//! [planner]
//! cache_or_branches = true
//! validate_links = true
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PlannerSettings {
    /// Outer-join marker naming.
    pub markers: MarkerSettings,

    /// Planning behaviour.
    pub planner: PlanningSettings,
}

/// How cache-mark names are generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerStrategy {
    /// `<prefix>_1`, `<prefix>_2`, ... per planning run. Deterministic.
    #[default]
    Sequential,
    /// `<prefix>_<uuid v4>`.
    Uuid,
}

/// Marker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MarkerSettings {
    pub strategy: MarkerStrategy,

    /// Prefix of every marker name.
    pub prefix: String,
}

impl Default for MarkerSettings {
    fn default() -> Self {
        Self {
            strategy: MarkerStrategy::Sequential,
            prefix: "OUTER_JOIN".to_string(),
        }
    }
}

/// Planning behaviour switches.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PlanningSettings {
    /// Wrap every table plan in a cache node before planning the two sides of an OR.
    pub cache_or_branches: bool,

    /// Check the join-link graph (targets, symmetry, acyclicity) before planning.
    pub validate_links: bool,
}

impl Default for PlanningSettings {
    fn default() -> Self {
        Self {
            cache_or_branches: true,
            validate_links: true,
        }
    }
}

impl PlannerSettings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: PlannerSettings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `JOINPLAN_CONFIG`
    /// 2. `./joinplan.toml`
    /// 3. `~/.config/joinplan/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("JOINPLAN_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("joinplan.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("joinplan").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(PlannerSettings::default())
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.markers.prefix.trim().is_empty() {
            return Err(SettingsError::InvalidConfig(
                "markers.prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
