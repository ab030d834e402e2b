//! Configuration file support for vaxtrack.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/vaxtrack/config.toml`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,
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

/// Catalog source; the built-in schedule is used when no file exists
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct CatalogConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Projection parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_upcoming_horizon_days")]
    pub upcoming_horizon_days: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            upcoming_horizon_days: default_upcoming_horizon_days(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("vaxtrack")
}

fn default_upcoming_horizon_days() -> u32 {
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
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("vaxtrack").join("config.toml")
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
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

    /// Catalog file: explicit path, else `<data_dir>/catalog.toml`
    pub fn catalog_path(&self) -> PathBuf {
        self.catalog
            .path
            .clone()
            .unwrap_or_else(|| self.data.data_dir.join("catalog.toml"))
    }

    pub fn children_path(&self) -> PathBuf {
        self.data.data_dir.join("children.csv")
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data.data_dir.join("ledger").join("administrations.jsonl")
    }

    /// Point every data file at `data_dir`
    pub fn with_data_dir(mut self, data_dir: PathBuf) -> Self {
        self.data.data_dir = data_dir;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.schedule.upcoming_horizon_days, 30);
        assert!(config.catalog.path.is_none());
        assert!(config.data.data_dir.ends_with("vaxtrack"));
    }

    #[test]
    fn test_config_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested/config.toml");
        let mut config = Config::default().with_data_dir(temp_dir.path().to_path_buf());
        config.schedule.upcoming_horizon_days = 45;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.schedule.upcoming_horizon_days, 45);
        assert_eq!(loaded.data.data_dir, temp_dir.path());
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[schedule]
upcoming_horizon_days = 14
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.schedule.upcoming_horizon_days, 14);
        assert!(config.catalog.path.is_none()); // default
    }

    #[test]
    fn test_data_paths() {
        let config = Config::default().with_data_dir(PathBuf::from("/srv/vax"));
        assert_eq!(config.catalog_path(), PathBuf::from("/srv/vax/catalog.toml"));
        assert_eq!(config.children_path(), PathBuf::from("/srv/vax/children.csv"));
        assert_eq!(
            config.ledger_path(),
            PathBuf::from("/srv/vax/ledger/administrations.jsonl")
        );
    }
}
