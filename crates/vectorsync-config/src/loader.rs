use std::path::{Path, PathBuf};

use tracing::info;
use vectorsync_common::{Error, Result};

use crate::model::AppConfig;

pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new() -> Result<Self> {
        let config_dir = Self::default_config_dir();
        Ok(Self { config_dir })
    }

    pub fn default_config_dir() -> PathBuf {
        let home_config = dirs::home_dir().map(|h| h.join(".vectorsync"));
        let xdg_config = dirs::config_dir().map(|c| c.join("vectorsync"));

        match (xdg_config, home_config) {
            (Some(xdg), Some(home)) => {
                if xdg.exists() {
                    xdg
                } else if home.exists() {
                    home
                } else {
                    xdg
                }
            }
            (Some(xdg), None) => xdg,
            (None, Some(home)) => home,
            (None, None) => PathBuf::from(".vectorsync"),
        }
    }

    pub fn with_dir(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Load `config.yml` or `config.toml` from the config directory.
    /// YAML wins when both exist; no file means defaults.
    pub fn load(&self) -> Result<AppConfig> {
        let yaml_path = self.config_dir.join("config.yml");
        let toml_path = self.config_dir.join("config.toml");

        if yaml_path.exists() {
            Self::load_file(&yaml_path)
        } else if toml_path.exists() {
            Self::load_file(&toml_path)
        } else {
            info!("no config file found, using defaults");
            Ok(AppConfig::default())
        }
    }

    /// Load an explicit config file, picking the format from its extension.
    pub fn load_file(path: &Path) -> Result<AppConfig> {
        info!("loading config from {}", path.display());
        let contents = std::fs::read_to_string(path)?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("failed to parse TOML config: {e}"))),
            Some("yml") | Some("yaml") => serde_yaml::from_str(&contents)
                .map_err(|e| Error::Config(format!("failed to parse YAML config: {e}"))),
            other => Err(Error::Config(format!(
                "unsupported config file extension: {}",
                other.unwrap_or("<none>")
            ))),
        }
    }
}
