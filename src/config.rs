use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::window::ViewGranularity;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub default_view: Option<ViewGranularity>,
    pub document_dir: Option<PathBuf>,
    pub versification_path: Option<PathBuf>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            default_view: Some(ViewGranularity::Chapter),
            document_dir: None,
            versification_path: None,
        }
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(&config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;

        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(&config_path, config_content)?;
        Ok(())
    }

    pub fn save_default_view(view: ViewGranularity) -> Result<()> {
        let mut config = Self::load().unwrap_or_else(|_| Self::new());
        config.default_view = Some(view);
        config.save()
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("escriba").join("config.json"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
