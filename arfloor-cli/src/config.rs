//! Configuration handling for the arfloor CLI

use anyhow::{Context, Result};
use arfloor_core::ArConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ar: ArConfig,

    #[serde(default)]
    pub replay: ReplayConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Content placed when the command line names none
    #[serde(default = "default_content")]
    pub content: String,

    #[serde(default)]
    pub scale: Option<f32>,

    /// Models the replay loader can instantiate
    #[serde(default = "default_models")]
    pub models: Vec<String>,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            content: default_content(),
            scale: None,
            models: default_models(),
        }
    }
}

fn default_content() -> String { "chair".to_string() }
fn default_models() -> Vec<String> { vec!["chair".to_string(), "lamp".to_string()] }

/// Default location, `~/.arfloor/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".arfloor").join("config.toml"))
}

/// Load configuration from file or use defaults
pub fn load_config(path: Option<PathBuf>) -> Result<Config> {
    if let Some(path) = path {
        read_config(&path)
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            read_config(&default_path)
        } else {
            Ok(Config::default())
        }
    } else {
        Ok(Config::default())
    }
}

fn read_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config: Config =
        toml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &Config, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}
