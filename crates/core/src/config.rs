//! Application configuration: built-in defaults, an optional JSON file and
//! `DHTUI__*` environment overrides, layered in that order.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    resource::{ResourceClient, ResourceLayout},
    rules::RuleSet,
    save::SaveManager,
};

const APP_DIR: &str = "dhtui";
const CONFIG_FILE: &str = "config.json";
const ENV_PREFIX: &str = "DHTUI";

/// Runtime settings of the character builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP base URL or local directory serving the card resources.
    pub resource_base: String,
    /// Directory holding `index.json` and the card images, relative to the base.
    pub cards_dir: String,
    /// Where character saves are written.
    pub save_dir: PathBuf,
    /// Where archives and print previews are written.
    pub export_dir: PathBuf,
    /// Rule variant applied to class and domain selection.
    pub rules: RuleSet,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            resource_base: "http://localhost:5173".to_string(),
            cards_dir: "cards".to_string(),
            save_dir: SaveManager::default_root(),
            export_dir: dirs::download_dir()
                .or_else(dirs::home_dir)
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR),
            rules: RuleSet::default(),
        }
    }
}

/// Location of the configuration file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join(CONFIG_FILE)
}

/// Write the defaults to [`config_path`] when no file exists yet.
pub fn ensure_default_config() -> Result<()> {
    write_default_config(&config_path())
}

fn write_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let defaults = serde_json::to_string_pretty(&AppConfig::default())
        .context("failed to serialize default config")?;
    fs::write(path, defaults).with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), "wrote default configuration");
    Ok(())
}

impl AppConfig {
    /// Load from the default file location plus the environment.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    /// Load from `path` (which may be missing) plus the environment.
    pub fn load_from(path: &Path) -> Result<Self> {
        let config = Config::builder()
            .add_source(
                Config::try_from(&AppConfig::default()).context("failed to encode defaults")?,
            )
            .add_source(File::from(path).format(FileFormat::Json).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .context("failed to build config")?
            .try_deserialize::<AppConfig>()
            .context("failed to deserialize config")?;
        info!(path = %path.display(), base = %config.resource_base, "configuration loaded");
        Ok(config)
    }

    /// Manifest and image paths under [`AppConfig::cards_dir`].
    pub fn layout(&self) -> ResourceLayout {
        ResourceLayout::new(self.cards_dir.as_str())
    }

    /// Resource source for [`AppConfig::resource_base`].
    pub fn resource_client(&self) -> Result<ResourceClient> {
        ResourceClient::from_base(&self.resource_base)
            .with_context(|| format!("invalid resource base {}", self.resource_base))
    }

    /// Save store rooted at [`AppConfig::save_dir`].
    pub fn save_manager(&self) -> SaveManager {
        SaveManager::new(self.save_dir.clone())
    }
}
