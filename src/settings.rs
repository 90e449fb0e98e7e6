use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::categories::{CategoryDef, Taxonomy};
use crate::db::DB_FILE;
use crate::error::{Result, ShaftError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_savings_target")]
    pub savings_target: f64,
    #[serde(default = "default_initial_net_worth")]
    pub initial_net_worth: f64,
    /// Overrides the built-in category list when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<CategoryDef>>,
}

fn default_currency() -> String {
    "IDR".to_string()
}

fn default_savings_target() -> f64 {
    3_000_000_000.0
}

fn default_initial_net_worth() -> f64 {
    1_000_000_000.0
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            currency: default_currency(),
            savings_target: default_savings_target(),
            initial_net_worth: default_initial_net_worth(),
            categories: None,
        }
    }
}

impl Settings {
    pub fn taxonomy(&self) -> Taxonomy {
        match &self.categories {
            Some(list) if !list.is_empty() => Taxonomy::new(list.clone()),
            _ => Taxonomy::default(),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(DB_FILE)
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("shaft")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("shaft")
}

fn read_settings(path: &Path) -> Settings {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Settings::default();
    };
    match serde_json::from_str(&content) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable settings");
            Settings::default()
        }
    }
}

pub fn load_settings() -> Settings {
    read_settings(&settings_path())
}

fn write_settings(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| ShaftError::Settings(e.to_string()))?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    write_settings(&settings_path(), settings)
}

pub fn settings_file_exists() -> bool {
    settings_path().exists()
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}
