use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};
use crate::models::AppConfig;

const DATA_DIR: &str = ".corsgate";
const CONFIG_FILE: &str = "config.json";
const DASHBOARD_FILE: &str = "proxy.html";

/// Env var pointing at an explicit config file
pub const CONFIG_PATH_ENV: &str = "CORSGATE_CONFIG";

/// Get data directory path, creating it if needed
pub fn get_data_dir() -> AppResult<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| AppError::Config("Failed to get user home directory".to_string()))?;
    let data_dir = home.join(DATA_DIR);

    if !data_dir.exists() {
        fs::create_dir_all(&data_dir)?;
    }

    Ok(data_dir)
}

/// Config file location: `CORSGATE_CONFIG` or `~/.corsgate/config.json`
pub fn config_path() -> AppResult<PathBuf> {
    match std::env::var_os(CONFIG_PATH_ENV) {
        Some(path) => Ok(PathBuf::from(path)),
        None => Ok(get_data_dir()?.join(CONFIG_FILE)),
    }
}

/// Default dashboard asset location
pub fn default_dashboard_file() -> AppResult<PathBuf> {
    Ok(get_data_dir()?.join(DASHBOARD_FILE))
}

/// Load application config, falling back to defaults when no file exists yet.
/// Nothing is written here so this can run before the logger is up.
pub fn load_app_config() -> AppResult<AppConfig> {
    let path = config_path()?;
    if !path.exists() {
        return Ok(AppConfig::new());
    }
    load_app_config_from(&path)
}

/// Persist `config` at the config location unless a file is already there
pub fn write_default_config_if_missing(config: &AppConfig) -> AppResult<bool> {
    write_config_if_missing(&config_path()?, config)
}

pub fn write_config_if_missing(path: &Path, config: &AppConfig) -> AppResult<bool> {
    if path.exists() {
        return Ok(false);
    }
    save_app_config_to(path, config)?;
    tracing::info!("Wrote default config to {:?}", path);
    Ok(true)
}

pub fn load_app_config_from(path: &Path) -> AppResult<AppConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("Failed to read config file {:?}: {}", path, e)))?;

    serde_json::from_str(&content)
        .map_err(|e| AppError::Config(format!("Failed to parse config file {:?}: {}", path, e)))
}

pub fn save_app_config_to(path: &Path, config: &AppConfig) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content)?;
    Ok(())
}
