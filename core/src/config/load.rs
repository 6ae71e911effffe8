use std::path::{Path, PathBuf};

use super::types::AppConfig;
use crate::error::ConfigError;

/// Get the default tubefetch data directory: ~/.tubefetch
pub fn get_data_dir() -> Result<PathBuf, ConfigError> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| ConfigError::NoHomeDir)?;
    Ok(PathBuf::from(home).join(".tubefetch"))
}

pub fn load_default() -> Result<AppConfig, ConfigError> {
    // Priority 1: ~/.tubefetch/config.toml (highest)
    let user_config = get_data_dir().ok().map(|d| d.join("config.toml"));

    // Priority 2: ./config.toml (current directory)
    let local_config = Path::new("config.toml");

    let mut cfg = match user_config.as_deref().filter(|p| p.exists()) {
        Some(path) => load_from_file(path)?,
        None if local_config.exists() => load_from_file(local_config)?,
        None => AppConfig::default(),
    };

    // Environment variable overrides (Priority 0: highest)
    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok());

    Ok(cfg)
}

pub fn load_from_file(path: &Path) -> Result<AppConfig, ConfigError> {
    let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str::<AppConfig>(&s).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// `DOWNLOAD_DIR` and `MEDIA_SUBDIR` keep the names the add-on image already exports.
pub fn apply_env_overrides<F>(cfg: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("DOWNLOAD_DIR") {
        cfg.downloads.download_dir = v;
    }
    if let Some(v) = get("MEDIA_SUBDIR") {
        cfg.downloads.media_subdir = v;
    }
    if let Some(v) = get("TUBEFETCH_YTDLP_BIN") {
        cfg.downloads.ytdlp_bin = v;
    }
    if let Some(v) = get("TUBEFETCH_MAX_CONCURRENT") {
        match v.trim().parse::<usize>() {
            Ok(n) if n > 0 => cfg.downloads.max_concurrent = n,
            _ => tracing::warn!(value = %v, "ignoring invalid TUBEFETCH_MAX_CONCURRENT"),
        }
    }
    if let Some(v) = get("TUBEFETCH_PORT") {
        match v.trim().parse::<u16>() {
            Ok(port) => cfg.http_server.port = port,
            Err(_) => tracing::warn!(value = %v, "ignoring invalid TUBEFETCH_PORT"),
        }
    }
}
