//! Persisted client settings (`~/.tubefetch/client.toml`).
//!
//! Mirrors the browser popup, which remembers the API URL between runs.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tubefetch_core::api::MediaFormat;

use crate::error::CliError;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5000";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSettings {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frontend_url: Option<String>,
    #[serde(default)]
    pub format: MediaFormat,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            frontend_url: None,
            format: MediaFormat::default(),
        }
    }
}

impl ClientSettings {
    pub fn default_path() -> Result<PathBuf, CliError> {
        let home = dirs::home_dir()
            .ok_or_else(|| CliError::Config("cannot find home directory".to_string()))?;
        Ok(home.join(".tubefetch").join("client.toml"))
    }

    /// `--client-config` wins; the home directory is only consulted without it.
    pub fn resolve_path(explicit: Option<&str>) -> Result<PathBuf, CliError> {
        match explicit.map(str::trim).filter(|p| !p.is_empty()) {
            Some(p) => Ok(PathBuf::from(p)),
            None => Self::default_path(),
        }
    }

    /// Missing file means defaults; a corrupt file is reported.
    pub fn load_from(path: &Path) -> Result<Self, CliError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw)
            .map_err(|e| CliError::Config(format!("invalid {}: {e}", path.display())))
    }

    pub fn save_to(&self, path: &Path) -> Result<(), CliError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let raw = toml::to_string_pretty(self)
            .map_err(|e| CliError::Config(format!("cannot encode settings: {e}")))?;
        std::fs::write(path, raw)?;
        tracing::debug!(path = %path.display(), "client settings saved");
        Ok(())
    }

    /// Trailing slashes are dropped so endpoint paths can be appended.
    pub fn set_api_url(&mut self, url: &str) -> Result<(), CliError> {
        let trimmed = url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(CliError::Config("API URL cannot be empty".to_string()));
        }
        self.api_url = trimmed.to_string();
        Ok(())
    }

    /// Blank clears the saved frontend URL.
    pub fn set_frontend_url(&mut self, url: &str) {
        let trimmed = url.trim().trim_end_matches('/');
        self.frontend_url = (!trimmed.is_empty()).then(|| trimmed.to_string());
    }
}
