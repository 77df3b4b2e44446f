//! Configuration file storage.
//!
//! Loads `AppConfig` from `~/.config/ara/config.toml`. A missing file means
//! defaults; a malformed file is an error rather than a silent fallback.

use crate::paths::AraPaths;
use ara_core::config::AppConfig;
use ara_core::error::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding `backend.base_url`.
pub const BASE_URL_ENV: &str = "ARA_BASE_URL";

/// Storage for the application configuration file (config.toml).
pub struct ConfigStorage {
    path: PathBuf,
}

impl ConfigStorage {
    pub fn new(paths: &AraPaths) -> Self {
        Self {
            path: paths.config_file(),
        }
    }

    /// Creates a ConfigStorage with a custom path (for `--config` and tests).
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the configuration and applies environment overrides.
    ///
    /// # Errors
    ///
    /// - `AraError::Io` when the file exists but cannot be read
    /// - `AraError::Serialization` when the TOML is invalid
    pub fn load(&self) -> Result<AppConfig> {
        let mut config = self.load_file()?;
        apply_overrides(&mut config, |key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_file(&self) -> Result<AppConfig> {
        if !self.path.exists() {
            tracing::debug!(
                "[ConfigStorage] {} not found, using defaults",
                self.path.display()
            );
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.path)?;
        let config: AppConfig = toml::from_str(&content)?;
        tracing::info!("[ConfigStorage] Loaded {}", self.path.display());
        Ok(config)
    }
}

/// Applies environment overrides, reading variables through `lookup`.
pub fn apply_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(base_url) = lookup(BASE_URL_ENV).filter(|value| !value.trim().is_empty()) {
        tracing::debug!("[ConfigStorage] {} overrides backend.base_url", BASE_URL_ENV);
        config.backend.base_url = base_url.trim().to_string();
    }
}
