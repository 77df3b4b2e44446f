//! Unified path management for ARA configuration files.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/ara/              # Config directory
//! ├── config.toml             # Application configuration
//! └── secret.json             # Backend credential
//! ```

use ara_core::error::{AraError, Result};
use std::path::{Path, PathBuf};

const APP_DIR: &str = "ara";

/// Resolves every file location from one config directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AraPaths {
    config_dir: PathBuf,
}

impl AraPaths {
    /// Uses the platform config directory (e.g., `~/.config/ara/`).
    ///
    /// # Errors
    ///
    /// Returns `AraError::Config` when the home directory cannot be determined.
    pub fn new() -> Result<Self> {
        let base = dirs::config_dir()
            .ok_or_else(|| AraError::config("Cannot find home directory"))?;
        Ok(Self::with_base(base.join(APP_DIR)))
    }

    /// Uses a custom config directory (for testing).
    pub fn with_base(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Path to `secret.json`.
    ///
    /// # Security Note
    ///
    /// The file holds a plaintext token and should be readable by the user only.
    pub fn secret_file(&self) -> PathBuf {
        self.config_dir.join("secret.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_live_in_config_dir() {
        let paths = AraPaths::with_base("/tmp/ara-test");

        assert_eq!(paths.config_file(), PathBuf::from("/tmp/ara-test/config.toml"));
        assert_eq!(paths.secret_file(), PathBuf::from("/tmp/ara-test/secret.json"));
    }
}
