//! Subcommand implementations.

pub mod chat;
pub mod check_media;

use anyhow::Result;
use ara_core::config::AppConfig;
use ara_infrastructure::{AraPaths, ConfigStorage};
use std::path::PathBuf;

/// Loads `path`, or the default config file when none is given.
pub(crate) fn load_config(path: Option<PathBuf>, paths: &AraPaths) -> Result<AppConfig> {
    let storage = match path {
        Some(path) => ConfigStorage::with_path(path),
        None => ConfigStorage::new(paths),
    };
    Ok(storage.load()?)
}
