//! Infrastructure layer for ARA.
//!
//! Concrete adapters for the contracts defined in `ara-core`.
//!
//! # Module Structure
//!
//! - `paths`: Config and secret file locations (`AraPaths`)
//! - `config_storage`: `config.toml` loading with environment overrides
//! - `secret_storage`: `secret.json` loading and the file-backed credential provider
//! - `http_backend`: `reqwest` implementation of `ReportBackend`
//! - `camera`: File-replay and unavailable camera devices
//! - `media_loader`: Reading media files from disk

pub mod camera;
pub mod config_storage;
pub mod http_backend;
pub mod media_loader;
pub mod paths;
pub mod secret_storage;

pub use camera::{FileCameraDevice, UnavailableCamera};
pub use config_storage::ConfigStorage;
pub use http_backend::HttpReportBackend;
pub use media_loader::load_media;
pub use paths::AraPaths;
pub use secret_storage::{SecretConfig, SecretCredentialProvider, SecretStorage};
