//! Application configuration model.
//!
//! Every field has a default, so a missing or partial `config.toml` still
//! yields a usable configuration.

use crate::upload::UploadPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_COMPOSE_DELAY_MS: u64 = 1_000;
pub const DEFAULT_SLICE_INTERVAL_MS: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub upload: UploadPolicy,
    pub timeline: TimelineConfig,
    pub capture: CaptureConfig,
}

/// Where the report backend lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    /// Only bounds connection setup; requests themselves use the transport defaults.
    pub connect_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout_secs: 10,
        }
    }
}

impl BackendConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// How long the typing indicator shows before each system message.
    pub compose_delay_ms: u64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            compose_delay_ms: DEFAULT_COMPOSE_DELAY_MS,
        }
    }
}

impl TimelineConfig {
    pub fn compose_delay(&self) -> Duration {
        Duration::from_millis(self.compose_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Time slice for recorded fragments.
    pub slice_interval_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            slice_interval_ms: DEFAULT_SLICE_INTERVAL_MS,
        }
    }
}

impl CaptureConfig {
    pub fn slice_interval(&self) -> Duration {
        Duration::from_millis(self.slice_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [backend]
            base_url = "https://reports.example.test"

            [upload]
            max_images = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.backend.base_url, "https://reports.example.test");
        assert_eq!(config.backend.connect_timeout_secs, 10);
        assert_eq!(config.upload.max_images, 8);
        assert_eq!(config.upload.min_images, 4);
        assert_eq!(config.timeline.compose_delay(), Duration::from_secs(1));
        assert_eq!(config.capture.slice_interval(), Duration::from_millis(100));
    }

    #[test]
    fn empty_document_is_default() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config, AppConfig::default());
    }
}
