//! Secret configuration file storage.
//!
//! Provides loading of the backend credential from ~/.config/ara/secret.json,
//! with the `ARA_TOKEN` environment variable as a fallback.

use crate::paths::AraPaths;
use ara_core::credential::{Credential, CredentialProvider};
use ara_core::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

/// Environment variable consulted when secret.json holds no token.
pub const TOKEN_ENV: &str = "ARA_TOKEN";

/// Contents of secret.json.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretConfig {
    #[serde(default)]
    pub token: Option<String>,
}

impl SecretConfig {
    /// The stored token as a credential, ignoring blank values.
    pub fn credential(&self) -> Option<Credential> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(Credential::new)
    }
}

/// Storage for the secret configuration file (secret.json).
///
/// Read-only: the file is written by whatever signs the user in.
///
/// # Security Note
///
/// secret.json is plaintext and should have permissions 600.
pub struct SecretStorage {
    path: PathBuf,
}

impl SecretStorage {
    pub fn new(paths: &AraPaths) -> Self {
        Self {
            path: paths.secret_file(),
        }
    }

    /// Creates a SecretStorage with a custom path (for testing).
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads secret.json. A missing file is an empty configuration.
    ///
    /// # Errors
    ///
    /// - `AraError::Io` when the file exists but cannot be read
    /// - `AraError::Serialization` when the JSON is invalid
    pub fn load(&self) -> Result<SecretConfig> {
        if !self.path.exists() {
            return Ok(SecretConfig::default());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Modification stamp of secret.json as last parsed.
type FileStamp = (Option<SystemTime>, u64);

struct CachedSecret {
    stamp: FileStamp,
    credential: Option<Credential>,
}

/// Credential provider backed by secret.json and `ARA_TOKEN`.
///
/// Every request stats the file and re-parses it only when its modification
/// time or size changed, so a token written after startup is picked up on
/// the next intent while an unchanged file costs one `stat`.
pub struct SecretCredentialProvider {
    storage: SecretStorage,
    env_token: Option<String>,
    cache: Mutex<Option<CachedSecret>>,
}

impl SecretCredentialProvider {
    /// Captures `ARA_TOKEN` once at construction.
    pub fn new(storage: SecretStorage) -> Self {
        Self::with_env_token(storage, std::env::var(TOKEN_ENV).ok())
    }

    pub fn with_env_token(storage: SecretStorage, env_token: Option<String>) -> Self {
        Self {
            storage,
            env_token,
            cache: Mutex::new(None),
        }
    }

    fn stored(&self) -> Option<Credential> {
        let path = self.storage.path();
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);

        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(err) => {
                if err.kind() != ErrorKind::NotFound {
                    tracing::warn!(
                        "[SecretCredentialProvider] Cannot stat {}: {}",
                        path.display(),
                        err
                    );
                }
                *cache = None;
                return None;
            }
        };
        let stamp = (metadata.modified().ok(), metadata.len());
        if let Some(cached) = cache.as_ref().filter(|cached| cached.stamp == stamp) {
            return cached.credential.clone();
        }

        let credential = match self.storage.load() {
            Ok(config) => config.credential(),
            Err(err) => {
                tracing::warn!(
                    "[SecretCredentialProvider] Ignoring unreadable {}: {}",
                    path.display(),
                    err
                );
                None
            }
        };
        tracing::debug!("[SecretCredentialProvider] Reloaded {}", path.display());
        *cache = Some(CachedSecret {
            stamp,
            credential: credential.clone(),
        });
        credential
    }
}

impl CredentialProvider for SecretCredentialProvider {
    fn current(&self) -> Option<Credential> {
        self.stored().or_else(|| {
            SecretConfig {
                token: self.env_token.clone(),
            }
            .credential()
        })
    }
}
