//! Credential handle passed explicitly into every backend call.

use std::fmt;

/// An opaque bearer credential. Its value never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
}

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Value for an `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Answers whether a valid credential is available right now.
///
/// The conversation asks before each backend call, so a credential that
/// appears or expires mid-session is picked up on the next intent.
pub trait CredentialProvider: Send + Sync {
    fn current(&self) -> Option<Credential>;
}

/// A provider holding a fixed credential (or none).
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialProvider {
    credential: Option<Credential>,
}

impl StaticCredentialProvider {
    pub fn new(credential: Option<Credential>) -> Self {
        Self { credential }
    }
}

impl CredentialProvider for StaticCredentialProvider {
    fn current(&self) -> Option<Credential> {
        self.credential.clone()
    }
}
