//! Credential lifecycle: persisted token slot, reuse, refresh, re-acquisition.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use stocksheet_common::{Error, Result};

/// Leeway before the nominal expiry at which a token is already treated as
/// expired, so a request started now does not outlive it.
const EXPIRY_LEEWAY_MINUTES: i64 = 5;

/// An OAuth2 credential with expiration tracking and its granted scope set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    /// Access token for API requests.
    pub access_token: String,
    /// Refresh token for obtaining new access tokens, when granted.
    pub refresh_token: Option<String>,
    /// When the access token expires.
    pub expires_at: DateTime<Utc>,
    /// Scopes this credential was granted for.
    pub scopes: Vec<String>,
}

impl Credential {
    /// Check if the access token is expired or about to expire.
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now() + Duration::minutes(EXPIRY_LEEWAY_MINUTES)
    }

    /// A credential is valid while its access token has not expired.
    pub fn is_valid(&self) -> bool {
        !self.is_expired()
    }

    /// Check whether the granted scope set covers every requested scope.
    pub fn covers(&self, scopes: &[String]) -> bool {
        scopes
            .iter()
            .all(|requested| self.scopes.iter().any(|granted| granted == requested))
    }

    /// The bearer token to put on API requests.
    pub fn bearer(&self) -> &str {
        &self.access_token
    }
}

/// The single local storage slot a credential is persisted to.
///
/// One slot per working directory; the location is configurable and defaults
/// to [`CredentialStore::DEFAULT_SLOT`].
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Default slot file, relative to the working directory.
    pub const DEFAULT_SLOT: &'static str = "token.json";

    /// Create a store backed by the given slot path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a store backed by the default slot.
    pub fn with_default_slot() -> Self {
        Self::new(Self::DEFAULT_SLOT)
    }

    /// Slot path this store reads and writes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted credential, if any.
    ///
    /// A missing slot file is empty state, not an error.
    pub fn load(&self) -> Result<Option<Credential>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let credential = serde_json::from_str(&raw).map_err(|e| {
            Error::Serialization(format!(
                "Malformed credential slot {}: {}",
                self.path.display(),
                e
            ))
        })?;

        Ok(Some(credential))
    }

    /// Persist a credential, overwriting any prior slot contents.
    pub fn save(&self, credential: &Credential) -> Result<()> {
        let raw = serde_json::to_string_pretty(credential)
            .map_err(|e| Error::Serialization(format!("Failed to encode credential: {}", e)))?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}

/// The identity provider seam: interactive authorization and token refresh.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Run the interactive consent flow and return a fresh credential
    /// granted for `scopes`.
    async fn authorize(&self, scopes: &[String]) -> Result<Credential>;

    /// Exchange the credential's refresh token for a renewed access token.
    async fn refresh(&self, credential: &Credential) -> Result<Credential>;
}

/// Decides whether a cached credential is reused, refreshed, or re-acquired.
pub struct CredentialCache<P: IdentityProvider> {
    store: CredentialStore,
    provider: P,
}

impl<P: IdentityProvider> CredentialCache<P> {
    /// Create a cache over a storage slot and an identity provider.
    pub fn new(store: CredentialStore, provider: P) -> Self {
        Self { store, provider }
    }

    /// Obtain a credential valid for the requested scopes.
    ///
    /// Reads the slot once. A cached credential is reused as-is only when it
    /// is still valid and its granted scopes cover the requested ones.
    /// Otherwise an expired credential with a refresh token is refreshed,
    /// falling back to the interactive flow if the exchange is rejected, and
    /// anything else triggers the interactive flow directly. The result is
    /// persisted before it is returned; a pure reuse writes nothing.
    ///
    /// # Errors
    /// - Interactive authorization failed (consent denied, timeout)
    /// - Slot I/O or serialization failure
    pub async fn obtain(&self, scopes: &[String]) -> Result<Credential> {
        let cached = self.store.load()?;

        if let Some(credential) = &cached {
            if credential.is_valid() && credential.covers(scopes) {
                tracing::debug!(
                    "Reusing cached credential from {}",
                    self.store.path().display()
                );
                return Ok(credential.clone());
            }
            if credential.is_valid() {
                tracing::info!("Cached credential does not cover the requested scopes");
            }
        }

        let credential = match &cached {
            Some(credential)
                if credential.is_expired()
                    && credential.refresh_token.is_some()
                    && credential.covers(scopes) =>
            {
                match self.provider.refresh(credential).await {
                    Ok(refreshed) => refreshed,
                    Err(e) => {
                        tracing::warn!(
                            "Token refresh failed ({}), falling back to interactive authorization",
                            e
                        );
                        self.provider.authorize(scopes).await?
                    }
                }
            }
            _ => self.provider.authorize(scopes).await?,
        };

        self.store.save(&credential)?;
        Ok(credential)
    }
}
