//! # Vault Sessions
//!
//! Caches one authenticated session per (auth backend, role). A cached
//! session is handed out until its lease runs out; the first caller to see it
//! expired evicts it and gets [`CredentialError::SessionExpired`], leaving the
//! retry to the reconciler's requeue instead of re-authenticating inline.

use super::{VaultApi, VaultAuthConfig, VaultConnector};
use crate::cache::{Expiring, ExpiringCache, Lookup};
use crate::config::VaultSettings;
use crate::credentials::{CredentialError, CredentialMap};
use crate::observability::metrics;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, warn, Instrument};
use zeroize::Zeroizing;

/// An authenticated Vault session
///
/// Immutable once created; shared by every reconciliation using the same
/// auth backend and role.
pub struct VaultSession {
    api: Arc<dyn VaultApi>,
    token: Zeroizing<String>,
    created_at: DateTime<Utc>,
    lease_duration: Duration,
    expires_at: DateTime<Utc>,
    cache_key: String,
}

impl std::fmt::Debug for VaultSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultSession")
            .field("cache_key", &self.cache_key)
            .field("created_at", &self.created_at)
            .field("lease_duration", &self.lease_duration)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

impl Expiring for VaultSession {
    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl VaultSession {
    pub fn new(
        api: Arc<dyn VaultApi>,
        token: Zeroizing<String>,
        created_at: DateTime<Utc>,
        lease_duration: Duration,
        cache_key: impl Into<String>,
    ) -> Self {
        let lease = chrono::Duration::from_std(lease_duration).unwrap_or(chrono::Duration::MAX);
        let expires_at = created_at
            .checked_add_signed(lease)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            api,
            token,
            created_at,
            lease_duration,
            expires_at,
            cache_key: cache_key.into(),
        }
    }

    #[must_use]
    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    #[must_use]
    pub fn lease_duration(&self) -> Duration {
        self.lease_duration
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Read `key` from the KV v2 secret at `path`
    ///
    /// The payload must carry a nested `data.data` object. Non-string values
    /// are returned as their JSON text.
    pub async fn resolve_secret(
        &self,
        path: &str,
        key: &str,
    ) -> Result<Zeroizing<String>, CredentialError> {
        let span = info_span!("vault.secret.read", vault.path = path, vault.key = key);
        async move {
            let response = self
                .api
                .read(&self.token, path)
                .await?
                .ok_or_else(|| CredentialError::SecretNotFound {
                    path: path.to_string(),
                })?;

            let data = response
                .get("data")
                .and_then(|outer| outer.get("data"))
                .and_then(Value::as_object)
                .ok_or_else(|| CredentialError::MalformedResponse {
                    operation: format!("read {path}"),
                    message: "payload has no nested data object".to_string(),
                })?;

            let value = data.get(key).ok_or_else(|| CredentialError::KeyNotFound {
                path: path.to_string(),
                key: key.to_string(),
            })?;

            let resolved = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            debug!("Resolved Vault secret {}#{}", path, key);
            Ok(Zeroizing::new(resolved))
        }
        .instrument(span)
        .await
    }
}

/// Owner of the Vault session cache
pub struct SessionManager {
    connector: Arc<dyn VaultConnector>,
    settings: VaultSettings,
    sessions: ExpiringCache<VaultSession>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("settings", &self.settings)
            .field("sessions", &self.sessions)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    pub fn new(connector: Arc<dyn VaultConnector>, settings: VaultSettings) -> Self {
        Self {
            connector,
            settings,
            sessions: ExpiringCache::new(),
        }
    }

    /// Return a live session for the Provider's Vault auth settings
    ///
    /// - cached and live: returned without any network call
    /// - cached but expired: evicted, fails with [`CredentialError::SessionExpired`]
    /// - not cached: logs in and publishes the new session
    pub async fn authenticate(
        &self,
        credentials: &CredentialMap,
    ) -> Result<Arc<VaultSession>, CredentialError> {
        let auth = VaultAuthConfig::from_credentials(credentials, &self.settings)?;
        let cache_key = auth.cache_key();

        match self.sessions.lookup(&cache_key) {
            Lookup::Hit(session) => {
                debug!("Using cached Vault session {}", cache_key);
                return Ok(session);
            }
            Lookup::Expired(session) => {
                warn!(
                    "Vault session {} expired at {}, evicted; re-authentication deferred to requeue",
                    cache_key,
                    session.expires_at().to_rfc3339()
                );
                metrics::increment_vault_session_expirations();
                return Err(CredentialError::SessionExpired { cache_key });
            }
            Lookup::Miss => {}
        }

        self.sessions
            .get_or_try_insert_with(&cache_key, || self.login(&auth, &cache_key))
            .await
    }

    async fn login(
        &self,
        auth: &VaultAuthConfig,
        cache_key: &str,
    ) -> Result<VaultSession, CredentialError> {
        let span = info_span!(
            "vault.login",
            vault.auth_path = auth.auth_path.as_str(),
            vault.role = auth.role.as_str()
        );
        let start = Instant::now();

        async move {
            let jwt = read_identity_token(&self.settings.identity_token_path).await?;
            let api = self.connector.connect(&auth.endpoint)?;

            let login = match api.login(&auth.auth_path, &auth.role, &jwt).await {
                Ok(login) => login,
                Err(e) => {
                    metrics::increment_vault_login_errors();
                    return Err(e);
                }
            };
            metrics::observe_vault_login_duration(start.elapsed().as_secs_f64());

            let session = VaultSession::new(
                api,
                login.client_token,
                Utc::now(),
                login.lease_duration,
                cache_key,
            );
            info!(
                "Authenticated to Vault at {} as role {} (lease {}s, expires {})",
                auth.endpoint.addr,
                auth.role,
                session.lease_duration().as_secs(),
                session.expires_at().to_rfc3339()
            );
            Ok(session)
        }
        .instrument(span)
        .await
    }

    #[must_use]
    pub fn cached_sessions(&self) -> usize {
        self.sessions.len()
    }
}

async fn read_identity_token(path: &Path) -> Result<Zeroizing<String>, CredentialError> {
    tokio::fs::read_to_string(path)
        .await
        .map(|token| Zeroizing::new(token.trim().to_string()))
        .map_err(|source| CredentialError::IdentityToken {
            path: path.to_path_buf(),
            source,
        })
}
