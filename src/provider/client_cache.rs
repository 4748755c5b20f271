//! # Provider Client Cache
//!
//! One ready storage client per (Provider name, region), owned by the
//! reconciler and shared by all concurrent reconciliations.
//!
//! A cached client backed by a Vault session is only handed out while that
//! session is live. Once it expires the entry is evicted and rebuilt on the
//! same call; the rebuild then hits the expired session in the
//! [`SessionManager`] and surfaces the retryable session-expired error.
//! Builds are single-flight per key, so concurrent misses share one build.

use super::{BucketEngine, BucketProvider, ProviderError, StorageConnector};
use crate::cache::{Expiring, ExpiringCache, Lookup};
use crate::credentials::vault::{SessionManager, VaultSession};
use crate::credentials::{
    classify_credentials, decode_credentials, CredentialSource, StaticCredentials,
};
use crate::crd::{Provider, ProviderType};
use crate::observability::metrics;
use chrono::{DateTime, Utc};
use kube::ResourceExt;
use std::sync::Arc;
use tracing::{debug, info, info_span, Instrument};

/// A provider client plus the Vault session its credentials came from
#[derive(Debug)]
pub struct CachedProviderClient {
    provider: BucketProvider,
    session: Option<Arc<VaultSession>>,
    credential_source: &'static str,
}

impl CachedProviderClient {
    #[must_use]
    pub fn new(
        provider: BucketProvider,
        session: Option<Arc<VaultSession>>,
        credential_source: &'static str,
    ) -> Self {
        Self {
            provider,
            session,
            credential_source,
        }
    }

    #[must_use]
    pub fn engine(&self) -> &BucketEngine {
        self.provider.engine()
    }

    #[must_use]
    pub fn session(&self) -> Option<&Arc<VaultSession>> {
        self.session.as_ref()
    }

    /// `ambient`, `static` or `vault`
    #[must_use]
    pub fn credential_source(&self) -> &'static str {
        self.credential_source
    }
}

impl Expiring for CachedProviderClient {
    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.is_expired_at(now))
    }
}

pub struct ProviderClientCache {
    clients: ExpiringCache<CachedProviderClient>,
    sessions: Arc<SessionManager>,
    connector: Arc<dyn StorageConnector>,
}

impl std::fmt::Debug for ProviderClientCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderClientCache")
            .field("clients", &self.clients)
            .field("sessions", &self.sessions)
            .finish_non_exhaustive()
    }
}

impl ProviderClientCache {
    pub fn new(sessions: Arc<SessionManager>, connector: Arc<dyn StorageConnector>) -> Self {
        Self {
            clients: ExpiringCache::new(),
            sessions,
            connector,
        }
    }

    /// Only `aws` Providers have a storage backend
    pub fn ensure_supported(provider_type: ProviderType) -> Result<(), ProviderError> {
        match provider_type {
            ProviderType::Aws => Ok(()),
            other => Err(ProviderError::Unsupported(other)),
        }
    }

    /// Cache key for a Provider and region
    #[must_use]
    pub fn cache_key(provider_name: &str, region: &str) -> String {
        format!("{provider_name}/{region}")
    }

    /// Return a live client for `provider` in `region`
    ///
    /// The hot path makes no network calls. Unsupported provider types fail
    /// before the cache is touched.
    pub async fn get_client(
        &self,
        provider: &Provider,
        region: &str,
    ) -> Result<Arc<CachedProviderClient>, ProviderError> {
        Self::ensure_supported(provider.spec.provider_type)?;

        let name = provider.name_any();
        let key = Self::cache_key(&name, region);

        match self.clients.lookup(&key) {
            Lookup::Hit(client) => return Ok(client),
            Lookup::Expired(_) => {
                debug!("Cached client {} has an expired Vault session, rebuilding", key);
            }
            Lookup::Miss => {}
        }

        self.clients
            .get_or_try_insert_with(&key, || self.build(provider, &name, region))
            .await
    }

    async fn build(
        &self,
        provider: &Provider,
        name: &str,
        region: &str,
    ) -> Result<CachedProviderClient, ProviderError> {
        let span = info_span!(
            "provider.client.build",
            provider.name = name,
            provider.region = region
        );
        async move {
            let credentials = decode_credentials(&provider.spec.credentials)?;
            let source = classify_credentials(&credentials)?;
            let kind = source.kind();

            let (resolved, session) = match source {
                CredentialSource::Ambient => (None, None),
                CredentialSource::Static(literal) => (Some(literal), None),
                CredentialSource::Vault {
                    access_key_id,
                    secret_access_key,
                } => {
                    let session = self.sessions.authenticate(&credentials).await?;
                    let key_id = session
                        .resolve_secret(&access_key_id.path, &access_key_id.key)
                        .await?;
                    let secret = session
                        .resolve_secret(&secret_access_key.path, &secret_access_key.key)
                        .await?;
                    let resolved = StaticCredentials::new(key_id.as_str(), secret.as_str());
                    (Some(resolved), Some(session))
                }
            };

            let storage = self.connector.connect(region, resolved.as_ref()).await?;
            metrics::increment_client_cache_misses(kind);
            info!(
                "Built {} client for Provider {} in {} ({} credentials)",
                ProviderType::Aws,
                name,
                region,
                kind
            );

            Ok(CachedProviderClient::new(
                BucketProvider::Aws(BucketEngine::new(storage)),
                session,
                kind,
            ))
        }
        .instrument(span)
        .await
    }

    #[must_use]
    pub fn cached_clients(&self) -> usize {
        self.clients.len()
    }
}
