//! # Types
//!
//! Core types for the reconciler.

use super::store::{BucketStore, KubeBucketStore};
use crate::config::ControllerConfig;
use crate::controller::backoff::FibonacciBackoff;
use crate::credentials::vault::{HttpVaultConnector, SessionManager};
use crate::provider::aws::S3Connector;
use crate::provider::{ProviderClientCache, ProviderError};
use kube::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("invalid Bucket spec: {0}")]
    InvalidSpec(String),

    #[error("Provider '{0}' not found")]
    ProviderNotFound(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),
}

impl ReconcilerError {
    /// Errors that retrying cannot fix; the Bucket waits for its next change
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        match self {
            ReconcilerError::InvalidSpec(_) => true,
            ReconcilerError::Provider(e) => e.is_configuration(),
            ReconcilerError::ProviderNotFound(_) | ReconcilerError::Kube(_) => false,
        }
    }

    #[must_use]
    pub fn is_session_expired(&self) -> bool {
        matches!(self, ReconcilerError::Provider(e) if e.is_session_expired())
    }

    /// Short label for metrics and status reasons
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcilerError::InvalidSpec(_) => "invalid-spec",
            ReconcilerError::ProviderNotFound(_) => "provider-not-found",
            ReconcilerError::Provider(ProviderError::Unsupported(_)) => "unsupported-provider",
            ReconcilerError::Provider(ProviderError::Credentials(_)) => "credentials",
            ReconcilerError::Provider(ProviderError::Storage(_)) => "storage",
            ReconcilerError::Kube(_) => "kubernetes",
        }
    }
}

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_secs, max_secs),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count = self.error_count.saturating_add(1);
    }
}

/// Shared reconciliation context
#[derive(Clone)]
pub struct Reconciler {
    pub store: Arc<dyn BucketStore>,
    pub clients: Arc<ProviderClientCache>,
    pub config: ControllerConfig,
    // Backoff state per resource (identified by namespace/name)
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("clients", &self.clients)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Wire the production store, Vault and S3 connectors
    #[must_use]
    pub fn new(client: Client, config: ControllerConfig) -> Self {
        let sessions = Arc::new(SessionManager::new(
            Arc::new(HttpVaultConnector::new(config.vault.request_timeout())),
            config.vault.clone(),
        ));
        let clients = Arc::new(ProviderClientCache::new(
            sessions,
            Arc::new(S3Connector::new(config.s3.clone())),
        ));
        Self::with_parts(Arc::new(KubeBucketStore::new(client)), clients, config)
    }

    #[must_use]
    pub fn with_parts(
        store: Arc<dyn BucketStore>,
        clients: Arc<ProviderClientCache>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            store,
            clients,
            config,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record a failure for `key` and return the next backoff with the error count
    pub fn next_error_backoff(&self, key: &str) -> (u64, u32) {
        let mut states = self
            .backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let state = states.entry(key.to_string()).or_insert_with(|| {
            BackoffState::new(
                self.config.error_backoff_start_secs,
                self.config.error_backoff_max_secs,
            )
        });
        state.increment_error();
        (state.backoff.next_backoff_seconds(), state.error_count)
    }

    /// Forget the failure history for `key` after a successful pass
    pub fn reset_backoff(&self, key: &str) {
        self.backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    #[must_use]
    pub fn tracked_backoffs(&self) -> usize {
        self.backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
