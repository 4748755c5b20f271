//! # Provider Modules
//!
//! Object storage providers that Buckets are converged against.
//!
//! - `storage`: the [`StorageApi`] seam and its domain types
//! - `engine`: provider-agnostic bucket convergence over a [`StorageApi`]
//! - `aws`: S3 implementation
//! - `client_cache`: per-Provider client cache with credential resolution
//!
//! Only AWS is implemented; `gcp` and `azure` Providers fail with
//! [`ProviderError::Unsupported`].

use crate::credentials::error::CredentialError;
use crate::credentials::StaticCredentials;
use crate::crd::ProviderType;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

pub mod aws;
pub mod client_cache;
pub mod engine;
pub mod storage;

pub use client_cache::{CachedProviderClient, ProviderClientCache};
pub use engine::BucketEngine;
pub use storage::{StorageApi, StorageError};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider type '{0}' is not supported")]
    Unsupported(ProviderType),

    #[error(transparent)]
    Credentials(#[from] CredentialError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ProviderError {
    #[must_use]
    pub fn is_session_expired(&self) -> bool {
        matches!(self, ProviderError::Credentials(e) if e.is_retryable())
    }

    /// Errors that will repeat until a Bucket or Provider is edited
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        match self {
            ProviderError::Unsupported(_) => true,
            ProviderError::Credentials(e) => e.is_configuration(),
            ProviderError::Storage(e) => e.is_configuration(),
        }
    }
}

/// A ready-to-use client for one Provider and region
#[derive(Debug, Clone)]
pub enum BucketProvider {
    Aws(BucketEngine),
}

impl BucketProvider {
    #[must_use]
    pub fn engine(&self) -> &BucketEngine {
        match self {
            BucketProvider::Aws(engine) => engine,
        }
    }

    #[must_use]
    pub fn provider_type(&self) -> ProviderType {
        match self {
            BucketProvider::Aws(_) => ProviderType::Aws,
        }
    }
}

/// Builds storage clients for a region
///
/// `None` credentials means the ambient credential chain.
#[async_trait]
pub trait StorageConnector: Send + Sync {
    async fn connect(
        &self,
        region: &str,
        credentials: Option<&StaticCredentials>,
    ) -> Result<Arc<dyn StorageApi>, ProviderError>;
}
