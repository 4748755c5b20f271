//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ```rust
//! use bucket_controller::prelude::*;
//! ```
//!
//! This brings into scope:
//! - All CRD types (Bucket, Provider, etc.)
//! - The storage seam and provider client cache
//! - Reconciler types (Reconciler, ReconcilerError, etc.)
//! - Config types

// CRD types - most commonly used
pub use crate::crd::*;

// Provider types - needed for implementing storage backends
pub use crate::provider::{
    BucketEngine, BucketProvider, ProviderClientCache, ProviderError, StorageApi,
    StorageConnector, StorageError,
};

// Credential resolution
pub use crate::credentials::{CredentialError, CredentialSource, StaticCredentials};

// Reconciler types - core controller functionality
pub use crate::controller::reconciler::{
    reconcile, reconcile_bucket, BackoffState, BucketState, BucketStore, ReconcileOutcome,
    Reconciler, ReconcilerError,
};

// Config types - for configuration management
pub use crate::config::{ControllerConfig, S3Settings, VaultSettings};
