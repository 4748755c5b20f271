//! # Reconciler
//!
//! Core reconciliation logic for `Bucket` resources.
//!
//! The reconciler:
//! - Watches `Bucket` resources across all namespaces
//! - Resolves the referenced `Provider` into a cached S3 client
//! - Creates missing buckets and re-applies every declared property
//! - Empties and deletes buckets behind a finalizer
//! - Updates resource status with reconciliation results
//!
//! ## Module Structure
//!
//! - `state`: lifecycle state derived from the record
//! - `finalizer`: finalizer add/remove
//! - `store`: Kubernetes reads and writes
//! - `status`: status and condition building
//! - `validation`: spec checks run before any S3 call
//! - `reconcile`: the pass itself

pub mod finalizer;
pub mod reconcile;
pub mod state;
pub mod status;
pub mod store;
pub mod types;
pub mod validation;

// Re-export public API
pub use reconcile::{reconcile, reconcile_bucket, ReconcileOutcome};
pub use state::{classify, BucketState};
pub use store::{BucketStore, KubeBucketStore};
pub use types::{BackoffState, Reconciler, ReconcilerError};
