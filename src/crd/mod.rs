//! # Custom Resource Definitions
//!
//! CRD types for the Bucket Controller.
//!
//! ## Module Structure
//!
//! - `bucket.rs` - Namespaced `Bucket` resource describing the desired S3 bucket
//! - `provider.rs` - Cluster-scoped `Provider` resource carrying cloud credentials
//! - `status.rs` - Status types for tracking reconciliation state

mod bucket;
mod provider;
mod status;

/// API group shared by every resource the controller owns
pub const API_GROUP: &str = "bucket-management.octopilot.io";

// Re-export all public types
pub use bucket::{Bucket, BucketSpec, CannedAcl};
pub use provider::{Provider, ProviderSpec, ProviderType};
pub use status::{BucketStatus, Condition};
