//! # Bucket Controller
//!
//! A Kubernetes controller that reconciles `Bucket` resources into S3 buckets.
//!
//! ## Overview
//!
//! 1. **Watching Buckets** - Monitors `Bucket` resources across all namespaces
//! 2. **Resolving credentials** - Reads the referenced cluster-scoped `Provider`,
//!    using literal keys, the ambient AWS credential chain, or Vault references
//! 3. **Converging** - Creates missing buckets and re-applies versioning,
//!    transfer acceleration, policy, canned ACL and tags on every pass
//! 4. **Cleaning up** - Empties and deletes the bucket before releasing the
//!    finalizer on a deleted `Bucket`
//!
//! Metrics and probes are served on `METRICS_PORT` (default 5000).

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    bucket_controller::runtime::run().await
}
