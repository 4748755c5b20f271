//! # Bucket Convergence Engine
//!
//! Drives a bucket toward its declared spec through a [`StorageApi`].
//!
//! Every operation is safe to repeat. `apply_properties` re-applies the whole
//! property set on each pass and stops at the first failure without rolling
//! back earlier steps; the next reconcile pass picks up from scratch.

use super::storage::{CreateBucketRequest, StorageApi, StorageError};
use crate::constants::{DEFAULT_S3_REGION, MAX_DELETE_BATCH};
use crate::crd::BucketSpec;
use crate::observability::metrics;
use std::sync::Arc;
use tracing::{debug, info, info_span, Instrument};

#[derive(Debug, Clone)]
pub struct BucketEngine {
    storage: Arc<dyn StorageApi>,
}

impl BucketEngine {
    pub fn new(storage: Arc<dyn StorageApi>) -> Self {
        Self { storage }
    }

    /// Whether the bucket exists; a missing bucket is `Ok(false)`, not an error
    pub async fn exists(&self, bucket: &str) -> Result<bool, StorageError> {
        match self.storage.bucket_location(bucket).await {
            Ok(_) => Ok(true),
            Err(StorageError::NoSuchBucket { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Create the bucket
    ///
    /// Not re-verified afterwards; the caller applies properties next and
    /// the following pass re-checks existence.
    pub async fn create(&self, spec: &BucketSpec) -> Result<(), StorageError> {
        let request = create_request(spec);
        let span = info_span!(
            "bucket.create",
            bucket.name = request.bucket.as_str(),
            bucket.region = spec.region.as_str()
        );
        async move {
            self.storage.create_bucket(&request).await?;
            info!(
                "Created bucket {} in {} (object lock: {})",
                request.bucket, spec.region, request.object_lock
            );
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Apply every declared property in order: versioning, transfer
    /// acceleration, policy, canned ACL, tags
    pub async fn apply_properties(&self, spec: &BucketSpec) -> Result<(), StorageError> {
        let bucket = spec.bucket_name.as_str();
        let span = info_span!("bucket.apply_properties", bucket.name = bucket);

        async move {
            self.storage
                .put_versioning(bucket, spec.enable_versioning)
                .await?;
            self.storage
                .put_acceleration(bucket, spec.enable_transfer_acceleration)
                .await?;

            if let Some(policy) = spec.bucket_policy.as_deref() {
                validate_policy(bucket, policy)?;
                self.storage.put_policy(bucket, policy).await?;
            }

            self.storage.put_acl(bucket, spec.canned_bucket_acl).await?;
            self.storage.put_tagging(bucket, &spec.tags).await?;

            debug!("Applied properties to bucket {}", bucket);
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Empty and delete the bucket
    ///
    /// Returns `Ok(false)` without any deletion if the bucket does not exist.
    /// Every object version and delete marker is removed before the single
    /// `DeleteBucket` call; a purge failure aborts before it.
    pub async fn delete(&self, bucket: &str) -> Result<bool, StorageError> {
        let span = info_span!("bucket.delete", bucket.name = bucket);
        async move {
            if !self.exists(bucket).await? {
                debug!("Bucket {} already absent, nothing to delete", bucket);
                return Ok(false);
            }

            let purged = self.purge(bucket).await?;
            self.storage.delete_bucket(bucket).await?;
            info!("Deleted bucket {} ({} object versions purged)", bucket, purged);
            Ok(true)
        }
        .instrument(span)
        .await
    }

    async fn purge(&self, bucket: &str) -> Result<u64, StorageError> {
        let mut purged = 0_u64;
        let mut cursor = None;
        loop {
            let page = self
                .storage
                .list_object_versions(bucket, cursor.as_ref())
                .await?;

            for batch in page.objects.chunks(MAX_DELETE_BATCH) {
                self.storage.delete_objects(bucket, batch).await?;
                purged += batch.len() as u64;
                metrics::increment_objects_purged(batch.len() as u64);
            }

            match page.next {
                Some(next) => cursor = Some(next),
                None => return Ok(purged),
            }
        }
    }
}

/// Build the `CreateBucket` parameters for a spec
///
/// S3 rejects an explicit location constraint for its default region, so it is
/// only set for other regions.
#[must_use]
pub fn create_request(spec: &BucketSpec) -> CreateBucketRequest {
    CreateBucketRequest {
        bucket: spec.bucket_name.clone(),
        object_lock: spec.enable_object_lock,
        location_constraint: (spec.region != DEFAULT_S3_REGION).then(|| spec.region.clone()),
    }
}

/// Reject a policy that is not a JSON object before any API call is made
pub fn validate_policy(bucket: &str, policy: &str) -> Result<(), StorageError> {
    let invalid = |reason: String| StorageError::InvalidPolicy {
        bucket: bucket.to_string(),
        reason,
    };
    if policy.trim().is_empty() {
        return Err(invalid("policy document is empty".to_string()));
    }
    match serde_json::from_str::<serde_json::Value>(policy) {
        Ok(serde_json::Value::Object(_)) => Ok(()),
        Ok(_) => Err(invalid("policy document must be a JSON object".to_string())),
        Err(e) => Err(invalid(e.to_string())),
    }
}
