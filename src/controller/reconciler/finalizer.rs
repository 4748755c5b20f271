//! # Finalizer
//!
//! The controller's finalizer is added before anything is created and only
//! removed once the bucket has been deleted. Both directions write only when
//! the list actually changes.

use super::state::has_finalizer;
use super::store::BucketStore;
use crate::constants::BUCKET_FINALIZER;
use crate::crd::Bucket;
use kube::ResourceExt;
use tracing::{debug, info};

/// Finalizer list with ours appended, `None` if already present
#[must_use]
pub fn with_finalizer(bucket: &Bucket) -> Option<Vec<String>> {
    if has_finalizer(bucket) {
        return None;
    }
    let mut finalizers = bucket.finalizers().to_vec();
    finalizers.push(BUCKET_FINALIZER.to_string());
    Some(finalizers)
}

/// Finalizer list with ours removed, `None` if it was not there
#[must_use]
pub fn without_finalizer(bucket: &Bucket) -> Option<Vec<String>> {
    if !has_finalizer(bucket) {
        return None;
    }
    Some(
        bucket
            .finalizers()
            .iter()
            .filter(|f| f.as_str() != BUCKET_FINALIZER)
            .cloned()
            .collect(),
    )
}

/// Add the finalizer if missing; returns whether a write happened
pub async fn ensure_finalizer(
    store: &dyn BucketStore,
    bucket: &Bucket,
) -> Result<bool, kube::Error> {
    let Some(finalizers) = with_finalizer(bucket) else {
        return Ok(false);
    };
    let namespace = bucket.namespace().unwrap_or_default();
    store
        .replace_finalizers(
            &namespace,
            &bucket.name_any(),
            finalizers,
            bucket.resource_version(),
        )
        .await?;
    info!("Added finalizer to Bucket {}/{}", namespace, bucket.name_any());
    Ok(true)
}

/// Remove the finalizer if present; returns whether a write happened
pub async fn release_finalizer(
    store: &dyn BucketStore,
    bucket: &Bucket,
) -> Result<bool, kube::Error> {
    let Some(finalizers) = without_finalizer(bucket) else {
        debug!("Bucket {} has no finalizer to release", bucket.name_any());
        return Ok(false);
    };
    let namespace = bucket.namespace().unwrap_or_default();
    store
        .replace_finalizers(
            &namespace,
            &bucket.name_any(),
            finalizers,
            bucket.resource_version(),
        )
        .await?;
    info!(
        "Released finalizer on Bucket {}/{}",
        namespace,
        bucket.name_any()
    );
    Ok(true)
}
