//! # Bucket State
//!
//! The lifecycle state of a Bucket, derived from the record alone on every
//! pass. Nothing here is stored.

use crate::constants::BUCKET_FINALIZER;
use crate::crd::Bucket;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketState {
    /// The record no longer exists
    Absent,
    /// Deletion was requested; the bucket must be torn down before the
    /// finalizer is released
    PendingDelete,
    /// Not yet ready, or the spec changed since the last successful pass
    Converging,
    /// Ready for the current generation
    Ready,
}

impl BucketState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            BucketState::Absent => "absent",
            BucketState::PendingDelete => "pending-delete",
            BucketState::Converging => "converging",
            BucketState::Ready => "ready",
        }
    }
}

impl std::fmt::Display for BucketState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive the lifecycle state of a Bucket record
#[must_use]
pub fn classify(bucket: Option<&Bucket>) -> BucketState {
    let Some(bucket) = bucket else {
        return BucketState::Absent;
    };

    if bucket.metadata.deletion_timestamp.is_some() {
        return BucketState::PendingDelete;
    }

    let ready = bucket.status.as_ref().is_some_and(|status| {
        status.ready && status.observed_generation == bucket.metadata.generation
    });
    if ready {
        BucketState::Ready
    } else {
        BucketState::Converging
    }
}

/// Whether the record carries this controller's finalizer
#[must_use]
pub fn has_finalizer(bucket: &Bucket) -> bool {
    bucket
        .metadata
        .finalizers
        .as_ref()
        .is_some_and(|finalizers| finalizers.iter().any(|f| f == BUCKET_FINALIZER))
}
