//! # Storage API
//!
//! The bucket-level object storage operations the convergence engine drives.
//! [`crate::provider::aws::S3Storage`] implements it against AWS S3; tests
//! substitute an in-memory double.

use crate::crd::CannedAcl;
use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("bucket '{bucket}' does not exist")]
    NoSuchBucket { bucket: String },

    #[error("invalid bucket policy for '{bucket}': {reason}")]
    InvalidPolicy { bucket: String, reason: String },

    #[error("{failed} object(s) could not be deleted from '{bucket}': {first_error}")]
    PartialDelete {
        bucket: String,
        failed: usize,
        first_error: String,
    },

    #[error("{operation} failed for bucket '{bucket}': {message}")]
    Api {
        operation: &'static str,
        bucket: String,
        message: String,
    },
}

impl StorageError {
    /// Errors that will repeat until the Bucket spec changes
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, StorageError::InvalidPolicy { .. })
    }
}

/// Parameters for `CreateBucket`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateBucketRequest {
    pub bucket: String,
    pub object_lock: bool,
    /// `None` for the implicit default region
    pub location_constraint: Option<String>,
}

/// One object version (or delete marker) to remove
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectId {
    pub key: String,
    pub version_id: Option<String>,
}

/// Where the next `ListObjectVersions` page starts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListCursor {
    pub key_marker: Option<String>,
    pub version_id_marker: Option<String>,
}

/// One page of object versions and delete markers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectPage {
    pub objects: Vec<ObjectId>,
    /// `None` on the last page
    pub next: Option<ListCursor>,
}

#[async_trait]
pub trait StorageApi: Send + Sync + std::fmt::Debug {
    /// Location of an existing bucket; [`StorageError::NoSuchBucket`] if absent
    async fn bucket_location(&self, bucket: &str) -> Result<Option<String>, StorageError>;

    async fn create_bucket(&self, request: &CreateBucketRequest) -> Result<(), StorageError>;

    async fn list_object_versions(
        &self,
        bucket: &str,
        cursor: Option<&ListCursor>,
    ) -> Result<ObjectPage, StorageError>;

    /// Delete up to 1000 objects; any per-object failure fails the whole call
    async fn delete_objects(&self, bucket: &str, objects: &[ObjectId]) -> Result<(), StorageError>;

    async fn delete_bucket(&self, bucket: &str) -> Result<(), StorageError>;

    async fn put_versioning(&self, bucket: &str, enabled: bool) -> Result<(), StorageError>;

    async fn put_acceleration(&self, bucket: &str, enabled: bool) -> Result<(), StorageError>;

    async fn put_policy(&self, bucket: &str, policy: &str) -> Result<(), StorageError>;

    async fn put_acl(&self, bucket: &str, acl: CannedAcl) -> Result<(), StorageError>;

    /// Replace the bucket's tag set; an empty map removes all tags
    async fn put_tagging(
        &self,
        bucket: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<(), StorageError>;
}
