//! # Bucket
//!
//! Desired state of a single S3 bucket.

use super::status::BucketStatus;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bucket Custom Resource Definition
///
/// The controller never writes to `spec`; it only owns finalizers and `status`.
///
/// # Example
///
/// ```yaml
/// apiVersion: bucket-management.octopilot.io/v1beta1
/// kind: Bucket
/// metadata:
///   name: assets
///   namespace: default
/// spec:
///   region: us-west-2
///   bucketName: octopilot-assets
///   enableVersioning: true
///   tags:
///     env: prod
///   providerRef: aws-main
/// ```
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    kind = "Bucket",
    group = "bucket-management.octopilot.io",
    version = "v1beta1",
    namespaced,
    status = "BucketStatus",
    shortname = "bkt",
    printcolumn = r#"{"name":"Bucket", "type":"string", "jsonPath":".spec.bucketName"}"#,
    printcolumn = r#"{"name":"Region", "type":"string", "jsonPath":".spec.region"}"#,
    printcolumn = r#"{"name":"Ready", "type":"boolean", "jsonPath":".status.ready"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct BucketSpec {
    /// AWS region the bucket lives in (e.g., "us-east-1", "eu-west-1")
    #[schemars(length(min = 1))]
    pub region: String,
    /// Globally unique S3 bucket name
    #[schemars(length(min = 1, max = 63))]
    pub bucket_name: String,
    #[serde(default)]
    pub enable_versioning: bool,
    /// Only honoured at creation time; S3 cannot enable object lock on an existing bucket
    #[serde(default)]
    pub enable_object_lock: bool,
    #[serde(default)]
    pub enable_transfer_acceleration: bool,
    /// Bucket policy as a JSON document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_policy: Option<String>,
    #[serde(default)]
    pub canned_bucket_acl: CannedAcl,
    /// Complete tag set; tags not listed here are removed from the bucket
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Name of the cluster-scoped Provider holding the credentials
    pub provider_ref: String,
}

/// Canned ACL applied to the bucket
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum CannedAcl {
    #[default]
    #[serde(rename = "private")]
    Private,
    #[serde(rename = "public-read")]
    PublicRead,
    #[serde(rename = "public-read-write")]
    PublicReadWrite,
    #[serde(rename = "authenticated-read")]
    AuthenticatedRead,
}

impl CannedAcl {
    /// Wire value expected by `PutBucketAcl`
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CannedAcl::Private => "private",
            CannedAcl::PublicRead => "public-read",
            CannedAcl::PublicReadWrite => "public-read-write",
            CannedAcl::AuthenticatedRead => "authenticated-read",
        }
    }
}

impl std::fmt::Display for CannedAcl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
