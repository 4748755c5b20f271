//! # Provider
//!
//! Cluster-scoped credential holder referenced by `Bucket.spec.providerRef`.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Provider Custom Resource Definition
///
/// Credential values are base64-encoded, the same encoding a Kubernetes
/// Secret uses for `data`. Each value is either literal key material or a
/// Vault reference of the form `vault:<path>#<key>`.
///
/// # Example
///
/// ```yaml
/// apiVersion: bucket-management.octopilot.io/v1beta1
/// kind: Provider
/// metadata:
///   name: aws-main
/// spec:
///   type: aws
///   credentials:
///     AWS_ACCESS_KEY_ID: dmF1bHQ6c2VjcmV0L2F3cyNBV1NfQUNDRVNTX0tFWV9JRA==
///     AWS_SECRET_ACCESS_KEY: dmF1bHQ6c2VjcmV0L2F3cyNBV1NfU0VDUkVUX0FDQ0VTU19LRVk=
///     VAULT_K8S_AUTH_BACKEND_PATH: YXV0aC9rdWJlcm5ldGVz
///     VAULT_K8S_AUTH_BACKEND_ROLE: YnVja2V0LWNvbnRyb2xsZXI=
/// ```
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    kind = "Provider",
    group = "bucket-management.octopilot.io",
    version = "v1beta1",
    printcolumn = r#"{"name":"Type", "type":"string", "jsonPath":".spec.type"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSpec {
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    /// Credential map, values base64-encoded
    #[serde(default)]
    pub credentials: BTreeMap<String, String>,
}

/// Cloud provider behind a Provider resource
///
/// Only `aws` has a storage backend; the others are accepted by the schema
/// and rejected at client resolution time.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Aws,
    Gcp,
    Azure,
}

impl ProviderType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::Aws => "aws",
            ProviderType::Gcp => "gcp",
            ProviderType::Azure => "azure",
        }
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
