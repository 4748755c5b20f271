//! # Record Store
//!
//! The reconciler's view of the Kubernetes API: load Bucket and Provider
//! records, write finalizers, write status. [`KubeBucketStore`] is the real
//! implementation; tests swap in an in-memory one.

use crate::constants::FIELD_MANAGER;
use crate::crd::{Bucket, BucketStatus, Provider};
use async_trait::async_trait;
use kube::api::{Api, Patch, PatchParams};
use kube::Client;
use serde_json::json;

#[async_trait]
pub trait BucketStore: Send + Sync {
    /// Current Bucket record, `None` once it is gone
    async fn get_bucket(&self, namespace: &str, name: &str) -> Result<Option<Bucket>, kube::Error>;

    /// Cluster-scoped Provider record
    async fn get_provider(&self, name: &str) -> Result<Option<Provider>, kube::Error>;

    /// Overwrite the finalizer list
    ///
    /// `resource_version` makes the write conditional on the record not
    /// having changed since it was read.
    async fn replace_finalizers(
        &self,
        namespace: &str,
        name: &str,
        finalizers: Vec<String>,
        resource_version: Option<String>,
    ) -> Result<(), kube::Error>;

    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &BucketStatus,
    ) -> Result<(), kube::Error>;
}

#[derive(Clone)]
pub struct KubeBucketStore {
    client: Client,
}

impl std::fmt::Debug for KubeBucketStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeBucketStore").finish_non_exhaustive()
    }
}

impl KubeBucketStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn buckets(&self, namespace: &str) -> Api<Bucket> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl BucketStore for KubeBucketStore {
    async fn get_bucket(&self, namespace: &str, name: &str) -> Result<Option<Bucket>, kube::Error> {
        self.buckets(namespace).get_opt(name).await
    }

    async fn get_provider(&self, name: &str) -> Result<Option<Provider>, kube::Error> {
        let api: Api<Provider> = Api::all(self.client.clone());
        api.get_opt(name).await
    }

    async fn replace_finalizers(
        &self,
        namespace: &str,
        name: &str,
        finalizers: Vec<String>,
        resource_version: Option<String>,
    ) -> Result<(), kube::Error> {
        let patch = json!({
            "metadata": {
                "finalizers": finalizers,
                "resourceVersion": resource_version,
            }
        });
        self.buckets(namespace)
            .patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
            .await?;
        Ok(())
    }

    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &BucketStatus,
    ) -> Result<(), kube::Error> {
        let patch = json!({ "status": status });
        self.buckets(namespace)
            .patch_status(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
            .await?;
        Ok(())
    }
}
