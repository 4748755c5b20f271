//! # Error Policy
//!
//! Requeue decisions for failed reconciliations.
//!
//! Configuration errors wait for the next change to the Bucket. Everything
//! else is retried with per-resource Fibonacci backoff, so one failing Bucket
//! never slows down the others.

use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::crd::Bucket;
use crate::observability::metrics;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Handle reconciliation errors with Fibonacci backoff
pub fn handle_reconciliation_error(
    obj: Arc<Bucket>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_default();

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.name = name.as_str(),
        resource.namespace = namespace.as_str(),
        error.kind = error.kind(),
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {}/{}: {}", namespace, name, error);
    metrics::increment_reconciliation_errors();

    if error.is_permanent() {
        warn!(
            "Not retrying {}/{} until the Bucket or its Provider changes",
            namespace, name
        );
        return Action::await_change();
    }

    let resource_key = format!("{namespace}/{name}");
    let (backoff_seconds, error_count) = ctx.next_error_backoff(&resource_key);

    let next_trigger_time = chrono::Utc::now()
        + chrono::Duration::seconds(i64::try_from(backoff_seconds).unwrap_or(i64::MAX));
    info!(
        "Retrying {} with Fibonacci backoff: {}s (error count: {}, next attempt {})",
        resource_key,
        backoff_seconds,
        error_count,
        next_trigger_time.to_rfc3339()
    );

    metrics::increment_requeues_total("error-backoff");
    Action::requeue(Duration::from_secs(backoff_seconds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ControllerConfig, VaultSettings};
    use crate::controller::reconciler::BucketStore;
    use crate::credentials::vault::{SessionManager, VaultApi, VaultConnector, VaultEndpoint};
    use crate::credentials::{CredentialError, StaticCredentials};
    use crate::crd::{BucketSpec, BucketStatus, CannedAcl, Provider, ProviderType};
    use crate::provider::{
        ProviderClientCache, ProviderError, StorageApi, StorageConnector, StorageError,
    };
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    #[derive(Debug)]
    struct NoVault;

    impl VaultConnector for NoVault {
        fn connect(&self, _endpoint: &VaultEndpoint) -> Result<Arc<dyn VaultApi>, CredentialError> {
            Err(CredentialError::MissingVaultConfig("VAULT_ADDR"))
        }
    }

    struct NoStorage;

    #[async_trait]
    impl StorageConnector for NoStorage {
        async fn connect(
            &self,
            _region: &str,
            _credentials: Option<&StaticCredentials>,
        ) -> Result<Arc<dyn StorageApi>, ProviderError> {
            Err(ProviderError::Unsupported(ProviderType::Gcp))
        }
    }

    struct EmptyStore;

    #[async_trait]
    impl BucketStore for EmptyStore {
        async fn get_bucket(&self, _: &str, _: &str) -> Result<Option<Bucket>, kube::Error> {
            Ok(None)
        }

        async fn get_provider(&self, _: &str) -> Result<Option<Provider>, kube::Error> {
            Ok(None)
        }

        async fn replace_finalizers(
            &self,
            _: &str,
            _: &str,
            _: Vec<String>,
            _: Option<String>,
        ) -> Result<(), kube::Error> {
            Ok(())
        }

        async fn patch_status(&self, _: &str, _: &str, _: &BucketStatus) -> Result<(), kube::Error> {
            Ok(())
        }
    }

    fn reconciler() -> Arc<Reconciler> {
        let sessions = Arc::new(SessionManager::new(
            Arc::new(NoVault),
            VaultSettings::default(),
        ));
        let clients = Arc::new(ProviderClientCache::new(sessions, Arc::new(NoStorage)));
        Arc::new(Reconciler::with_parts(
            Arc::new(EmptyStore),
            clients,
            ControllerConfig::default(),
        ))
    }

    fn bucket(name: &str) -> Arc<Bucket> {
        let mut bucket = Bucket::new(
            name,
            BucketSpec {
                region: "us-west-2".to_string(),
                bucket_name: "b1".to_string(),
                enable_versioning: false,
                enable_object_lock: false,
                enable_transfer_acceleration: false,
                bucket_policy: None,
                canned_bucket_acl: CannedAcl::Private,
                tags: BTreeMap::new(),
                provider_ref: "aws-main".to_string(),
            },
        );
        bucket.metadata.namespace = Some("default".to_string());
        Arc::new(bucket)
    }

    fn transient() -> ReconcilerError {
        ReconcilerError::ProviderNotFound("aws-main".to_string())
    }

    fn requeue_secs(secs: u64) -> Action {
        Action::requeue(Duration::from_secs(secs))
    }

    #[test]
    fn test_permanent_errors_wait_for_change() {
        let ctx = reconciler();
        let obj = bucket("assets");

        for error in [
            ReconcilerError::InvalidSpec("bucketName is empty".to_string()),
            ReconcilerError::Provider(ProviderError::Unsupported(ProviderType::Azure)),
            ReconcilerError::Provider(ProviderError::Storage(StorageError::InvalidPolicy {
                bucket: "b1".to_string(),
                reason: "not an object".to_string(),
            })),
        ] {
            let action = handle_reconciliation_error(Arc::clone(&obj), &error, Arc::clone(&ctx));
            assert_eq!(action, Action::await_change());
        }
        assert_eq!(ctx.tracked_backoffs(), 0);
    }

    #[test]
    fn test_transient_errors_follow_fibonacci() {
        let ctx = reconciler();
        let obj = bucket("assets");

        let actions: Vec<_> = (0..6)
            .map(|_| handle_reconciliation_error(Arc::clone(&obj), &transient(), Arc::clone(&ctx)))
            .collect();

        assert_eq!(
            actions,
            [5, 5, 10, 15, 25, 40].map(requeue_secs).to_vec()
        );
    }

    #[test]
    fn test_backoff_is_per_resource() {
        let ctx = reconciler();
        let first = bucket("first");
        let second = bucket("second");

        handle_reconciliation_error(Arc::clone(&first), &transient(), Arc::clone(&ctx));
        handle_reconciliation_error(Arc::clone(&first), &transient(), Arc::clone(&ctx));
        handle_reconciliation_error(Arc::clone(&first), &transient(), Arc::clone(&ctx));

        assert_eq!(
            handle_reconciliation_error(second, &transient(), Arc::clone(&ctx)),
            requeue_secs(5)
        );
        assert_eq!(
            handle_reconciliation_error(first, &transient(), ctx),
            requeue_secs(15)
        );
    }

    #[test]
    fn test_success_resets_and_forgets_backoff() {
        let ctx = reconciler();
        let obj = bucket("assets");

        for _ in 0..4 {
            handle_reconciliation_error(Arc::clone(&obj), &transient(), Arc::clone(&ctx));
        }
        assert_eq!(ctx.tracked_backoffs(), 1);

        ctx.reset_backoff("default/assets");
        assert_eq!(ctx.tracked_backoffs(), 0);

        assert_eq!(
            handle_reconciliation_error(obj, &transient(), ctx),
            requeue_secs(5)
        );
    }
}
