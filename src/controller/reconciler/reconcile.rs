//! # Reconcile
//!
//! One level-triggered pass over a Bucket:
//!
//! 1. Load the record; a missing record ends the pass
//! 2. Pending delete: empty and delete the bucket, then release the finalizer
//! 3. Validate the spec before anything touches S3
//! 4. Load the Provider; a missing or unsupported Provider ends the pass
//!    before any finalizer is written
//! 5. Ensure the finalizer (never added to a record already being deleted)
//! 6. Resolve the Provider client; an expired Vault session becomes a short requeue
//! 7. Create if missing, re-apply every property, mark ready
//!
//! Any failing step ends the pass and is handed to the error policy. Nothing
//! is retried inline.

use super::finalizer::{ensure_finalizer, release_finalizer};
use super::state::{classify, has_finalizer, BucketState};
use super::status::{failure_status, ready_status, REASON_FAILED, REASON_INVALID_SPEC};
use super::store::BucketStore;
use super::types::{Reconciler, ReconcilerError};
use super::validation::validate_spec;
use crate::crd::{Bucket, Provider};
use crate::observability::metrics;
use crate::provider::{ProviderClientCache, ProviderError};
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

/// What a single pass did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The record no longer exists
    NotFound,
    /// Being deleted but not ours to clean up
    Released,
    /// The Provider's Vault session expired; retry shortly
    SessionExpired,
    /// Bucket removed (or already absent) and finalizer released
    Deleted { existed: bool },
    /// Bucket exists with every property applied
    Converged { created: bool },
}

/// Run one pass for the Bucket `namespace/name`
///
/// Works from a fresh read of the record rather than the watch event's copy.
pub async fn reconcile_bucket(
    store: &dyn BucketStore,
    clients: &ProviderClientCache,
    namespace: &str,
    name: &str,
) -> Result<ReconcileOutcome, ReconcilerError> {
    let bucket = store.get_bucket(namespace, name).await?;
    let state = classify(bucket.as_ref());
    let Some(bucket) = bucket else {
        debug!("Bucket {}/{} not found, nothing to do", namespace, name);
        return Ok(ReconcileOutcome::NotFound);
    };
    debug!("Bucket {}/{} is {}", namespace, name, state);

    if state == BucketState::PendingDelete {
        if !has_finalizer(&bucket) {
            debug!("Bucket {}/{} is being deleted without our finalizer", namespace, name);
            return Ok(ReconcileOutcome::Released);
        }
        return finalize(store, clients, &bucket).await;
    }

    if let Err(message) = validate_spec(&bucket.spec) {
        record_failure(store, &bucket, REASON_INVALID_SPEC, &message).await;
        return Err(ReconcilerError::InvalidSpec(message));
    }

    // Missing or unsupported Providers fail before the finalizer goes on
    let provider = match load_provider(store, &bucket).await {
        Ok(provider) => provider,
        Err(e) => {
            record_failure(store, &bucket, REASON_FAILED, &e.to_string()).await;
            return Err(e);
        }
    };

    ensure_finalizer(store, &bucket).await?;

    match converge(store, clients, &bucket, &provider).await {
        Ok(outcome) => Ok(outcome),
        Err(e) if e.is_session_expired() => {
            info!(
                "Vault session for Bucket {}/{} expired, requeueing to re-authenticate",
                namespace, name
            );
            Ok(ReconcileOutcome::SessionExpired)
        }
        Err(e) => {
            record_failure(store, &bucket, REASON_FAILED, &e.to_string()).await;
            Err(e)
        }
    }
}

/// Fetch the referenced Provider and reject types without a storage backend
async fn load_provider(
    store: &dyn BucketStore,
    bucket: &Bucket,
) -> Result<Provider, ReconcilerError> {
    let provider_ref = bucket.spec.provider_ref.as_str();
    let provider = store
        .get_provider(provider_ref)
        .await?
        .ok_or_else(|| ReconcilerError::ProviderNotFound(provider_ref.to_string()))?;
    ProviderClientCache::ensure_supported(provider.spec.provider_type)?;
    Ok(provider)
}

async fn converge(
    store: &dyn BucketStore,
    clients: &ProviderClientCache,
    bucket: &Bucket,
    provider: &Provider,
) -> Result<ReconcileOutcome, ReconcilerError> {
    let client = clients.get_client(provider, &bucket.spec.region).await?;
    let engine = client.engine();
    let spec = &bucket.spec;

    let created = if engine.exists(&spec.bucket_name).await.map_err(provider_err)? {
        false
    } else {
        engine.create(spec).await.map_err(provider_err)?;
        true
    };
    engine.apply_properties(spec).await.map_err(provider_err)?;

    if let Some(status) = ready_status(bucket) {
        store
            .patch_status(
                &bucket.namespace().unwrap_or_default(),
                &bucket.name_any(),
                &status,
            )
            .await?;
        info!(
            "Bucket {}/{} is ready ({} in {})",
            bucket.namespace().unwrap_or_default(),
            bucket.name_any(),
            spec.bucket_name,
            spec.region
        );
    }

    Ok(ReconcileOutcome::Converged { created })
}

async fn finalize(
    store: &dyn BucketStore,
    clients: &ProviderClientCache,
    bucket: &Bucket,
) -> Result<ReconcileOutcome, ReconcilerError> {
    let client = match load_provider(store, bucket).await {
        Ok(provider) => clients.get_client(&provider, &bucket.spec.region).await,
        // Nothing can have been created through a Provider without a backend
        Err(ReconcilerError::Provider(ProviderError::Unsupported(provider_type))) => {
            info!(
                "Bucket {} uses unsupported provider type {}, releasing finalizer",
                bucket.name_any(),
                provider_type
            );
            release_finalizer(store, bucket).await?;
            return Ok(ReconcileOutcome::Deleted { existed: false });
        }
        Err(e) => return Err(e),
    };
    let client = match client {
        Ok(client) => client,
        Err(e) if e.is_session_expired() => return Ok(ReconcileOutcome::SessionExpired),
        Err(e) => return Err(e.into()),
    };

    let existed = client
        .engine()
        .delete(&bucket.spec.bucket_name)
        .await
        .map_err(provider_err)?;
    release_finalizer(store, bucket).await?;
    Ok(ReconcileOutcome::Deleted { existed })
}

fn provider_err(e: crate::provider::StorageError) -> ReconcilerError {
    ReconcilerError::Provider(e.into())
}

/// Best-effort failure status; the original error is what gets returned
async fn record_failure(store: &dyn BucketStore, bucket: &Bucket, reason: &str, message: &str) {
    let Some(status) = failure_status(bucket, reason, message) else {
        return;
    };
    if let Err(e) = store
        .patch_status(
            &bucket.namespace().unwrap_or_default(),
            &bucket.name_any(),
            &status,
        )
        .await
    {
        warn!(
            "Failed to record failure status on Bucket {}: {}",
            bucket.name_any(),
            e
        );
    }
}

/// Controller entry point for a Bucket event
pub async fn reconcile(obj: Arc<Bucket>, ctx: Arc<Reconciler>) -> Result<Action, ReconcilerError> {
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_default();
    let resource_key = format!("{namespace}/{name}");
    let span = info_span!(
        "controller.reconcile",
        resource.name = name.as_str(),
        resource.namespace = namespace.as_str(),
        resource.generation = obj.metadata.generation.unwrap_or(0)
    );

    async move {
        metrics::increment_reconciliations();
        let start = Instant::now();
        let result = reconcile_bucket(ctx.store.as_ref(), &ctx.clients, &namespace, &name).await;
        metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());

        let outcome = result?;
        let action = match outcome {
            ReconcileOutcome::NotFound | ReconcileOutcome::Released => Action::await_change(),
            ReconcileOutcome::Deleted { existed } => {
                info!(
                    "Bucket {} finalized (backing bucket {})",
                    resource_key,
                    if existed { "deleted" } else { "already absent" }
                );
                Action::await_change()
            }
            ReconcileOutcome::SessionExpired => {
                metrics::increment_requeues_total("session-expired");
                Action::requeue(ctx.config.session_expired_requeue())
            }
            ReconcileOutcome::Converged { created } => {
                if created {
                    info!("Created and converged Bucket {}", resource_key);
                }
                metrics::increment_requeues_total("resync");
                Action::requeue(ctx.config.resync_interval())
            }
        };

        // A requeue after session expiry is not a failure; keep any backoff history
        if outcome != ReconcileOutcome::SessionExpired {
            ctx.reset_backoff(&resource_key);
        }
        Ok(action)
    }
    .instrument(span)
    .await
}
