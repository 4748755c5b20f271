//! # Watch Loop
//!
//! Controller watch loop that monitors Bucket resources and triggers
//! reconciliation when changes are detected.

use crate::controller::reconciler::{reconcile, Reconciler};
use crate::controller::server::ServerState;
use crate::crd::Bucket;
use crate::runtime::error_policy::handle_reconciliation_error;
use futures::StreamExt;
use kube::api::Api;
use kube_runtime::{controller, watcher, Controller};
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

/// Run the controller watch loop until a shutdown signal arrives
///
/// Reconciliations for distinct Buckets run in parallel up to the configured
/// concurrency; the controller never runs two for the same Bucket at once.
pub async fn run_watch_loop(
    buckets: Api<Bucket>,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
) -> Result<(), anyhow::Error> {
    let concurrency = reconciler.config.max_concurrent_reconciliations;
    info!(
        "Starting controller watch loop (max {} concurrent reconciliations)...",
        concurrency
    );

    // Fail readiness as soon as shutdown starts so no new traffic is routed here
    let shutdown_state = Arc::clone(&server_state);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal, draining in-flight reconciliations...");
            shutdown_state.set_ready(false);
        }
    });

    server_state.set_ready(true);

    let watch_span = tracing::span!(
        tracing::Level::INFO,
        "controller.watch",
        operation = "watch_loop"
    );

    Controller::new(buckets, watcher::Config::default().any_semantic())
        .with_config(controller::Config::default().concurrency(concurrency))
        .shutdown_on_signal()
        .run(reconcile, handle_reconciliation_error, reconciler)
        .for_each(|result| async move {
            match result {
                Ok((object, _action)) => {
                    debug!(resource.name = object.name.as_str(), "watch.event.reconciled");
                }
                Err(e) => warn!("Controller stream error: {}", e),
            }
        })
        .instrument(watch_span)
        .await;

    server_state.set_ready(false);
    info!("Controller stopped gracefully");
    Ok(())
}
