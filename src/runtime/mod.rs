//! # Runtime
//!
//! Process wiring for the controller binary.
//!
//! - `initialization`: crypto provider, tracing, metrics, HTTP server, Kubernetes client
//! - `watch_loop`: the `Bucket` controller stream
//! - `error_policy`: requeue decisions for failed reconciliations

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;

use anyhow::Result;

/// Initialize everything and run until shutdown
pub async fn run() -> Result<()> {
    let init = initialization::initialize().await?;
    watch_loop::run_watch_loop(init.buckets, init.reconciler, init.server_state).await
}
