//! # Controller
//!
//! Core controller modules for the Bucket Controller.
//!
//! - `backoff`: Fibonacci backoff mechanism for retries
//! - `reconciler`: Core reconciliation logic
//! - `server`: HTTP server for metrics and health checks
//!
//! The `crdgen` binary lives alongside these modules but is built separately.

pub mod backoff;
pub mod reconciler;
pub mod server;
