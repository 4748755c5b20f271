//! Bucket Controller Library
//!
//! This library provides the core functionality for the Bucket Controller:
//! reconciling `Bucket` resources into S3 buckets, with provider credentials
//! optionally brokered through Vault.
//!
//! ## Quick Start
//!
//! ```rust
//! use bucket_controller::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod cache;
pub mod config;
pub mod constants;
pub mod controller;
pub mod credentials;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod provider;
pub mod runtime;
