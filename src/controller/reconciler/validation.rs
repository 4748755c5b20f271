//! # Validation
//!
//! Checks a Bucket spec before any call reaches S3. Failures here are
//! configuration errors and are not retried until the spec changes.

use crate::crd::BucketSpec;
use regex::Regex;
use std::sync::LazyLock;

static BUCKET_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([a-z0-9.-]{0,61}[a-z0-9])?$")
        .expect("Failed to compile bucket name regex - this should never happen")
});

static IPV4_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}$")
        .expect("Failed to compile IPv4 regex - this should never happen")
});

/// Validate an S3 bucket name against the general purpose bucket naming rules
///
/// The three-character lower bound is left to S3 itself, which reports it as
/// an ordinary API error.
pub fn validate_bucket_name(name: &str) -> Result<(), String> {
    if !BUCKET_NAME.is_match(name) {
        return Err(format!(
            "bucketName '{name}' must be at most 63 characters of lowercase letters, digits, '.' or '-', starting and ending with a letter or digit"
        ));
    }
    if name.contains("..") {
        return Err(format!("bucketName '{name}' must not contain '..'"));
    }
    if IPV4_LIKE.is_match(name) {
        return Err(format!(
            "bucketName '{name}' must not be formatted as an IP address"
        ));
    }
    if name.starts_with("xn--") || name.ends_with("-s3alias") {
        return Err(format!("bucketName '{name}' uses a reserved prefix or suffix"));
    }
    Ok(())
}

/// Validate the fields the controller needs to act on a Bucket
pub fn validate_spec(spec: &BucketSpec) -> Result<(), String> {
    if spec.region.trim().is_empty() {
        return Err("region must not be empty".to_string());
    }
    if spec.provider_ref.trim().is_empty() {
        return Err("providerRef must not be empty".to_string());
    }
    validate_bucket_name(&spec.bucket_name)
}
