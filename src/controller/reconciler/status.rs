//! # Status
//!
//! Builds the Bucket status for a pass outcome. Each builder returns `None`
//! when the stored status already says the same thing, so an unchanged pass
//! writes nothing and does not trigger another watch event.

use crate::crd::{Bucket, BucketStatus, Condition};

pub const CONDITION_READY: &str = "Ready";
pub const REASON_RECONCILED: &str = "BucketReconciled";
pub const REASON_FAILED: &str = "ReconciliationFailed";
pub const REASON_INVALID_SPEC: &str = "InvalidSpec";

/// Status for a fully converged pass, `None` if already recorded
#[must_use]
pub fn ready_status(bucket: &Bucket) -> Option<BucketStatus> {
    next_status(
        bucket,
        true,
        REASON_RECONCILED,
        format!("Bucket {} is reconciled", bucket.spec.bucket_name),
    )
}

/// Status for a failed pass, `None` if the same failure is already recorded
#[must_use]
pub fn failure_status(bucket: &Bucket, reason: &str, message: &str) -> Option<BucketStatus> {
    next_status(bucket, false, reason, message.to_string())
}

fn next_status(bucket: &Bucket, ready: bool, reason: &str, message: String) -> Option<BucketStatus> {
    let current = bucket.status.clone().unwrap_or_default();
    let condition_status = if ready { "True" } else { "False" };
    let existing = current.condition(CONDITION_READY);

    let unchanged = current.ready == ready
        && current.observed_generation == bucket.metadata.generation
        && existing.is_some_and(|c| {
            c.status == condition_status
                && c.reason.as_deref() == Some(reason)
                && c.message.as_deref() == Some(message.as_str())
        });
    if unchanged {
        return None;
    }

    let now = chrono::Utc::now().to_rfc3339();
    // Transition time only moves when the condition flips
    let last_transition_time = match existing {
        Some(c) if c.status == condition_status => c.last_transition_time.clone(),
        _ => Some(now.clone()),
    };

    let mut conditions: Vec<Condition> = current
        .conditions
        .into_iter()
        .filter(|c| c.r#type != CONDITION_READY)
        .collect();
    conditions.push(Condition {
        r#type: CONDITION_READY.to_string(),
        status: condition_status.to_string(),
        last_transition_time,
        reason: Some(reason.to_string()),
        message: Some(message),
    });

    Some(BucketStatus {
        ready,
        observed_generation: bucket.metadata.generation,
        conditions,
        last_reconcile_time: Some(now),
    })
}
