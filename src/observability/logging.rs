//! # Logging
//!
//! tracing subscriber setup. `RUST_LOG` wins when set; otherwise the
//! controller logs at `info`.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "bucket_controller=info";

/// Install the global tracing subscriber
///
/// `format` is `json` for structured output, anything else for human-readable text.
pub fn init_tracing(format: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if format.eq_ignore_ascii_case("json") {
        builder.json().with_current_span(true).try_init()
    } else {
        builder.with_target(true).try_init()
    };

    result.map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {e}"))
}
