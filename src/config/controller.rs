//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// HTTP port for `/metrics`, `/healthz` and `/readyz`
    pub metrics_port: u16,
    /// Maximum concurrent reconciliations
    /// Limits how many Bucket resources can be reconciled simultaneously
    pub max_concurrent_reconciliations: u16,
    /// Requeue interval after a successful reconciliation (seconds)
    pub resync_interval_secs: u64,
    /// Requeue delay after a Vault session expired mid-flight (seconds)
    pub session_expired_requeue_secs: u64,
    /// Fibonacci backoff starting value for failed reconciliations (seconds)
    pub error_backoff_start_secs: u64,
    /// Fibonacci backoff maximum value for failed reconciliations (seconds)
    pub error_backoff_max_secs: u64,
    /// Log format (json, text)
    pub log_format: String,
    /// S3 client settings
    pub s3: S3Settings,
    /// Vault client settings
    pub vault: VaultSettings,
}

/// Settings applied to every S3 client built by the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Settings {
    /// Endpoint override, used to point the controller at an S3-compatible test double
    pub endpoint_override: Option<String>,
    /// Path-style addressing (`http://host/bucket` instead of `http://bucket.host`)
    pub force_path_style: bool,
    /// Maximum attempts per API call, first attempt included
    pub max_attempts: u32,
    /// Initial backoff between retry attempts (milliseconds)
    pub initial_backoff_ms: u64,
}

/// Environment-level Vault defaults
///
/// `VAULT_ADDR` and `VAULT_SKIP_VERIFY` may also be supplied per Provider
/// in its credential map, which takes precedence over these values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultSettings {
    pub addr: String,
    pub skip_verify: bool,
    pub request_timeout_secs: u64,
    /// Local identity token presented to Vault's Kubernetes auth backend
    pub identity_token_path: PathBuf,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            metrics_port: DEFAULT_METRICS_PORT,
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            resync_interval_secs: DEFAULT_RESYNC_INTERVAL_SECS,
            session_expired_requeue_secs: DEFAULT_SESSION_EXPIRED_REQUEUE_SECS,
            error_backoff_start_secs: DEFAULT_ERROR_BACKOFF_START_SECS,
            error_backoff_max_secs: DEFAULT_ERROR_BACKOFF_MAX_SECS,
            log_format: "text".to_string(),
            s3: S3Settings::default(),
            vault: VaultSettings::default(),
        }
    }
}

impl Default for S3Settings {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            endpoint_override: None,
            force_path_style: false,
            max_attempts: DEFAULT_S3_MAX_ATTEMPTS,
            initial_backoff_ms: DEFAULT_S3_INITIAL_BACKOFF_MS,
        }
    }
}

impl Default for VaultSettings {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            addr: DEFAULT_VAULT_ADDR.to_string(),
            skip_verify: false,
            request_timeout_secs: DEFAULT_VAULT_REQUEST_TIMEOUT_SECS,
            identity_token_path: PathBuf::from(DEFAULT_IDENTITY_TOKEN_PATH),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            max_concurrent_reconciliations: env_var_or_default(
                "MAX_CONCURRENT_RECONCILIATIONS",
                DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            ),
            resync_interval_secs: env_var_or_default(
                "RESYNC_INTERVAL_SECS",
                DEFAULT_RESYNC_INTERVAL_SECS,
            ),
            session_expired_requeue_secs: env_var_or_default(
                "SESSION_EXPIRED_REQUEUE_SECS",
                DEFAULT_SESSION_EXPIRED_REQUEUE_SECS,
            ),
            error_backoff_start_secs: env_var_or_default(
                "ERROR_BACKOFF_START_SECS",
                DEFAULT_ERROR_BACKOFF_START_SECS,
            ),
            error_backoff_max_secs: env_var_or_default(
                "ERROR_BACKOFF_MAX_SECS",
                DEFAULT_ERROR_BACKOFF_MAX_SECS,
            ),
            log_format: env_var_or_default_str("LOG_FORMAT", "text"),
            s3: S3Settings::from_env(),
            vault: VaultSettings::from_env(),
        }
    }

    /// Get requeue duration after a successful reconciliation
    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }

    /// Get requeue duration after a Vault session expired
    pub fn session_expired_requeue(&self) -> Duration {
        Duration::from_secs(self.session_expired_requeue_secs)
    }
}

impl S3Settings {
    /// Load S3 settings from environment variables
    ///
    /// Path-style addressing defaults to on whenever `MOCK_S3_ENDPOINT` is set,
    /// since S3 test doubles rarely serve virtual-hosted buckets.
    pub fn from_env() -> Self {
        use crate::constants::*;
        let endpoint_override = std::env::var("MOCK_S3_ENDPOINT")
            .ok()
            .filter(|v| !v.trim().is_empty());
        let force_path_style =
            env_var_or_default_bool("S3_FORCE_PATH_STYLE", endpoint_override.is_some());
        Self {
            endpoint_override,
            force_path_style,
            // Zero attempts would never call S3 at all
            max_attempts: env_var_or_default("S3_MAX_ATTEMPTS", DEFAULT_S3_MAX_ATTEMPTS).max(1),
            initial_backoff_ms: env_var_or_default(
                "S3_INITIAL_BACKOFF_MS",
                DEFAULT_S3_INITIAL_BACKOFF_MS,
            ),
        }
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }
}

impl VaultSettings {
    /// Load Vault defaults from environment variables
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            addr: env_var_or_default_str("VAULT_ADDR", DEFAULT_VAULT_ADDR),
            skip_verify: env_var_or_default_bool("VAULT_SKIP_VERIFY", false),
            request_timeout_secs: env_var_or_default(
                "VAULT_REQUEST_TIMEOUT_SECS",
                DEFAULT_VAULT_REQUEST_TIMEOUT_SECS,
            ),
            identity_token_path: PathBuf::from(env_var_or_default_str(
                "VAULT_IDENTITY_TOKEN_PATH",
                DEFAULT_IDENTITY_TOKEN_PATH,
            )),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Interpret a truthy flag value (`true`, `1`, `yes`, `on`, case-insensitive)
pub fn parse_bool_flag(value: &str) -> bool {
    let v_lower = value.trim().to_lowercase();
    v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as boolean or return default
fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| parse_bool_flag(&v))
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
