//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default worker pool size for the controller
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;

/// Default requeue interval after a successful reconciliation (seconds)
/// Level-triggered drift correction against out-of-band bucket changes
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 300;

/// Default requeue delay when a cached Vault session has expired (seconds)
pub const DEFAULT_SESSION_EXPIRED_REQUEUE_SECS: u64 = 10;

/// Default Fibonacci backoff starting value for failed reconciliations (seconds)
pub const DEFAULT_ERROR_BACKOFF_START_SECS: u64 = 5;

/// Default Fibonacci backoff maximum value for failed reconciliations (seconds)
pub const DEFAULT_ERROR_BACKOFF_MAX_SECS: u64 = 300;

/// Default maximum attempts for a single S3 API call (first attempt included)
pub const DEFAULT_S3_MAX_ATTEMPTS: u32 = 5;

/// Default initial backoff between S3 retry attempts (milliseconds)
pub const DEFAULT_S3_INITIAL_BACKOFF_MS: u64 = 200;

/// Default Vault server address
pub const DEFAULT_VAULT_ADDR: &str = "https://127.0.0.1:8200";

/// Default Vault HTTP request timeout (seconds)
pub const DEFAULT_VAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Projected service account token used as the Vault Kubernetes auth JWT
pub const DEFAULT_IDENTITY_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Region S3 treats as implicit; `CreateBucket` must omit the location constraint for it
pub const DEFAULT_S3_REGION: &str = "us-east-1";

/// Finalizer placed on every Bucket before any external side effect
pub const BUCKET_FINALIZER: &str = "bucket-management.octopilot.io/finalizer";

/// Field manager used for status and finalizer patches
pub const FIELD_MANAGER: &str = "bucket-controller";

/// Maximum number of keys accepted by a single `DeleteObjects` call
pub const MAX_DELETE_BATCH: usize = 1000;

/// Credential map keys
pub mod credential_keys {
    pub const AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
    pub const AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
    pub const AWS_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";
    pub const VAULT_K8S_AUTH_BACKEND_PATH: &str = "VAULT_K8S_AUTH_BACKEND_PATH";
    pub const VAULT_K8S_AUTH_BACKEND_ROLE: &str = "VAULT_K8S_AUTH_BACKEND_ROLE";
    pub const VAULT_ADDR: &str = "VAULT_ADDR";
    pub const VAULT_SKIP_VERIFY: &str = "VAULT_SKIP_VERIFY";
}
