//! # Vault
//!
//! Kubernetes-auth sessions against HashiCorp Vault and secret resolution
//! through those sessions.
//!
//! - `client.rs` - reqwest implementation of the Vault HTTP API
//! - `session.rs` - session cache and secret resolution

mod client;
mod session;

pub use client::{HttpVaultApi, HttpVaultConnector};
pub use session::{SessionManager, VaultSession};

use super::{credential_str, CredentialError, CredentialMap};
use crate::config::{parse_bool_flag, VaultSettings};
use crate::constants::credential_keys::{
    VAULT_ADDR, VAULT_K8S_AUTH_BACKEND_PATH, VAULT_K8S_AUTH_BACKEND_ROLE, VAULT_SKIP_VERIFY,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use zeroize::Zeroizing;

/// Where and how to reach a Vault server
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VaultEndpoint {
    pub addr: String,
    pub skip_verify: bool,
}

/// Token issued by a successful login
pub struct VaultLogin {
    pub client_token: Zeroizing<String>,
    pub lease_duration: Duration,
}

impl std::fmt::Debug for VaultLogin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultLogin")
            .field("client_token", &"***")
            .field("lease_duration", &self.lease_duration)
            .finish()
    }
}

/// The two Vault operations the controller needs
#[async_trait]
pub trait VaultApi: Send + Sync + std::fmt::Debug {
    /// Exchange a Kubernetes identity token for a Vault token
    async fn login(
        &self,
        auth_path: &str,
        role: &str,
        jwt: &str,
    ) -> Result<VaultLogin, CredentialError>;

    /// Read the secret at `path`, `None` if nothing is stored there
    async fn read(
        &self,
        token: &str,
        path: &str,
    ) -> Result<Option<serde_json::Value>, CredentialError>;
}

/// Builds a [`VaultApi`] for an endpoint
pub trait VaultConnector: Send + Sync + std::fmt::Debug {
    fn connect(&self, endpoint: &VaultEndpoint) -> Result<Arc<dyn VaultApi>, CredentialError>;
}

/// Kubernetes auth settings extracted from a Provider's credential map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultAuthConfig {
    /// Mount path of the Kubernetes auth backend, e.g. `auth/kubernetes`
    pub auth_path: String,
    pub role: String,
    pub endpoint: VaultEndpoint,
}

impl VaultAuthConfig {
    /// Extract auth settings, falling back to `defaults` for the endpoint
    ///
    /// `VAULT_K8S_AUTH_BACKEND_PATH` and `VAULT_K8S_AUTH_BACKEND_ROLE` are required.
    pub fn from_credentials(
        credentials: &CredentialMap,
        defaults: &VaultSettings,
    ) -> Result<Self, CredentialError> {
        let auth_path = credential_str(credentials, VAULT_K8S_AUTH_BACKEND_PATH)?
            .ok_or(CredentialError::MissingVaultConfig(VAULT_K8S_AUTH_BACKEND_PATH))?;
        let role = credential_str(credentials, VAULT_K8S_AUTH_BACKEND_ROLE)?
            .ok_or(CredentialError::MissingVaultConfig(VAULT_K8S_AUTH_BACKEND_ROLE))?;

        let addr = credential_str(credentials, VAULT_ADDR)?
            .map_or_else(|| defaults.addr.clone(), str::to_string);
        let skip_verify = credential_str(credentials, VAULT_SKIP_VERIFY)?
            .map_or(defaults.skip_verify, parse_bool_flag);

        Ok(Self {
            auth_path: auth_path.to_string(),
            role: role.to_string(),
            endpoint: VaultEndpoint { addr, skip_verify },
        })
    }

    /// Session cache key: auth path with `/` normalized to `-`, then the role
    #[must_use]
    pub fn cache_key(&self) -> String {
        format!("{}-{}", self.auth_path.replace('/', "-"), self.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(pairs: &[(&str, &str)]) -> CredentialMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.as_bytes().to_vec()))
            .collect()
    }

    #[test]
    fn test_auth_config_requires_backend_path() {
        let map = creds(&[(VAULT_K8S_AUTH_BACKEND_ROLE, "bucket-controller")]);
        let err = VaultAuthConfig::from_credentials(&map, &VaultSettings::default()).unwrap_err();
        assert!(matches!(
            err,
            CredentialError::MissingVaultConfig(VAULT_K8S_AUTH_BACKEND_PATH)
        ));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_auth_config_requires_role() {
        let map = creds(&[(VAULT_K8S_AUTH_BACKEND_PATH, "auth/kubernetes")]);
        let err = VaultAuthConfig::from_credentials(&map, &VaultSettings::default()).unwrap_err();
        assert!(matches!(
            err,
            CredentialError::MissingVaultConfig(VAULT_K8S_AUTH_BACKEND_ROLE)
        ));
    }

    #[test]
    fn test_auth_config_cache_key_and_defaults() {
        let map = creds(&[
            (VAULT_K8S_AUTH_BACKEND_PATH, "auth/k8s/prod"),
            (VAULT_K8S_AUTH_BACKEND_ROLE, "buckets"),
        ]);
        let config = VaultAuthConfig::from_credentials(&map, &VaultSettings::default()).unwrap();
        assert_eq!(config.cache_key(), "auth-k8s-prod-buckets");
        assert_eq!(config.endpoint.addr, "https://127.0.0.1:8200");
        assert!(!config.endpoint.skip_verify);
    }

    #[test]
    fn test_auth_config_endpoint_overrides() {
        let map = creds(&[
            (VAULT_K8S_AUTH_BACKEND_PATH, "auth/kubernetes"),
            (VAULT_K8S_AUTH_BACKEND_ROLE, "buckets"),
            (VAULT_ADDR, "https://vault.internal:8200"),
            (VAULT_SKIP_VERIFY, "true"),
        ]);
        let config = VaultAuthConfig::from_credentials(&map, &VaultSettings::default()).unwrap();
        assert_eq!(config.endpoint.addr, "https://vault.internal:8200");
        assert!(config.endpoint.skip_verify);
    }
}
