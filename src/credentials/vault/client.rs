//! # Vault HTTP Client
//!
//! Minimal client for the two Vault endpoints the controller uses:
//! `POST v1/<auth-path>/login` and `GET v1/<path>`.

use super::{VaultApi, VaultConnector, VaultEndpoint, VaultLogin};
use crate::credentials::CredentialError;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use zeroize::Zeroizing;

#[derive(Debug, Clone)]
pub struct HttpVaultApi {
    client: Client,
    addr: String,
}

#[derive(Deserialize)]
struct LoginResponse {
    auth: Option<LoginAuth>,
}

#[derive(Deserialize)]
struct LoginAuth {
    client_token: String,
    #[serde(default)]
    lease_duration: u64,
}

impl HttpVaultApi {
    pub fn new(endpoint: &VaultEndpoint, timeout: Duration) -> Result<Self, CredentialError> {
        let mut builder = Client::builder().timeout(timeout);
        if endpoint.skip_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }
        Ok(Self {
            client: builder.build()?,
            addr: endpoint.addr.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.addr, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path))
    }
}

#[async_trait]
impl VaultApi for HttpVaultApi {
    async fn login(
        &self,
        auth_path: &str,
        role: &str,
        jwt: &str,
    ) -> Result<VaultLogin, CredentialError> {
        let login_path = format!("{}/login", auth_path.trim_end_matches('/'));
        let response = self
            .request(Method::POST, &login_path)
            .json(&json!({ "role": role, "jwt": jwt }))
            .send()
            .await?;
        let response = ensure_success(response, "login").await?;

        let body: LoginResponse = response.json().await?;
        let auth = body.auth.ok_or_else(|| CredentialError::MalformedResponse {
            operation: "login".to_string(),
            message: "response has no auth block".to_string(),
        })?;

        Ok(VaultLogin {
            client_token: Zeroizing::new(auth.client_token),
            lease_duration: Duration::from_secs(auth.lease_duration),
        })
    }

    async fn read(&self, token: &str, path: &str) -> Result<Option<Value>, CredentialError> {
        let response = self
            .request(Method::GET, path)
            .header("X-Vault-Token", token)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = ensure_success(response, "read").await?;
        Ok(Some(response.json().await?))
    }
}

async fn ensure_success(response: Response, operation: &str) -> Result<Response, CredentialError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(CredentialError::VaultStatus {
        operation: operation.to_string(),
        status: status.as_u16(),
        message,
    })
}

/// Connector producing [`HttpVaultApi`] clients
#[derive(Debug, Clone)]
pub struct HttpVaultConnector {
    timeout: Duration,
}

impl HttpVaultConnector {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl VaultConnector for HttpVaultConnector {
    fn connect(&self, endpoint: &VaultEndpoint) -> Result<Arc<dyn VaultApi>, CredentialError> {
        Ok(Arc::new(HttpVaultApi::new(endpoint, self.timeout)?))
    }
}
