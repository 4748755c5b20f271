//! # Credential Errors
//!
//! Error type shared by credential classification and the Vault session manager.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential '{key}' is not valid base64: {source}")]
    InvalidEncoding {
        key: String,
        #[source]
        source: base64::DecodeError,
    },

    #[error("credential '{key}' is not valid UTF-8")]
    InvalidUtf8 { key: String },

    #[error("provider credentials are missing required Vault setting {0}")]
    MissingVaultConfig(&'static str),

    #[error("Vault session '{cache_key}' expired, re-authentication required")]
    SessionExpired { cache_key: String },

    #[error("failed to read identity token from {}: {source}", path.display())]
    IdentityToken {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Vault returned {status} for {operation}: {message}")]
    VaultStatus {
        operation: String,
        status: u16,
        message: String,
    },

    #[error("malformed Vault response for {operation}: {message}")]
    MalformedResponse { operation: String, message: String },

    #[error("no secret found at Vault path '{path}'")]
    SecretNotFound { path: String },

    #[error("key '{key}' not found in Vault secret '{path}'")]
    KeyNotFound { path: String, key: String },

    #[error("Vault request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl CredentialError {
    /// Whether the caller should requeue rather than surface the error
    ///
    /// Only session expiry is retryable; everything else is either a
    /// configuration problem or an upstream failure.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, CredentialError::SessionExpired { .. })
    }

    /// Configuration problems that will not fix themselves without a change
    /// to the Provider resource
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CredentialError::InvalidEncoding { .. }
                | CredentialError::InvalidUtf8 { .. }
                | CredentialError::MissingVaultConfig(_)
                | CredentialError::KeyNotFound { .. }
        )
    }
}
