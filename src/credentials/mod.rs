//! # Credentials
//!
//! Turns the opaque credential map carried by a `Provider` into something a
//! storage client can be built from.
//!
//! A Provider's credentials fall into one of three shapes:
//!
//! 1. **Ambient** - no access key pair, defer to the AWS SDK default chain (IRSA, instance profile, env)
//! 2. **Static** - a literal access key pair
//! 3. **Vault** - both halves of the pair are `vault:<path>#<key>` references that must be
//!    resolved through a [`vault::SessionManager`] before use
//!
//! Classification is pure; no I/O happens in this module.

pub mod error;
pub mod vault;

pub use error::CredentialError;

use crate::constants::credential_keys::{
    AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY, AWS_SESSION_TOKEN,
};
use base64::Engine;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Decoded credential map, keys as found on the Provider
pub type CredentialMap = HashMap<String, Vec<u8>>;

/// Grammar for a Vault reference: `vault`, any separator, a path, `#`, a key.
static VAULT_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^vault[a-zA-Z0-9\W].*#[a-zA-Z0-9\W].*$")
        .expect("Failed to compile VAULT_REFERENCE regex - this should never happen")
});

const VAULT_REFERENCE_PREFIX: &str = "vault:";

/// Location of a single value inside Vault
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRef {
    pub path: String,
    pub key: String,
}

/// Literal AWS credentials
///
/// Wiped from memory on drop. `Debug` never prints key material.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct StaticCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl StaticCredentials {
    #[must_use]
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("access_key_id", &"***")
            .field("secret_access_key", &"***")
            .field("session_token", &self.session_token.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Result of classifying a Provider's credential map
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Use the SDK's default credential chain
    Ambient,
    /// Use the literal key pair as-is
    Static(StaticCredentials),
    /// Resolve both halves of the key pair through Vault
    Vault {
        access_key_id: SecretRef,
        secret_access_key: SecretRef,
    },
}

impl CredentialSource {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            CredentialSource::Ambient => "ambient",
            CredentialSource::Static(_) => "static",
            CredentialSource::Vault { .. } => "vault",
        }
    }
}

/// Decode the base64 values of a Provider's `spec.credentials`
pub fn decode_credentials(
    encoded: &BTreeMap<String, String>,
) -> Result<CredentialMap, CredentialError> {
    encoded
        .iter()
        .map(|(key, value)| {
            base64::engine::general_purpose::STANDARD
                .decode(value.trim())
                .map(|bytes| (key.clone(), bytes))
                .map_err(|source| CredentialError::InvalidEncoding {
                    key: key.clone(),
                    source,
                })
        })
        .collect()
}

/// Read a credential as UTF-8, `None` when the key is absent
pub(crate) fn credential_str<'a>(
    credentials: &'a CredentialMap,
    key: &str,
) -> Result<Option<&'a str>, CredentialError> {
    credentials
        .get(key)
        .map(|bytes| {
            std::str::from_utf8(bytes).map_err(|_| CredentialError::InvalidUtf8 {
                key: key.to_string(),
            })
        })
        .transpose()
}

/// Whether a credential value is a Vault reference rather than literal key material
#[must_use]
pub fn is_vault_reference(value: &str) -> bool {
    VAULT_REFERENCE.is_match(value)
}

/// Split a Vault reference into its path and key
///
/// The `vault:` prefix is dropped, then the value is split on `#`. The first
/// segment is the path and the last is the key; with more than one `#` any
/// middle segments are discarded.
///
/// Returns `None` if `value` is not a Vault reference.
#[must_use]
pub fn parse_vault_reference(value: &str) -> Option<SecretRef> {
    if !is_vault_reference(value) {
        return None;
    }
    let reference = value.strip_prefix(VAULT_REFERENCE_PREFIX).unwrap_or(value);
    let path = reference.split('#').next()?;
    let key = reference.rsplit('#').next()?;
    Some(SecretRef {
        path: path.to_string(),
        key: key.to_string(),
    })
}

/// Classify a decoded credential map
///
/// A missing access key id or secret access key defers to ambient discovery.
/// The pair only counts as a Vault indirection when both values are
/// references; a literal that merely mentions "vault" stays a literal.
pub fn classify_credentials(
    credentials: &CredentialMap,
) -> Result<CredentialSource, CredentialError> {
    let (Some(access_key_id), Some(secret_access_key)) = (
        credential_str(credentials, AWS_ACCESS_KEY_ID)?,
        credential_str(credentials, AWS_SECRET_ACCESS_KEY)?,
    ) else {
        return Ok(CredentialSource::Ambient);
    };

    if let (Some(access_ref), Some(secret_ref)) = (
        parse_vault_reference(access_key_id),
        parse_vault_reference(secret_access_key),
    ) {
        return Ok(CredentialSource::Vault {
            access_key_id: access_ref,
            secret_access_key: secret_ref,
        });
    }

    let session_token = credential_str(credentials, AWS_SESSION_TOKEN)?
        .filter(|token| !token.is_empty())
        .map(str::to_string);

    Ok(CredentialSource::Static(StaticCredentials {
        access_key_id: access_key_id.to_string(),
        secret_access_key: secret_access_key.to_string(),
        session_token,
    }))
}
