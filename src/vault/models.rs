use std::time::{Duration, SystemTime, UNIX_EPOCH};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const MIN_PASSPHRASE_CHARS: usize = 8;
pub const RAW256_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
    Passphrase,
    Raw256,
}

/// One named secret inside the vault. Raw-256 secrets are held and
/// serialized as 64 lowercase hex chars to keep the payload text-safe;
/// timestamps are unix seconds. Field order is the payload's canonical
/// order.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoredKey {
    pub id: String,
    pub name: String,
    pub kind: KeyKind,
    #[serde(with = "crate::vault::secret_serde")]
    pub secret: SecretString,
    pub created_at: u64,
    pub last_used_at: Option<u64>,
}

/// Input for `add_key`; validated and normalized before storage.
#[derive(Debug, Clone)]
pub struct NewKey {
    pub name: String,
    pub kind: KeyKind,
    pub secret: SecretString,
}

/// Patch for `update_key`. `last_used_at` is only touched when the
/// caller supplies it.
#[derive(Debug, Clone, Default)]
pub struct KeyPatch {
    pub name: Option<String>,
    pub secret: Option<SecretString>,
    pub last_used_at: Option<u64>,
}

pub(crate) fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs()
}

/// Trimmed, non-empty name or `InvalidInput`.
pub fn validate_name(name: &str) -> Result<String, CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::InvalidInput(
            "key name must not be empty".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Enforce the per-kind secret invariants and return the canonical
/// stored form (raw-256 input hex is lowercased).
pub fn normalize_secret(kind: KeyKind, secret: &SecretString) -> Result<SecretString, CoreError> {
    match kind {
        KeyKind::Passphrase => {
            if secret.expose_secret().chars().count() < MIN_PASSPHRASE_CHARS {
                return Err(CoreError::InvalidInput(
                    "passphrase secret must be at least 8 characters".to_string(),
                ));
            }
            Ok(secret.clone())
        }
        KeyKind::Raw256 => {
            let decoded = hex::decode(secret.expose_secret())
                .map_err(|_| CoreError::InvalidInput("raw key secret is not hex".to_string()))?;
            if decoded.len() != RAW256_LEN {
                return Err(CoreError::InvalidInput(
                    "raw key secret must be exactly 32 bytes".to_string(),
                ));
            }
            Ok(SecretString::new(hex::encode(decoded).into()))
        }
    }
}
