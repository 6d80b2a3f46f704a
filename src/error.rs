use thiserror::Error;

use crate::cryptography::kdf::KdfError;
use crate::cryptography::rng::RngError;
use crate::message::envelope::EnvelopeError;
use crate::vault::container::ContainerError;
use crate::vault::payload::PayloadError;
use crate::vault::store::StoreError;

/// Public error taxonomy. Every operation in the crate resolves to one of
/// these kinds; the per-module enums below convert into it at the API
/// boundary. Error text never carries secret material.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("malformed ciphertext")]
    MalformedCiphertext,
    #[error("malformed vault container")]
    MalformedVault,
    #[error("unsupported format version: {0}")]
    UnsupportedVersion(u8),
    #[error("decryption failed")]
    DecryptFailed,
    #[error("invalid master password")]
    InvalidMasterPassword,
    #[error("vault is locked")]
    VaultLocked,
    #[error("no vault is persisted")]
    NoVault,
    #[error("key not found")]
    NotFound,
    #[error("a vault already exists")]
    AlreadyExists,
    #[error("persistent store is full")]
    PersistenceFull,
    #[error("persistent store unavailable: {0}")]
    PersistenceUnavailable(String),
    #[error("another vault operation is in progress")]
    Busy,
    #[error("operation cancelled")]
    Cancelled,
    #[error("system randomness unavailable")]
    RandomUnavailable,
}

impl From<KdfError> for CoreError {
    fn from(e: KdfError) -> Self {
        CoreError::InvalidInput(e.to_string())
    }
}

impl From<RngError> for CoreError {
    fn from(_: RngError) -> Self {
        CoreError::RandomUnavailable
    }
}

impl From<EnvelopeError> for CoreError {
    fn from(e: EnvelopeError) -> Self {
        match e {
            EnvelopeError::MalformedHeader | EnvelopeError::TruncatedBody => {
                CoreError::MalformedCiphertext
            }
            EnvelopeError::UnsupportedVersion(v) => CoreError::UnsupportedVersion(v),
            EnvelopeError::DecryptFailed => CoreError::DecryptFailed,
            EnvelopeError::DuressEqualsPrimary => CoreError::InvalidInput(
                "duress password must differ from the primary password".to_string(),
            ),
            EnvelopeError::Kdf(k) => CoreError::InvalidInput(k.to_string()),
            EnvelopeError::Oversize => {
                CoreError::InvalidInput("payload too large to seal".to_string())
            }
            EnvelopeError::Random => CoreError::RandomUnavailable,
        }
    }
}

impl From<ContainerError> for CoreError {
    fn from(e: ContainerError) -> Self {
        match e {
            ContainerError::TooShort
            | ContainerError::InvalidMagic
            | ContainerError::UnsupportedKdf(_)
            | ContainerError::LengthMismatch => CoreError::MalformedVault,
            ContainerError::AuthFailed => CoreError::InvalidMasterPassword,
            ContainerError::Random => CoreError::RandomUnavailable,
        }
    }
}

impl From<PayloadError> for CoreError {
    fn from(_: PayloadError) -> Self {
        CoreError::MalformedVault
    }
}

impl From<StoreError> for CoreError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::QuotaExceeded => CoreError::PersistenceFull,
            StoreError::Unavailable(s) => CoreError::PersistenceUnavailable(s),
        }
    }
}
