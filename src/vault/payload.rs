use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::vault::models::StoredKey;

/// The document sealed inside the outer container.
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct VaultPayload {
    pub keys: Vec<StoredKey>,
}

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload is not valid UTF-8 text")]
    NotText,
    #[error("failed to parse payload: {0}")]
    Parse(String),
    #[error("failed to serialize payload: {0}")]
    Serialize(String),
}

pub trait PayloadCodec: Send + Sync {
    fn encode(&self, payload: &VaultPayload) -> Result<Vec<u8>, PayloadError>;
    fn decode(&self, data: &[u8]) -> Result<VaultPayload, PayloadError>;
}

/// Canonical UTF-8 text codec. Derive serialization follows struct
/// declaration order, which is the deterministic field order.
pub struct RonCodec;

impl PayloadCodec for RonCodec {
    fn encode(&self, payload: &VaultPayload) -> Result<Vec<u8>, PayloadError> {
        let pretty = PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true);
        let s = ron::ser::to_string_pretty(payload, pretty)
            .map_err(|e| PayloadError::Serialize(e.to_string()))?;
        Ok(s.into_bytes())
    }

    fn decode(&self, data: &[u8]) -> Result<VaultPayload, PayloadError> {
        let s = String::from_utf8(data.to_vec()).map_err(|_| PayloadError::NotText)?;
        ron::from_str(&s).map_err(|e| PayloadError::Parse(e.to_string()))
    }
}
