use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::cryptography::cipher::{self, CipherError, NONCE_LEN};
use crate::cryptography::kdf::{KdfParams, KDF_ARGON2ID13, KEY_LEN, SALT_LEN};
use crate::cryptography::rng::Rng;

// Container layout (little-endian):
// magic: 4 bytes = b"ECV1"
// alg_id: u8 (2 = Argon2id v1.3)
// opslimit: u32
// memlimit: u64 (bytes)
// salt: [u8; 16]
// nonce: [u8; 12]
// payload_len: u32
// payload: AEAD output (ciphertext || tag) of the serialized key list
//
// The AAD for the outer seal is the whole 45-byte prefix up to and
// including the nonce, so cost parameters and salt are tamper-bound.
pub const MAGIC: &[u8; 4] = b"ECV1";
const FIXED_LEN: usize = 4 + 1 + 4 + 8;
const AAD_LEN: usize = FIXED_LEN + SALT_LEN + NONCE_LEN;
const MIN_LEN: usize = AAD_LEN + 4;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContainerError {
    #[error("container too short")]
    TooShort,
    #[error("invalid magic (expected ECV1)")]
    InvalidMagic,
    #[error("unsupported kdf id: {0}")]
    UnsupportedKdf(u8),
    #[error("declared payload length does not match container size")]
    LengthMismatch,
    #[error("authentication failed")]
    AuthFailed,
    #[error("randomness unavailable")]
    Random,
}

#[derive(Debug, Clone)]
pub struct ContainerHeader {
    pub kdf: KdfParams,
    pub salt: [u8; SALT_LEN],
    pub nonce: [u8; NONCE_LEN],
}

fn build_prefix(kdf: &KdfParams, salt: &[u8; SALT_LEN], nonce: &[u8; NONCE_LEN]) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(AAD_LEN);
    prefix.extend_from_slice(MAGIC);
    prefix.push(kdf.alg_id);
    prefix.extend_from_slice(&kdf.opslimit.to_le_bytes());
    prefix.extend_from_slice(&kdf.memlimit.to_le_bytes());
    prefix.extend_from_slice(salt);
    prefix.extend_from_slice(nonce);
    prefix
}

/// Seal `payload` under `key` with a fresh random nonce, producing the
/// full at-rest container bytes.
pub fn seal(
    rng: &dyn Rng,
    kdf: &KdfParams,
    salt: &[u8; SALT_LEN],
    key: &[u8; KEY_LEN],
    payload: &[u8],
) -> Result<Vec<u8>, ContainerError> {
    let mut nonce = [0u8; NONCE_LEN];
    rng.fill(&mut nonce).map_err(|_| ContainerError::Random)?;

    let prefix = build_prefix(kdf, salt, &nonce);
    let sealed = cipher::seal(key, &nonce, &prefix, payload).map_err(map_cipher)?;
    let len = u32::try_from(sealed.len()).map_err(|_| ContainerError::LengthMismatch)?;

    let mut out = prefix;
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Structural parse: header fields plus the sealed payload slice.
/// No crypto; never panics on arbitrary input.
pub fn parse(bytes: &[u8]) -> Result<(ContainerHeader, &[u8]), ContainerError> {
    if bytes.len() < MIN_LEN {
        return Err(ContainerError::TooShort);
    }
    if &bytes[..4] != MAGIC {
        return Err(ContainerError::InvalidMagic);
    }
    let alg_id = bytes[4];
    if alg_id != KDF_ARGON2ID13 {
        return Err(ContainerError::UnsupportedKdf(alg_id));
    }
    let kdf = KdfParams {
        alg_id,
        opslimit: u32::from_le_bytes(bytes[5..9].try_into().unwrap()),
        memlimit: u64::from_le_bytes(bytes[9..17].try_into().unwrap()),
    };
    let mut salt = [0u8; SALT_LEN];
    salt.copy_from_slice(&bytes[FIXED_LEN..FIXED_LEN + SALT_LEN]);
    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&bytes[FIXED_LEN + SALT_LEN..AAD_LEN]);
    let payload_len =
        u32::from_le_bytes(bytes[AAD_LEN..AAD_LEN + 4].try_into().unwrap()) as usize;
    let payload = &bytes[MIN_LEN..];
    if payload.len() != payload_len {
        return Err(ContainerError::LengthMismatch);
    }
    Ok((ContainerHeader { kdf, salt, nonce }, payload))
}

/// Open the sealed payload with an already-derived outer key.
pub fn open(bytes: &[u8], key: &[u8; KEY_LEN]) -> Result<Vec<u8>, ContainerError> {
    let (header, payload) = parse(bytes)?;
    cipher::open(key, &header.nonce, &bytes[..AAD_LEN], payload).map_err(map_cipher)
}

/// SHA-256 over the header fields excluding the nonce. Stable across
/// re-seals of the same vault; lets hosts display or compare vault
/// identity without decrypting.
pub fn fingerprint(bytes: &[u8]) -> Result<String, ContainerError> {
    let (header, _payload) = parse(bytes)?;
    let mut hasher = Sha256::new();
    hasher.update(MAGIC);
    hasher.update([header.kdf.alg_id]);
    hasher.update(header.kdf.opslimit.to_le_bytes());
    hasher.update(header.kdf.memlimit.to_le_bytes());
    hasher.update(header.salt);
    Ok(hex::encode(hasher.finalize()))
}

fn map_cipher(e: CipherError) -> ContainerError {
    match e {
        CipherError::AuthFailed | CipherError::InvalidKey => ContainerError::AuthFailed,
    }
}
