use ring::aead;
use thiserror::Error;

use super::kdf::KEY_LEN;

pub const NONCE_LEN: usize = 12; // 96-bit GCM nonce
pub const TAG_LEN: usize = 16;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CipherError {
    #[error("invalid key material")]
    InvalidKey,
    #[error("authentication failed")]
    AuthFailed,
}

/// AES-256-GCM seal. Returns ciphertext with the 16-byte tag appended.
/// The caller supplies a fresh random nonce per call.
pub fn seal(
    key: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CipherError> {
    let unbound =
        aead::UnboundKey::new(&aead::AES_256_GCM, key).map_err(|_| CipherError::InvalidKey)?;
    let sealing_key = aead::LessSafeKey::new(unbound);
    let nonce = aead::Nonce::assume_unique_for_key(*nonce);
    let mut in_out = plaintext.to_vec();
    in_out.reserve(TAG_LEN);
    sealing_key
        .seal_in_place_append_tag(nonce, aead::Aad::from(aad), &mut in_out)
        .map_err(|_| CipherError::InvalidKey)?;
    Ok(in_out)
}

/// AES-256-GCM open. ring performs the constant-time tag check; on
/// mismatch nothing of the partial plaintext is returned.
pub fn open(
    key: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    aad: &[u8],
    data: &[u8],
) -> Result<Vec<u8>, CipherError> {
    if data.len() < TAG_LEN {
        return Err(CipherError::AuthFailed);
    }
    let unbound =
        aead::UnboundKey::new(&aead::AES_256_GCM, key).map_err(|_| CipherError::InvalidKey)?;
    let opening_key = aead::LessSafeKey::new(unbound);
    let nonce = aead::Nonce::assume_unique_for_key(*nonce);
    let mut in_out = data.to_vec();
    let pt = opening_key
        .open_in_place(nonce, aead::Aad::from(aad), &mut in_out)
        .map_err(|_| CipherError::AuthFailed)?;
    Ok(pt.to_vec())
}
