use argon2::{Algorithm, Argon2, Params, Version};
use thiserror::Error;
use zeroize::Zeroizing;

pub const KEY_LEN: usize = 32; // 256-bit key
pub const SALT_LEN: usize = 16; // Argon2 salt

/// Registered KDF algorithm id carried in ciphertext and vault headers.
/// 2 = Argon2id v1.3; other values unsupported.
pub const KDF_ARGON2ID13: u8 = 2;

/// libsodium "moderate" preset: 3 passes over 256 MiB. New ciphertexts
/// and vaults use these unless the caller overrides explicitly.
pub const DEFAULT_OPSLIMIT: u32 = 3;
pub const DEFAULT_MEMLIMIT: u64 = 256 * 1024 * 1024;

/// Derivation below 8 MiB is refused outright.
pub const MIN_MEMLIMIT: u64 = 8 * 1024 * 1024;
/// Ceiling applied to params read from untrusted blobs; bounds the
/// allocation a hostile header can demand.
pub const MAX_MEMLIMIT: u64 = 4 * 1024 * 1024 * 1024;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KdfError {
    #[error("invalid kdf parameters: {0}")]
    InvalidParams(&'static str),
}

/// Cost parameters as they appear on the wire: memlimit is in bytes
/// (libsodium convention); lanes are fixed at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    pub alg_id: u8,
    pub opslimit: u32,
    pub memlimit: u64,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            alg_id: KDF_ARGON2ID13,
            opslimit: DEFAULT_OPSLIMIT,
            memlimit: DEFAULT_MEMLIMIT,
        }
    }
}

impl KdfParams {
    /// Explicit caller override; validated on construction.
    pub fn new(opslimit: u32, memlimit: u64) -> Result<Self, KdfError> {
        let params = Self {
            alg_id: KDF_ARGON2ID13,
            opslimit,
            memlimit,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), KdfError> {
        if self.alg_id != KDF_ARGON2ID13 {
            return Err(KdfError::InvalidParams("unknown kdf algorithm id"));
        }
        if self.opslimit < 1 {
            return Err(KdfError::InvalidParams("opslimit must be at least 1"));
        }
        if self.memlimit < MIN_MEMLIMIT {
            return Err(KdfError::InvalidParams("memlimit below 8 MiB"));
        }
        if self.memlimit > MAX_MEMLIMIT {
            return Err(KdfError::InvalidParams("memlimit above 4 GiB"));
        }
        Ok(())
    }

    fn m_cost_kib(&self) -> u32 {
        // memlimit validated <= 4 GiB, so the KiB count fits u32.
        (self.memlimit / 1024) as u32
    }
}

/// Derive a 32-byte AES-256 key from (password, salt, params) with
/// Argon2id v1.3. Deterministic; the only failure mode is bad params.
pub fn derive_key(
    password: &str,
    salt: &[u8],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; KEY_LEN]>, KdfError> {
    params.validate()?;
    if salt.len() != SALT_LEN {
        return Err(KdfError::InvalidParams("salt must be 16 bytes"));
    }
    let argon_params = Params::new(params.m_cost_kib(), params.opslimit, 1, Some(KEY_LEN))
        .map_err(|_| KdfError::InvalidParams("argon2 rejected cost parameters"))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut *key)
        .map_err(|_| KdfError::InvalidParams("argon2 rejected derivation inputs"))?;
    Ok(key)
}
