use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cryptography::kdf::{KdfError, KdfParams, DEFAULT_MEMLIMIT, DEFAULT_OPSLIMIT};
use crate::message::envelope::{DEFAULT_PAD_BLOCK, PAD_DECODE_LIMIT};

pub const DEFAULT_STORAGE_SLOT: &str = "encyphrix.vault.v1";
pub const PAD_BLOCK_MIN: u16 = 16;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    InvalidKdf(#[from] KdfError),
    #[error("pad block must be between 16 and 4096 bytes")]
    InvalidPadBlock,
    #[error("storage slot name must not be empty")]
    InvalidStorageSlot,
}

/// Raw config.toml shape; every field optional.
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct FileConfig {
    pub opslimit: Option<u32>,
    pub memlimit_mib: Option<u64>,
    pub pad_block: Option<u16>,
    pub storage_slot: Option<String>,
    pub auto_lock_secs: Option<u64>,
}

/// Resolved core configuration. `auto_lock_secs = None` means never
/// (lock only on explicit request).
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub kdf: KdfParams,
    pub pad_block: u16,
    pub storage_slot: String,
    pub auto_lock_secs: Option<u64>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            kdf: KdfParams::default(),
            pad_block: DEFAULT_PAD_BLOCK,
            storage_slot: DEFAULT_STORAGE_SLOT.to_string(),
            auto_lock_secs: None,
        }
    }
}

impl CoreConfig {
    /// Resolve with precedence env > config file > default.
    pub fn create() -> Result<Self, ConfigError> {
        let file_cfg = load_file_config();

        // 1) KDF cost override (opslimit / memlimit in MiB)
        let opslimit = env_parse::<u32>("ENCYPHRIX_OPSLIMIT").or(file_cfg.opslimit);
        let memlimit_mib = env_parse::<u64>("ENCYPHRIX_MEMLIMIT_MIB").or(file_cfg.memlimit_mib);
        let kdf = if opslimit.is_none() && memlimit_mib.is_none() {
            KdfParams::default()
        } else {
            KdfParams::new(
                opslimit.unwrap_or(DEFAULT_OPSLIMIT),
                memlimit_mib
                    .map(|m| m.saturating_mul(1024 * 1024))
                    .unwrap_or(DEFAULT_MEMLIMIT),
            )?
        };

        // 2) Stealth pad block size
        let pad_block = env_parse::<u16>("ENCYPHRIX_PAD_BLOCK")
            .or(file_cfg.pad_block)
            .unwrap_or(DEFAULT_PAD_BLOCK);
        if !(PAD_BLOCK_MIN..=PAD_DECODE_LIMIT).contains(&pad_block) {
            return Err(ConfigError::InvalidPadBlock);
        }

        // 3) Storage slot name
        let storage_slot = env::var("ENCYPHRIX_STORAGE_SLOT")
            .ok()
            .or(file_cfg.storage_slot)
            .unwrap_or_else(|| DEFAULT_STORAGE_SLOT.to_string());
        if storage_slot.trim().is_empty() {
            return Err(ConfigError::InvalidStorageSlot);
        }

        // 4) Idle auto-lock; 0 disables, same as unset
        let auto_lock_secs = env_parse::<u64>("ENCYPHRIX_AUTO_LOCK_SECS")
            .or(file_cfg.auto_lock_secs)
            .filter(|s| *s > 0);

        Ok(CoreConfig {
            kdf,
            pad_block,
            storage_slot,
            auto_lock_secs,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse::<T>().ok())
}

fn load_file_config() -> FileConfig {
    let (_, cfg) = load_file_config_with_path();
    cfg
}

pub fn load_file_config_with_path() -> (PathBuf, FileConfig) {
    // Allow tests/users to override config dir via ENCYPHRIX_CONFIG_DIR;
    // else use the platform default
    let cfg_dir = if let Ok(p) = env::var("ENCYPHRIX_CONFIG_DIR") {
        PathBuf::from(p)
    } else {
        dirs::config_dir().unwrap_or_else(|| PathBuf::from("."))
    };
    let path = cfg_dir.join("encyphrix").join("config.toml");
    let cfg = if let Ok(bytes) = std::fs::read(&path) {
        if let Ok(s) = String::from_utf8(bytes) {
            toml::from_str::<FileConfig>(&s).unwrap_or_default()
        } else {
            FileConfig::default()
        }
    } else {
        FileConfig::default()
    };
    (path, cfg)
}

pub fn save_file_config(path: &PathBuf, cfg: &FileConfig) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let s = toml::to_string_pretty(cfg)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    std::fs::write(path, s)
}
