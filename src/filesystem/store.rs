use std::env;
use std::fs::{self, File};
use std::io::{Read, Write};
#[cfg(target_family = "unix")]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::vault::store::{BlobStore, StoreError};

/// Blob store backed by one file per slot under a base directory, for
/// hosts with a real filesystem. Writes are atomic (tmp + rename) with
/// 0700 directory / 0600 file permissions on Unix.
pub struct FileBlobStore {
    base: PathBuf,
}

impl FileBlobStore {
    pub fn new(base: PathBuf) -> Self {
        Self { base }
    }

    /// Prefer ENCYPHRIX_DATA_DIR, then the platform data dir, then
    /// ~/.encyphrix.
    pub fn default_base() -> PathBuf {
        if let Ok(base) = env::var("ENCYPHRIX_DATA_DIR") {
            return PathBuf::from(base).join("encyphrix");
        }
        if let Some(mut p) = dirs::data_dir() {
            p.push("encyphrix");
            return p;
        }
        let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(&home).join(".encyphrix")
    }

    fn path_for(&self, name: &str) -> PathBuf {
        // Slot names become file names; path separators are not allowed
        // to escape the base directory.
        let safe: String = name
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        self.base.join(safe)
    }
}

fn io_err(e: std::io::Error) -> StoreError {
    // ENOSPC maps onto the quota kind so callers see PersistenceFull.
    if e.raw_os_error() == Some(28) {
        StoreError::QuotaExceeded
    } else {
        StoreError::Unavailable(e.to_string())
    }
}

/// Ensure the base directory exists with restrictive permissions on Unix.
fn ensure_base_secure(dir: &Path) -> Result<(), StoreError> {
    fs::create_dir_all(dir).map_err(io_err)?;
    #[cfg(target_family = "unix")]
    {
        let perm = fs::Permissions::from_mode(0o700);
        let _ = fs::set_permissions(dir, perm);
    }
    Ok(())
}

/// Atomically write `bytes` to `path` with secure permissions (0600 on Unix).
fn atomic_write_secure(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp_path: PathBuf = path.with_extension("tmp");
    {
        let mut tmp = File::create(&tmp_path).map_err(io_err)?;
        tmp.write_all(bytes).map_err(io_err)?;
        let _ = tmp.sync_data();
    }

    #[cfg(target_family = "unix")]
    {
        let perm = fs::Permissions::from_mode(0o600);
        let _ = fs::set_permissions(&tmp_path, perm);
    }

    fs::rename(&tmp_path, path).map_err(io_err)
}

impl BlobStore for FileBlobStore {
    fn get(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_for(name);
        if !path.exists() {
            return Ok(None);
        }
        let mut f = File::open(&path).map_err(io_err)?;
        let mut buf = Vec::new();
        f.read_to_end(&mut buf).map_err(io_err)?;
        Ok(Some(buf))
    }

    fn put(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        ensure_base_secure(&self.base)?;
        atomic_write_secure(&self.path_for(name), bytes)
    }

    fn remove(&self, name: &str) -> Result<(), StoreError> {
        let path = self.path_for(name);
        if path.exists() {
            fs::remove_file(&path).map_err(io_err)?;
        }
        Ok(())
    }
}
