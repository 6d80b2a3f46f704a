use std::sync::Arc;

use base64::engine::general_purpose;
use base64::Engine as _;
use secrecy::{ExposeSecret, SecretBox, SecretString};
use tracing::{debug, info, warn};
use zeroize::Zeroize;

use crate::config::app_config::CoreConfig;
use crate::cryptography::kdf::{derive_key, KdfParams, KEY_LEN, SALT_LEN};
use crate::cryptography::memlock::{lock_slice, unlock_slice};
use crate::cryptography::rng::{Rng, SystemRng};
use crate::error::CoreError;
use crate::message::crypto::{Decrypted, EncryptOptions, MessageCrypto};
use crate::message::envelope;
use crate::vault::container;
use crate::vault::models::{
    normalize_secret, now_unix, validate_name, KeyPatch, NewKey, StoredKey,
};
use crate::vault::payload::{PayloadCodec, RonCodec, VaultPayload};
use crate::vault::store::BlobStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultState {
    Locked,
    Unlocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    Replace,
    Merge,
}

/// Live unlocked state. The derived outer key and the decrypted key
/// list exist only here; dropping the session wipes both (secrecy
/// zeroizes its buffers on drop).
struct Session {
    key: SecretBox<Vec<u8>>,
    kdf: KdfParams,
    salt: [u8; SALT_LEN],
    keys: Vec<StoredKey>,
}

enum State {
    Locked,
    Unlocked(Session),
}

/// Master-password-protected store of named keys over an injected blob
/// store. Mutating operations re-seal and persist before committing to
/// memory, so a failed write leaves the pre-mutation vault intact.
pub struct VaultService {
    store: Arc<dyn BlobStore>,
    codec: Arc<dyn PayloadCodec>,
    rng: Arc<dyn Rng>,
    config: CoreConfig,
    state: State,
}

impl VaultService {
    pub fn new(
        store: Arc<dyn BlobStore>,
        codec: Arc<dyn PayloadCodec>,
        rng: Arc<dyn Rng>,
        config: CoreConfig,
    ) -> Self {
        Self {
            store,
            codec,
            rng,
            config,
            state: State::Locked,
        }
    }

    /// Default wiring: RON payload codec, system randomness, default
    /// configuration.
    pub fn with_defaults(store: Arc<dyn BlobStore>) -> Self {
        Self::new(
            store,
            Arc::new(RonCodec),
            Arc::new(SystemRng),
            CoreConfig::default(),
        )
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn state(&self) -> VaultState {
        match self.state {
            State::Locked => VaultState::Locked,
            State::Unlocked(_) => VaultState::Unlocked,
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.state() == VaultState::Unlocked
    }

    fn slot(&self) -> &str {
        &self.config.storage_slot
    }

    fn parts(
        &self,
    ) -> (
        Arc<dyn BlobStore>,
        Arc<dyn PayloadCodec>,
        Arc<dyn Rng>,
        String,
    ) {
        (
            Arc::clone(&self.store),
            Arc::clone(&self.codec),
            Arc::clone(&self.rng),
            self.config.storage_slot.clone(),
        )
    }

    /// Create an empty vault under `master` and unlock it. Refuses to
    /// clobber an existing vault unless `overwrite` is set.
    pub fn initialize_vault(&mut self, master: &str, overwrite: bool) -> Result<(), CoreError> {
        require_master(master)?;
        if !overwrite && self.store.get(self.slot())?.is_some() {
            return Err(CoreError::AlreadyExists);
        }
        let mut salt = [0u8; SALT_LEN];
        self.rng.fill(&mut salt)?;
        let kdf = self.config.kdf;
        let derived = derive_key(master, &salt, &kdf)?;
        let session = Session {
            key: SecretBox::new(Box::new(derived.to_vec())),
            kdf,
            salt,
            keys: Vec::new(),
        };
        persist(
            self.store.as_ref(),
            self.codec.as_ref(),
            self.rng.as_ref(),
            self.slot(),
            &session,
            &session.keys,
        )?;
        self.state = State::Unlocked(session);
        info!("vault initialized");
        Ok(())
    }

    /// Derive the candidate outer key and attempt to open the persisted
    /// container. Failure leaves the vault locked; wrong password and
    /// tampered container are indistinguishable.
    pub fn unlock(&mut self, master: &str) -> Result<(), CoreError> {
        let blob = self.store.get(self.slot())?.ok_or(CoreError::NoVault)?;
        let (header, _payload) = container::parse(&blob)?;
        let derived = derive_key(master, &header.salt, &header.kdf)
            .map_err(|_| CoreError::MalformedVault)?;

        let mut key_arr = [0u8; KEY_LEN];
        key_arr.copy_from_slice(&derived[..]);
        lock_slice(&mut key_arr);
        let opened = container::open(&blob, &key_arr);
        unlock_slice(&mut key_arr);
        key_arr.zeroize();

        let payload_bytes = match opened {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("vault unlock rejected");
                return Err(e.into());
            }
        };
        let payload = self.codec.decode(&payload_bytes)?;
        self.state = State::Unlocked(Session {
            key: SecretBox::new(Box::new(derived.to_vec())),
            kdf: header.kdf,
            salt: header.salt,
            keys: payload.keys,
        });
        info!("vault unlocked");
        Ok(())
    }

    /// Drop the derived key and the decrypted key list. Idempotent.
    pub fn lock(&mut self) {
        if self.is_unlocked() {
            info!("vault locked");
        }
        self.state = State::Locked;
    }

    pub fn get_all_keys(&self) -> Result<Vec<StoredKey>, CoreError> {
        match &self.state {
            State::Unlocked(session) => Ok(session.keys.clone()),
            State::Locked => Err(CoreError::VaultLocked),
        }
    }

    pub fn get_key(&self, id: &str) -> Result<Option<StoredKey>, CoreError> {
        match &self.state {
            State::Unlocked(session) => Ok(session.keys.iter().find(|k| k.id == id).cloned()),
            State::Locked => Err(CoreError::VaultLocked),
        }
    }

    pub fn add_key(&mut self, new: NewKey) -> Result<StoredKey, CoreError> {
        let name = validate_name(&new.name)?;
        let secret = normalize_secret(new.kind, &new.secret)?;
        let (store, codec, rng, slot) = self.parts();
        let session = match &mut self.state {
            State::Unlocked(s) => s,
            State::Locked => return Err(CoreError::VaultLocked),
        };
        let id = fresh_id(rng.as_ref(), &session.keys)?;
        let key = StoredKey {
            id,
            name,
            kind: new.kind,
            secret,
            created_at: now_unix(),
            last_used_at: None,
        };
        let mut next = session.keys.clone();
        next.push(key.clone());
        persist(store.as_ref(), codec.as_ref(), rng.as_ref(), &slot, session, &next)?;
        session.keys = next;
        debug!(count = session.keys.len(), "key added");
        Ok(key)
    }

    pub fn update_key(&mut self, id: &str, patch: KeyPatch) -> Result<StoredKey, CoreError> {
        let (store, codec, rng, slot) = self.parts();
        let session = match &mut self.state {
            State::Unlocked(s) => s,
            State::Locked => return Err(CoreError::VaultLocked),
        };
        let idx = session
            .keys
            .iter()
            .position(|k| k.id == id)
            .ok_or(CoreError::NotFound)?;
        let mut next = session.keys.clone();
        {
            let entry = &mut next[idx];
            if let Some(name) = &patch.name {
                entry.name = validate_name(name)?;
            }
            if let Some(secret) = &patch.secret {
                entry.secret = normalize_secret(entry.kind, secret)?;
            }
            if let Some(ts) = patch.last_used_at {
                entry.last_used_at = Some(ts);
            }
        }
        persist(store.as_ref(), codec.as_ref(), rng.as_ref(), &slot, session, &next)?;
        session.keys = next;
        Ok(session.keys[idx].clone())
    }

    pub fn delete_key(&mut self, id: &str) -> Result<(), CoreError> {
        let (store, codec, rng, slot) = self.parts();
        let session = match &mut self.state {
            State::Unlocked(s) => s,
            State::Locked => return Err(CoreError::VaultLocked),
        };
        let idx = session
            .keys
            .iter()
            .position(|k| k.id == id)
            .ok_or(CoreError::NotFound)?;
        let mut next = session.keys.clone();
        next.remove(idx);
        persist(store.as_ref(), codec.as_ref(), rng.as_ref(), &slot, session, &next)?;
        session.keys = next;
        Ok(())
    }

    /// Re-derive the outer key from `new_master` with a fresh salt and
    /// nonce, re-seal and persist. Keys are preserved.
    pub fn change_master_password(
        &mut self,
        old_master: &str,
        new_master: &str,
    ) -> Result<(), CoreError> {
        require_master(new_master)?;
        let (store, codec, rng, slot) = self.parts();
        let kdf = self.config.kdf;
        let session = match &mut self.state {
            State::Unlocked(s) => s,
            State::Locked => return Err(CoreError::VaultLocked),
        };
        let old_key = derive_key(old_master, &session.salt, &session.kdf)
            .map_err(|_| CoreError::InvalidMasterPassword)?;
        if ring::constant_time::verify_slices_are_equal(
            &old_key[..],
            &session.key.expose_secret()[..],
        )
        .is_err()
        {
            return Err(CoreError::InvalidMasterPassword);
        }

        let mut salt = [0u8; SALT_LEN];
        rng.fill(&mut salt)?;
        let derived = derive_key(new_master, &salt, &kdf)?;
        let next = Session {
            key: SecretBox::new(Box::new(derived.to_vec())),
            kdf,
            salt,
            keys: session.keys.clone(),
        };
        persist(store.as_ref(), codec.as_ref(), rng.as_ref(), &slot, &next, &next.keys)?;
        *session = next;
        info!("master password changed; outer salt rotated");
        Ok(())
    }

    /// The persisted container verbatim, Base64-encoded. Works in any
    /// state; the blob is already encrypted at rest.
    pub fn export_vault(&self) -> Result<String, CoreError> {
        let blob = self.store.get(self.slot())?.ok_or(CoreError::NoVault)?;
        Ok(general_purpose::STANDARD.encode(blob))
    }

    pub fn import_vault(
        &mut self,
        blob: &str,
        master: &str,
        mode: ImportMode,
    ) -> Result<(), CoreError> {
        if mode == ImportMode::Merge && !self.is_unlocked() {
            return Err(CoreError::VaultLocked);
        }
        let bytes = envelope::from_transport(blob).map_err(|_| CoreError::MalformedVault)?;
        let (header, _payload) = container::parse(&bytes)?;
        let derived = derive_key(master, &header.salt, &header.kdf)
            .map_err(|_| CoreError::MalformedVault)?;

        let mut key_arr = [0u8; KEY_LEN];
        key_arr.copy_from_slice(&derived[..]);
        lock_slice(&mut key_arr);
        let opened = container::open(&bytes, &key_arr);
        unlock_slice(&mut key_arr);
        key_arr.zeroize();
        let payload_bytes = opened?;
        let imported = self.codec.decode(&payload_bytes)?;

        match mode {
            ImportMode::Replace => {
                self.store.put(self.slot(), &bytes).map_err(CoreError::from)?;
                self.state = State::Unlocked(Session {
                    key: SecretBox::new(Box::new(derived.to_vec())),
                    kdf: header.kdf,
                    salt: header.salt,
                    keys: imported.keys,
                });
                info!("vault imported (replace)");
            }
            ImportMode::Merge => {
                let (store, codec, rng, slot) = self.parts();
                let session = match &mut self.state {
                    State::Unlocked(s) => s,
                    State::Locked => return Err(CoreError::VaultLocked),
                };
                let added = imported.keys.len();
                let mut next = session.keys.clone();
                for mut key in imported.keys {
                    key.id = fresh_id(rng.as_ref(), &next)?;
                    if next.iter().any(|k| k.name == key.name) {
                        key.name.push_str(" (imported)");
                    }
                    next.push(key);
                }
                persist(store.as_ref(), codec.as_ref(), rng.as_ref(), &slot, session, &next)?;
                session.keys = next;
                info!(added, "vault imported (merge)");
            }
        }
        Ok(())
    }

    /// Delete the persisted blob and lock.
    pub fn clear_vault(&mut self) -> Result<(), CoreError> {
        self.state = State::Locked;
        self.store.remove(self.slot())?;
        info!("vault cleared");
        Ok(())
    }

    /// SHA-256 of the persisted container header (nonce excluded), or
    /// None when no vault exists. Safe to show without unlocking.
    pub fn fingerprint(&self) -> Result<Option<String>, CoreError> {
        match self.store.get(self.slot())? {
            None => Ok(None),
            Some(blob) => Ok(Some(container::fingerprint(&blob)?)),
        }
    }

    /// Encrypt a message using a stored key's secret as the password.
    /// Stamps the key's `last_used_at` and re-persists first.
    pub fn encrypt_with_stored_key(
        &mut self,
        id: &str,
        plaintext: &str,
        options: &EncryptOptions,
    ) -> Result<String, CoreError> {
        let secret = self.touch_key(id)?;
        let crypto = MessageCrypto::new(
            self.config.kdf,
            self.config.pad_block,
            Arc::clone(&self.rng),
        );
        crypto.encrypt(plaintext, secret.expose_secret(), options)
    }

    /// Decrypt a message using a stored key's secret as the password.
    pub fn decrypt_with_stored_key(
        &mut self,
        id: &str,
        blob: &str,
    ) -> Result<Decrypted, CoreError> {
        let secret = self.touch_key(id)?;
        let crypto = MessageCrypto::new(
            self.config.kdf,
            self.config.pad_block,
            Arc::clone(&self.rng),
        );
        crypto.decrypt(blob, secret.expose_secret())
    }

    fn touch_key(&mut self, id: &str) -> Result<SecretString, CoreError> {
        let (store, codec, rng, slot) = self.parts();
        let session = match &mut self.state {
            State::Unlocked(s) => s,
            State::Locked => return Err(CoreError::VaultLocked),
        };
        let idx = session
            .keys
            .iter()
            .position(|k| k.id == id)
            .ok_or(CoreError::NotFound)?;
        let mut next = session.keys.clone();
        next[idx].last_used_at = Some(now_unix());
        persist(store.as_ref(), codec.as_ref(), rng.as_ref(), &slot, session, &next)?;
        session.keys = next;
        Ok(session.keys[idx].secret.clone())
    }
}

fn require_master(master: &str) -> Result<(), CoreError> {
    if master.is_empty() {
        return Err(CoreError::InvalidInput(
            "master password must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn fresh_id(rng: &dyn Rng, existing: &[StoredKey]) -> Result<String, CoreError> {
    loop {
        let mut raw = [0u8; 8];
        rng.fill(&mut raw)?;
        let id = hex::encode(raw);
        if !existing.iter().any(|k| k.id == id) {
            return Ok(id);
        }
    }
}

/// Seal `keys` under the session's outer key (fresh nonce) and write to
/// the store. Does not touch in-memory state; callers commit only after
/// this returns Ok, which keeps failed mutations invisible.
fn persist(
    store: &dyn BlobStore,
    codec: &dyn PayloadCodec,
    rng: &dyn Rng,
    slot: &str,
    session: &Session,
    keys: &[StoredKey],
) -> Result<(), CoreError> {
    let payload = codec
        .encode(&VaultPayload { keys: keys.to_vec() })
        .map_err(|e| CoreError::PersistenceUnavailable(format!("payload encode: {e}")))?;

    let mut key_arr = [0u8; KEY_LEN];
    key_arr.copy_from_slice(&session.key.expose_secret()[..KEY_LEN]);
    lock_slice(&mut key_arr);
    let sealed = container::seal(rng, &session.kdf, &session.salt, &key_arr, &payload);
    unlock_slice(&mut key_arr);
    key_arr.zeroize();

    let blob = sealed?;
    match store.put(slot, &blob) {
        Ok(()) => Ok(()),
        Err(e) => {
            warn!(error = %e, "vault persistence failed; mutation aborted");
            Err(e.into())
        }
    }
}
