use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::spawn_blocking;
use tracing::info;

use crate::error::CoreError;
use crate::message::crypto::{Decrypted, EncryptOptions};
use crate::vault::models::{KeyPatch, NewKey, StoredKey};
use crate::vault::service::{ImportMode, VaultService, VaultState};
use crate::vault::store::BlobStore;

/// Async facade over `VaultService`. Argon2id is the only blocking
/// step, so every operation runs the sync core on a blocking thread;
/// overlapping calls queue in lock order, which serializes mutations
/// and lets reads observe the last completed mutation. The `try_`
/// variants reject contention with `Busy` instead of queueing.
pub struct VaultHandle {
    inner: Arc<Mutex<VaultService>>,
    auto_lock: Option<Duration>,
    last_activity: StdMutex<Instant>,
}

impl VaultHandle {
    pub fn new(service: VaultService) -> Self {
        let auto_lock = service.config().auto_lock_secs.map(Duration::from_secs);
        Self {
            inner: Arc::new(Mutex::new(service)),
            auto_lock,
            last_activity: StdMutex::new(Instant::now()),
        }
    }

    pub fn with_defaults(store: Arc<dyn BlobStore>) -> Self {
        Self::new(VaultService::with_defaults(store))
    }

    async fn run<T, F>(&self, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(&mut VaultService) -> Result<T, CoreError> + Send + 'static,
        T: Send + 'static,
    {
        let guard = Arc::clone(&self.inner).lock_owned().await;
        self.finish(guard, f).await
    }

    async fn try_run<T, F>(&self, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(&mut VaultService) -> Result<T, CoreError> + Send + 'static,
        T: Send + 'static,
    {
        let guard = Arc::clone(&self.inner)
            .try_lock_owned()
            .map_err(|_| CoreError::Busy)?;
        self.finish(guard, f).await
    }

    async fn finish<T, F>(
        &self,
        mut guard: OwnedMutexGuard<VaultService>,
        f: F,
    ) -> Result<T, CoreError>
    where
        F: FnOnce(&mut VaultService) -> Result<T, CoreError> + Send + 'static,
        T: Send + 'static,
    {
        self.apply_idle_policy(&mut guard);
        // A cancelled or panicked blocking task leaves the vault state
        // unchanged for the caller's purposes; report Cancelled.
        let result = spawn_blocking(move || f(&mut guard))
            .await
            .map_err(|_| CoreError::Cancelled)?;
        let mut last = self
            .last_activity
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *last = Instant::now();
        result
    }

    fn apply_idle_policy(&self, service: &mut VaultService) {
        let Some(limit) = self.auto_lock else {
            return;
        };
        let last = *self
            .last_activity
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if last.elapsed() >= limit && service.is_unlocked() {
            info!("idle limit exceeded; locking vault");
            service.lock();
        }
    }

    pub async fn state(&self) -> VaultState {
        self.inner.lock().await.state()
    }

    pub async fn initialize_vault(
        &self,
        master: String,
        overwrite: bool,
    ) -> Result<(), CoreError> {
        self.run(move |svc| svc.initialize_vault(&master, overwrite))
            .await
    }

    pub async fn unlock(&self, master: String) -> Result<(), CoreError> {
        self.run(move |svc| svc.unlock(&master)).await
    }

    pub async fn lock(&self) -> Result<(), CoreError> {
        self.run(move |svc| {
            svc.lock();
            Ok(())
        })
        .await
    }

    pub async fn add_key(&self, new: NewKey) -> Result<StoredKey, CoreError> {
        self.run(move |svc| svc.add_key(new)).await
    }

    pub async fn try_add_key(&self, new: NewKey) -> Result<StoredKey, CoreError> {
        self.try_run(move |svc| svc.add_key(new)).await
    }

    pub async fn get_all_keys(&self) -> Result<Vec<StoredKey>, CoreError> {
        self.run(move |svc| svc.get_all_keys()).await
    }

    pub async fn get_key(&self, id: String) -> Result<Option<StoredKey>, CoreError> {
        self.run(move |svc| svc.get_key(&id)).await
    }

    pub async fn update_key(&self, id: String, patch: KeyPatch) -> Result<StoredKey, CoreError> {
        self.run(move |svc| svc.update_key(&id, patch)).await
    }

    pub async fn try_update_key(
        &self,
        id: String,
        patch: KeyPatch,
    ) -> Result<StoredKey, CoreError> {
        self.try_run(move |svc| svc.update_key(&id, patch)).await
    }

    pub async fn delete_key(&self, id: String) -> Result<(), CoreError> {
        self.run(move |svc| svc.delete_key(&id)).await
    }

    pub async fn try_delete_key(&self, id: String) -> Result<(), CoreError> {
        self.try_run(move |svc| svc.delete_key(&id)).await
    }

    pub async fn change_master_password(
        &self,
        old_master: String,
        new_master: String,
    ) -> Result<(), CoreError> {
        self.run(move |svc| svc.change_master_password(&old_master, &new_master))
            .await
    }

    pub async fn export_vault(&self) -> Result<String, CoreError> {
        self.run(move |svc| svc.export_vault()).await
    }

    pub async fn import_vault(
        &self,
        blob: String,
        master: String,
        mode: ImportMode,
    ) -> Result<(), CoreError> {
        self.run(move |svc| svc.import_vault(&blob, &master, mode))
            .await
    }

    pub async fn clear_vault(&self) -> Result<(), CoreError> {
        self.run(move |svc| svc.clear_vault()).await
    }

    pub async fn fingerprint(&self) -> Result<Option<String>, CoreError> {
        self.run(move |svc| svc.fingerprint()).await
    }

    pub async fn encrypt_with_stored_key(
        &self,
        id: String,
        plaintext: String,
        options: EncryptOptions,
    ) -> Result<String, CoreError> {
        self.run(move |svc| svc.encrypt_with_stored_key(&id, &plaintext, &options))
            .await
    }

    pub async fn decrypt_with_stored_key(
        &self,
        id: String,
        blob: String,
    ) -> Result<Decrypted, CoreError> {
        self.run(move |svc| svc.decrypt_with_stored_key(&id, &blob))
            .await
    }
}
