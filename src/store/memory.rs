//! In-memory implementations of the store and lock seams.
//!
//! `MemoryProfileStore` backs the single-process deployment and the test
//! suite. Lock poisoning is surfaced as
//! [`VaultError::StoreUnavailable`] rather than a panic.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::{
    error::VaultError,
    types::{IdentityToken, KdfSalt, ProfileRecord, VerifierString, NONCE_SIZE},
    VaultResult,
};

use super::{IdentityLockManager, ProfileStore};

/// Thread-safe profile store backed by a `HashMap`.
pub struct MemoryProfileStore {
    /// Records keyed by identity token.
    records: RwLock<HashMap<IdentityToken, ProfileRecord>>,
}

impl MemoryProfileStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the number of stored records.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::StoreUnavailable`] if the lock is poisoned.
    pub fn len(&self) -> VaultResult<usize> {
        Ok(self.read_guard()?.len())
    }

    /// Returns `true` if no records are stored.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::StoreUnavailable`] if the lock is poisoned.
    pub fn is_empty(&self) -> VaultResult<bool> {
        Ok(self.read_guard()?.is_empty())
    }

    fn read_guard(
        &self,
    ) -> VaultResult<std::sync::RwLockReadGuard<'_, HashMap<IdentityToken, ProfileRecord>>> {
        self.records
            .read()
            .map_err(|e| VaultError::StoreUnavailable(format!("store lock poisoned: {e}")))
    }

    fn write_guard(
        &self,
    ) -> VaultResult<std::sync::RwLockWriteGuard<'_, HashMap<IdentityToken, ProfileRecord>>> {
        self.records
            .write()
            .map_err(|e| VaultError::StoreUnavailable(format!("store lock poisoned: {e}")))
    }
}

impl Default for MemoryProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileStore for MemoryProfileStore {
    fn insert(&self, id: &IdentityToken, record: ProfileRecord) -> VaultResult<()> {
        let mut records = self.write_guard()?;
        if records.contains_key(id) {
            return Err(VaultError::DuplicateIdentity);
        }
        records.insert(*id, record);
        Ok(())
    }

    fn get(&self, id: &IdentityToken) -> VaultResult<Option<ProfileRecord>> {
        Ok(self.read_guard()?.get(id).cloned())
    }

    fn update_profile(
        &self,
        id: &IdentityToken,
        nonce: [u8; NONCE_SIZE],
        ciphertext: Vec<u8>,
        now: u64,
    ) -> VaultResult<()> {
        let mut records = self.write_guard()?;
        let record = records.get_mut(id).ok_or(VaultError::IdentityNotFound)?;
        record.nonce = nonce;
        record.ciphertext = ciphertext;
        record.updated_at = now;
        Ok(())
    }

    fn update_password(
        &self,
        id: &IdentityToken,
        verifier: VerifierString,
        salt: KdfSalt,
        nonce: [u8; NONCE_SIZE],
        ciphertext: Vec<u8>,
        now: u64,
    ) -> VaultResult<()> {
        let mut records = self.write_guard()?;
        let record = records.get_mut(id).ok_or(VaultError::IdentityNotFound)?;
        record.verifier = verifier;
        record.salt = salt;
        record.nonce = nonce;
        record.ciphertext = ciphertext;
        record.updated_at = now;
        Ok(())
    }

    fn delete(&self, id: &IdentityToken) -> VaultResult<()> {
        let mut records = self.write_guard()?;
        if records.remove(id).is_none() {
            return Err(VaultError::IdentityNotFound);
        }
        Ok(())
    }
}

/// Per-identity lock manager using a `Mutex` per identity.
pub struct MemoryLockManager {
    /// Locks for each identity.
    locks: RwLock<HashMap<IdentityToken, Arc<Mutex<()>>>>,
}

impl MemoryLockManager {
    /// Creates a new lock manager.
    #[must_use]
    pub fn new() -> Self {
        Self {
            locks: RwLock::new(HashMap::new()),
        }
    }

    /// Gets or creates the lock for an identity.
    fn get_lock(&self, id: &IdentityToken) -> VaultResult<Arc<Mutex<()>>> {
        {
            let locks = self
                .locks
                .read()
                .map_err(|e| VaultError::StoreUnavailable(format!("lock table poisoned: {e}")))?;
            if let Some(lock) = locks.get(id) {
                return Ok(Arc::clone(lock));
            }
        }

        let mut locks = self
            .locks
            .write()
            .map_err(|e| VaultError::StoreUnavailable(format!("lock table poisoned: {e}")))?;
        Ok(locks
            .entry(*id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }

    /// Returns the number of tracked identities.
    ///
    /// # Panics
    ///
    /// Panics if the lock table is poisoned.
    #[must_use]
    pub fn identity_count(&self) -> usize {
        self.locks.read().unwrap().len()
    }
}

impl Default for MemoryLockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityLockManager for MemoryLockManager {
    fn with_identity_lock<R, F>(&self, id: &IdentityToken, f: F) -> VaultResult<R>
    where
        F: FnOnce() -> VaultResult<R>,
    {
        let lock = self.get_lock(id)?;
        let _guard = lock
            .lock()
            .map_err(|e| VaultError::StoreUnavailable(format!("identity lock poisoned: {e}")))?;
        f()
    }

    fn try_with_identity_lock<R, F>(&self, id: &IdentityToken, f: F) -> VaultResult<Option<R>>
    where
        F: FnOnce() -> VaultResult<R>,
    {
        let lock = self.get_lock(id)?;
        let guard = match lock.try_lock() {
            Ok(guard) => guard,
            Err(std::sync::TryLockError::WouldBlock) => return Ok(None),
            Err(std::sync::TryLockError::Poisoned(e)) => {
                return Err(VaultError::StoreUnavailable(format!(
                    "identity lock poisoned: {e}"
                )));
            }
        };
        let result = f();
        drop(guard);
        result.map(Some)
    }

    fn release_identity(&self, id: &IdentityToken) -> VaultResult<()> {
        let mut locks = self
            .locks
            .write()
            .map_err(|e| VaultError::StoreUnavailable(format!("lock table poisoned: {e}")))?;
        // Only remove an idle entry; removing one that is still shared
        // would let two guards for the same identity coexist.
        if locks.get(id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(id);
        }
        Ok(())
    }
}
