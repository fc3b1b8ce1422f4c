//! Persistence and locking seams for profile records.
//!
//! The store is the only shared mutable resource in the system. Concurrent
//! writes to *different* identities are independent; writes to the *same*
//! identity must be serialized through an [`IdentityLockManager`] so the
//! four-field password-rotation write can never be observed half-applied.

pub mod memory;

pub use memory::{MemoryLockManager, MemoryProfileStore};

use crate::{
    types::{IdentityToken, KdfSalt, ProfileRecord, VerifierString, NONCE_SIZE},
    VaultResult,
};

/// Persistence keyed by identity token.
///
/// Each method is individually atomic: it either fully applies or leaves
/// the record untouched. Partial success is disallowed — in particular,
/// [`ProfileStore::update_password`] replaces the verifier, salt, nonce,
/// and ciphertext as one unit, because a record whose verifier disagrees
/// with its decryption salt would permanently lock the user out.
pub trait ProfileStore: Send + Sync {
    /// Creates a record for a new identity.
    ///
    /// # Errors
    ///
    /// Returns [`crate::VaultError::DuplicateIdentity`] if a record already
    /// exists for `id`, or [`crate::VaultError::StoreUnavailable`] on
    /// infrastructure failure.
    fn insert(&self, id: &IdentityToken, record: ProfileRecord) -> VaultResult<()>;

    /// Fetches the record for an identity, if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`crate::VaultError::StoreUnavailable`] on infrastructure
    /// failure.
    fn get(&self, id: &IdentityToken) -> VaultResult<Option<ProfileRecord>>;

    /// Replaces only the nonce and ciphertext, leaving the verifier and
    /// salt untouched.
    ///
    /// # Errors
    ///
    /// Returns [`crate::VaultError::IdentityNotFound`] if no record exists,
    /// or [`crate::VaultError::StoreUnavailable`] on infrastructure failure.
    fn update_profile(
        &self,
        id: &IdentityToken,
        nonce: [u8; NONCE_SIZE],
        ciphertext: Vec<u8>,
        now: u64,
    ) -> VaultResult<()>;

    /// Replaces all four mutable fields together (password rotation).
    ///
    /// # Errors
    ///
    /// Returns [`crate::VaultError::IdentityNotFound`] if no record exists,
    /// or [`crate::VaultError::StoreUnavailable`] on infrastructure failure.
    fn update_password(
        &self,
        id: &IdentityToken,
        verifier: VerifierString,
        salt: KdfSalt,
        nonce: [u8; NONCE_SIZE],
        ciphertext: Vec<u8>,
        now: u64,
    ) -> VaultResult<()>;

    /// Removes the whole record.
    ///
    /// # Errors
    ///
    /// Returns [`crate::VaultError::IdentityNotFound`] if no record exists,
    /// or [`crate::VaultError::StoreUnavailable`] on infrastructure failure.
    fn delete(&self, id: &IdentityToken) -> VaultResult<()>;
}

/// Per-identity locking to serialize mutations.
///
/// The lock MUST be held for the entire duration of any write to a record,
/// from the read that informs the write through the final commit. It is
/// released on every exit path, including error paths.
pub trait IdentityLockManager: Send + Sync {
    /// Executes the closure while holding the identity's lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be acquired or if the closure
    /// returns an error.
    fn with_identity_lock<R, F>(&self, id: &IdentityToken, f: F) -> VaultResult<R>
    where
        F: FnOnce() -> VaultResult<R>;

    /// Attempts to acquire the lock without blocking.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(result))` if the lock was acquired and the closure ran
    /// - `Ok(None)` if the lock is currently held elsewhere
    ///
    /// # Errors
    ///
    /// Returns an error on a system failure (not just "lock busy") or if
    /// the closure returns an error.
    fn try_with_identity_lock<R, F>(&self, id: &IdentityToken, f: F) -> VaultResult<Option<R>>
    where
        F: FnOnce() -> VaultResult<R>;

    /// Drops any lock-table state for an identity whose record is gone.
    ///
    /// Called after a successful delete, outside the identity lock, so the
    /// table does not grow unboundedly. Implementations without per-identity
    /// state may keep the default no-op.
    ///
    /// # Errors
    ///
    /// Returns an error on infrastructure failure.
    fn release_identity(&self, _id: &IdentityToken) -> VaultResult<()> {
        Ok(())
    }
}
