//! Server-side request orchestration.
//!
//! [`PlannerVault`] wires the identity hasher, password verifier, store,
//! and session manager into the register / login / update flows. Every
//! request is independent and short-lived: slow hashes run synchronously on
//! the calling thread (the latency is a deliberate brute-force deterrent),
//! and nothing derived from a request outlives it except the session
//! marker and the stored record.

use std::sync::Arc;

use log::{debug, warn};

use crate::{
    config::VaultConfig,
    error::VaultError,
    identity::IdentityHasher,
    kdf::AuthSecret,
    session::{unix_now, SessionManager, SessionToken},
    store::{IdentityLockManager, ProfileStore},
    types::{IdentityToken, KdfSalt, ProfileRecord, VerifierString, NONCE_SIZE},
    verifier::CredentialVerifier,
    VaultResult,
};

/// Registration request.
///
/// The salt is generated client-side and persisted verbatim; the server
/// never regenerates it except through [`PlannerVault::change_password`].
#[derive(Debug, Clone)]
pub struct RegisterRequest {
    /// The raw username. Used only to derive the identity token; never
    /// persisted.
    pub username: String,
    /// The client's derived authentication secret.
    pub auth_secret: AuthSecret,
    /// Client key-derivation salt for this record.
    pub salt: KdfSalt,
    /// AEAD nonce of the initial ciphertext.
    pub nonce: [u8; NONCE_SIZE],
    /// The encrypted initial profile.
    pub ciphertext: Vec<u8>,
    /// Payload schema version the ciphertext was sealed under.
    pub schema_version: u32,
}

/// Successful login response.
///
/// Contains exactly the material the client needs to re-derive its key and
/// decrypt locally, plus the session marker. Nothing here lets the server
/// decrypt.
#[derive(Debug, Clone)]
pub struct LoginSuccess {
    /// Client key-derivation salt.
    pub salt: KdfSalt,
    /// AEAD nonce of the current ciphertext.
    pub nonce: [u8; NONCE_SIZE],
    /// The current encrypted profile.
    pub ciphertext: Vec<u8>,
    /// Payload schema version.
    pub schema_version: u32,
    /// Authenticated session marker.
    pub session: SessionToken,
}

/// Replacement material for a password rotation, produced client-side.
#[derive(Debug, Clone)]
pub struct PasswordRotation {
    /// Authentication secret derived from the new password and salt.
    pub auth_secret: AuthSecret,
    /// Fresh key-derivation salt for the new password.
    pub salt: KdfSalt,
    /// Nonce of the re-encrypted profile.
    pub nonce: [u8; NONCE_SIZE],
    /// Profile re-encrypted under the new key.
    pub ciphertext: Vec<u8>,
    /// Payload schema version.
    pub schema_version: u32,
}

/// Fixed input for the decoy verification on unknown identities.
const DUMMY_SECRET: &[u8] = b"planvault:dummy-verification-input";

/// The credential store service.
///
/// Generic over the persistence and locking seams so deployments can bring
/// their own backend; the in-memory implementations in [`crate::store`]
/// cover tests and single-process use.
pub struct PlannerVault<S, L>
where
    S: ProfileStore,
    L: IdentityLockManager,
{
    hasher: IdentityHasher,
    verifier: CredentialVerifier,
    /// Verified against when no record exists, so unknown identities cost
    /// the same as wrong passwords.
    decoy_verifier: VerifierString,
    store: Arc<S>,
    locks: Arc<L>,
    sessions: SessionManager,
}

impl<S, L> PlannerVault<S, L>
where
    S: ProfileStore,
    L: IdentityLockManager,
{
    /// Creates a service instance.
    ///
    /// # Arguments
    ///
    /// * `index_key` - Server-held key for pseudonymous identity derivation
    /// * `store` - Record persistence
    /// * `locks` - Per-identity write serialization
    /// * `config` - Cost and lifetime tuning
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::KeyDerivation`] if the verifier parameters are
    /// invalid.
    pub fn new(
        index_key: [u8; 32],
        store: Arc<S>,
        locks: Arc<L>,
        config: VaultConfig,
    ) -> VaultResult<Self> {
        let verifier = CredentialVerifier::new(config.verifier_params)?;
        let decoy_verifier = verifier.hash(DUMMY_SECRET)?;

        Ok(Self {
            hasher: IdentityHasher::new(index_key),
            verifier,
            decoy_verifier,
            store,
            locks,
            sessions: SessionManager::new(config.session_ttl_secs),
        })
    }

    /// Registers a new identity.
    ///
    /// All record fields are created atomically; a failed registration
    /// commits nothing.
    ///
    /// # Errors
    ///
    /// - [`VaultError::InvalidInput`] if the username or ciphertext is empty
    /// - [`VaultError::DuplicateIdentity`] if the identity already exists
    /// - [`VaultError::StoreUnavailable`] on infrastructure failure
    pub fn register(&self, request: RegisterRequest) -> VaultResult<()> {
        if request.username.trim().is_empty() {
            return Err(VaultError::InvalidInput {
                field: "username",
                reason: "must not be empty".to_string(),
            });
        }
        if request.ciphertext.is_empty() {
            return Err(VaultError::InvalidInput {
                field: "ciphertext",
                reason: "must not be empty".to_string(),
            });
        }

        let id = self.hasher.token(&request.username);
        // Slow hash outside the identity lock.
        let verifier = self.verifier.hash(request.auth_secret.as_bytes())?;
        let record = ProfileRecord {
            verifier,
            salt: request.salt,
            nonce: request.nonce,
            ciphertext: request.ciphertext,
            schema_version: request.schema_version,
            updated_at: unix_now(),
        };

        self.locks
            .with_identity_lock(&id, || self.store.insert(&id, record))?;

        debug!("registered identity {id}");
        Ok(())
    }

    /// Authenticates a username/secret pair.
    ///
    /// On success, returns the decryption material and a session marker.
    ///
    /// # Errors
    ///
    /// - [`VaultError::InvalidCredentials`] for an unknown identity OR a
    ///   wrong secret — deliberately indistinguishable, with similar timing
    /// - [`VaultError::StoreUnavailable`] on infrastructure failure
    pub fn login(&self, username: &str, auth_secret: &AuthSecret) -> VaultResult<LoginSuccess> {
        let id = self.hasher.token(username);

        let Some(record) = self.store.get(&id)? else {
            // Burn a verification so unknown identities cost the same as
            // wrong passwords.
            let _ = self.verifier.verify(auth_secret.as_bytes(), &self.decoy_verifier);
            warn!("login rejected for unknown identity");
            return Err(VaultError::InvalidCredentials);
        };

        if !self.verifier.verify(auth_secret.as_bytes(), &record.verifier) {
            warn!("login rejected for identity {id}");
            return Err(VaultError::InvalidCredentials);
        }

        let session = self.sessions.issue(id)?;
        debug!("login succeeded for identity {id}");

        Ok(LoginSuccess {
            salt: record.salt,
            nonce: record.nonce,
            ciphertext: record.ciphertext,
            schema_version: record.schema_version,
            session,
        })
    }

    /// Replaces the stored ciphertext for the session's identity.
    ///
    /// Only the nonce and ciphertext change; the verifier and salt are
    /// untouched, so the unchanged password keeps authenticating and
    /// decrypting.
    ///
    /// # Errors
    ///
    /// - [`VaultError::InvalidSession`] if the marker is missing or expired
    /// - [`VaultError::InvalidInput`] if the ciphertext is empty
    /// - [`VaultError::IdentityNotFound`] if the record was deleted
    /// - [`VaultError::StoreUnavailable`] on infrastructure failure
    pub fn update_profile(
        &self,
        session: &SessionToken,
        nonce: [u8; NONCE_SIZE],
        ciphertext: Vec<u8>,
    ) -> VaultResult<()> {
        let id = self.sessions.resolve(session)?.ok_or(VaultError::InvalidSession)?;
        if ciphertext.is_empty() {
            return Err(VaultError::InvalidInput {
                field: "ciphertext",
                reason: "must not be empty".to_string(),
            });
        }

        self.locks.with_identity_lock(&id, || {
            self.store.update_profile(&id, nonce, ciphertext, unix_now())
        })?;

        debug!("profile updated for identity {id}");
        Ok(())
    }

    /// Rotates the password for the session's identity.
    ///
    /// Re-verifies the current secret, then replaces the verifier, salt,
    /// nonce, and ciphertext as one atomic unit under the identity lock. A
    /// partial rotation would leave the verifier and the decryption salt
    /// disagreeing, permanently locking the user out.
    ///
    /// Every session issued before the rotation is revoked: those clients
    /// hold the old salt, and a profile save sealed under the old key would
    /// desynchronize the rotated record. The caller receives a fresh
    /// session in exchange.
    ///
    /// # Errors
    ///
    /// - [`VaultError::InvalidSession`] if the marker is missing or expired
    /// - [`VaultError::InvalidCredentials`] if the current secret is wrong
    /// - [`VaultError::IdentityNotFound`] if the record was deleted
    /// - [`VaultError::StoreUnavailable`] on infrastructure failure
    pub fn change_password(
        &self,
        session: &SessionToken,
        current_secret: &AuthSecret,
        rotation: PasswordRotation,
    ) -> VaultResult<SessionToken> {
        let id = self.sessions.resolve(session)?.ok_or(VaultError::InvalidSession)?;

        // Slow hash outside the identity lock.
        let new_verifier = self.verifier.hash(rotation.auth_secret.as_bytes())?;

        self.locks.with_identity_lock(&id, || {
            let record = self.store.get(&id)?.ok_or(VaultError::IdentityNotFound)?;
            if !self.verifier.verify(current_secret.as_bytes(), &record.verifier) {
                warn!("password rotation rejected for identity {id}");
                return Err(VaultError::InvalidCredentials);
            }

            self.store.update_password(
                &id,
                new_verifier.clone(),
                rotation.salt,
                rotation.nonce,
                rotation.ciphertext.clone(),
                unix_now(),
            )
        })?;

        self.sessions.revoke_identity(&id)?;
        let session = self.sessions.issue(id)?;

        debug!("password rotated for identity {id}");
        Ok(session)
    }

    /// Invalidates a session marker.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::StoreUnavailable`] if the session table is
    /// unavailable.
    pub fn logout(&self, session: &SessionToken) -> VaultResult<()> {
        self.sessions.revoke(session)
    }

    /// Deletes the session's record entirely and revokes all its sessions.
    ///
    /// # Errors
    ///
    /// - [`VaultError::InvalidSession`] if the marker is missing or expired
    /// - [`VaultError::InvalidCredentials`] if the secret is wrong
    /// - [`VaultError::IdentityNotFound`] if the record was already deleted
    /// - [`VaultError::StoreUnavailable`] on infrastructure failure
    pub fn delete_account(
        &self,
        session: &SessionToken,
        auth_secret: &AuthSecret,
    ) -> VaultResult<()> {
        let id = self.sessions.resolve(session)?.ok_or(VaultError::InvalidSession)?;

        self.locks.with_identity_lock(&id, || {
            let record = self.store.get(&id)?.ok_or(VaultError::IdentityNotFound)?;
            if !self.verifier.verify(auth_secret.as_bytes(), &record.verifier) {
                warn!("account deletion rejected for identity {id}");
                return Err(VaultError::InvalidCredentials);
            }
            self.store.delete(&id)
        })?;

        self.sessions.revoke_identity(&id)?;
        self.locks.release_identity(&id)?;
        debug!("account deleted for identity {id}");
        Ok(())
    }

    /// Resolves a session to the identity it gates, if still valid.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::StoreUnavailable`] if the session table is
    /// unavailable.
    pub fn resolve_session(&self, session: &SessionToken) -> VaultResult<Option<IdentityToken>> {
        self.sessions.resolve(session)
    }

    /// Removes expired session entries.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::StoreUnavailable`] if the session table is
    /// unavailable.
    pub fn prune_sessions(&self) -> VaultResult<()> {
        self.sessions.prune_expired()
    }
}

impl<S, L> std::fmt::Debug for PlannerVault<S, L>
where
    S: ProfileStore,
    L: IdentityLockManager,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlannerVault").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryLockManager, MemoryProfileStore};

    const INDEX_KEY: [u8; 32] = [0x5A; 32];

    fn vault() -> PlannerVault<MemoryProfileStore, MemoryLockManager> {
        PlannerVault::new(
            INDEX_KEY,
            Arc::new(MemoryProfileStore::new()),
            Arc::new(MemoryLockManager::new()),
            VaultConfig::fast_insecure(),
        )
        .unwrap()
    }

    fn request(username: &str, secret_tag: u8) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            auth_secret: AuthSecret::from_bytes([secret_tag; 32]),
            salt: KdfSalt::new([0x11; 16]),
            nonce: [0x22; NONCE_SIZE],
            ciphertext: vec![0x33; 48],
            schema_version: 1,
        }
    }

    #[test]
    fn register_then_login() {
        let vault = vault();
        vault.register(request("alice", 0xAA)).unwrap();

        let success = vault
            .login("alice", &AuthSecret::from_bytes([0xAA; 32]))
            .unwrap();
        assert_eq!(success.salt, KdfSalt::new([0x11; 16]));
        assert_eq!(success.ciphertext, vec![0x33; 48]);
        assert!(vault.resolve_session(&success.session).unwrap().is_some());
    }

    #[test]
    fn login_with_wrong_secret_fails() {
        let vault = vault();
        vault.register(request("alice", 0xAA)).unwrap();

        let result = vault.login("alice", &AuthSecret::from_bytes([0xBB; 32]));
        assert!(matches!(result, Err(VaultError::InvalidCredentials)));
    }

    #[test]
    fn login_unknown_identity_is_indistinguishable() {
        let vault = vault();
        vault.register(request("alice", 0xAA)).unwrap();

        let unknown = vault.login("mallory", &AuthSecret::from_bytes([0xAA; 32]));
        let wrong = vault.login("alice", &AuthSecret::from_bytes([0xBB; 32]));
        assert!(matches!(unknown, Err(VaultError::InvalidCredentials)));
        assert!(matches!(wrong, Err(VaultError::InvalidCredentials)));
    }

    #[test]
    fn duplicate_registration_fails() {
        let vault = vault();
        vault.register(request("alice", 0xAA)).unwrap();

        let result = vault.register(request("alice", 0xBB));
        assert!(matches!(result, Err(VaultError::DuplicateIdentity)));

        // Username normalization applies to registration too.
        let result = vault.register(request("  ALICE ", 0xCC));
        assert!(matches!(result, Err(VaultError::DuplicateIdentity)));
    }

    #[test]
    fn empty_fields_are_rejected() {
        let vault = vault();

        let result = vault.register(request("   ", 0xAA));
        assert!(matches!(result, Err(VaultError::InvalidInput { field: "username", .. })));

        let mut req = request("alice", 0xAA);
        req.ciphertext.clear();
        let result = vault.register(req);
        assert!(matches!(result, Err(VaultError::InvalidInput { field: "ciphertext", .. })));
    }

    #[test]
    fn update_profile_requires_valid_session() {
        let vault = vault();
        vault.register(request("alice", 0xAA)).unwrap();

        let bogus = SessionToken::generate();
        let result = vault.update_profile(&bogus, [0; NONCE_SIZE], vec![1, 2, 3]);
        assert!(matches!(result, Err(VaultError::InvalidSession)));
    }

    #[test]
    fn update_profile_replaces_ciphertext_only() {
        let vault = vault();
        vault.register(request("alice", 0xAA)).unwrap();
        let secret = AuthSecret::from_bytes([0xAA; 32]);

        let session = vault.login("alice", &secret).unwrap().session;
        vault
            .update_profile(&session, [0x44; NONCE_SIZE], vec![0x55; 64])
            .unwrap();

        // The unchanged password still authenticates and sees the new blob.
        let success = vault.login("alice", &secret).unwrap();
        assert_eq!(success.nonce, [0x44; NONCE_SIZE]);
        assert_eq!(success.ciphertext, vec![0x55; 64]);
        assert_eq!(success.salt, KdfSalt::new([0x11; 16]));
    }

    #[test]
    fn password_rotation_swaps_all_fields() {
        let vault = vault();
        vault.register(request("alice", 0xAA)).unwrap();
        let old_secret = AuthSecret::from_bytes([0xAA; 32]);
        let new_secret = AuthSecret::from_bytes([0xEE; 32]);

        let session = vault.login("alice", &old_secret).unwrap().session;
        vault
            .change_password(
                &session,
                &old_secret,
                PasswordRotation {
                    auth_secret: new_secret.clone(),
                    salt: KdfSalt::new([0x66; 16]),
                    nonce: [0x77; NONCE_SIZE],
                    ciphertext: vec![0x88; 64],
                    schema_version: 1,
                },
            )
            .unwrap();

        let result = vault.login("alice", &old_secret);
        assert!(matches!(result, Err(VaultError::InvalidCredentials)));

        let success = vault.login("alice", &new_secret).unwrap();
        assert_eq!(success.salt, KdfSalt::new([0x66; 16]));
        assert_eq!(success.ciphertext, vec![0x88; 64]);
    }

    #[test]
    fn rotation_with_wrong_current_secret_changes_nothing() {
        let vault = vault();
        vault.register(request("alice", 0xAA)).unwrap();
        let secret = AuthSecret::from_bytes([0xAA; 32]);

        let session = vault.login("alice", &secret).unwrap().session;
        let result = vault.change_password(
            &session,
            &AuthSecret::from_bytes([0xFF; 32]),
            PasswordRotation {
                auth_secret: AuthSecret::from_bytes([0xEE; 32]),
                salt: KdfSalt::new([0x66; 16]),
                nonce: [0x77; NONCE_SIZE],
                ciphertext: vec![0x88; 64],
                schema_version: 1,
            },
        );
        assert!(matches!(result, Err(VaultError::InvalidCredentials)));

        // The original password still works and sees the original blob.
        let success = vault.login("alice", &secret).unwrap();
        assert_eq!(success.ciphertext, vec![0x33; 48]);
    }

    #[test]
    fn logout_invalidates_session() {
        let vault = vault();
        vault.register(request("alice", 0xAA)).unwrap();
        let secret = AuthSecret::from_bytes([0xAA; 32]);

        let session = vault.login("alice", &secret).unwrap().session;
        vault.logout(&session).unwrap();

        let result = vault.update_profile(&session, [0; NONCE_SIZE], vec![1]);
        assert!(matches!(result, Err(VaultError::InvalidSession)));
    }

    #[test]
    fn rotation_revokes_sessions_issued_before_it() {
        let vault = vault();
        vault.register(request("alice", 0xAA)).unwrap();
        let secret = AuthSecret::from_bytes([0xAA; 32]);

        let phone = vault.login("alice", &secret).unwrap().session;
        let laptop = vault.login("alice", &secret).unwrap().session;

        let fresh = vault
            .change_password(
                &phone,
                &secret,
                PasswordRotation {
                    auth_secret: AuthSecret::from_bytes([0xEE; 32]),
                    salt: KdfSalt::new([0x66; 16]),
                    nonce: [0x77; NONCE_SIZE],
                    ciphertext: vec![0x88; 64],
                    schema_version: 1,
                },
            )
            .unwrap();

        // Both pre-rotation sessions pair with the replaced salt; a save
        // through either would desynchronize the record.
        for stale in [&phone, &laptop] {
            let result = vault.update_profile(stale, [0x99; NONCE_SIZE], vec![0x99; 8]);
            assert!(matches!(result, Err(VaultError::InvalidSession)));
        }

        // The rotating caller continues on the fresh session.
        vault
            .update_profile(&fresh, [0x9A; NONCE_SIZE], vec![0x9A; 8])
            .unwrap();
    }

    #[test]
    fn delete_account_removes_record_sessions_and_lock_state() {
        let store = Arc::new(MemoryProfileStore::new());
        let locks = Arc::new(MemoryLockManager::new());
        let vault = PlannerVault::new(
            INDEX_KEY,
            Arc::clone(&store),
            Arc::clone(&locks),
            VaultConfig::fast_insecure(),
        )
        .unwrap();
        vault.register(request("alice", 0xAA)).unwrap();
        let secret = AuthSecret::from_bytes([0xAA; 32]);

        let session = vault.login("alice", &secret).unwrap().session;
        vault.delete_account(&session, &secret).unwrap();

        assert!(vault.resolve_session(&session).unwrap().is_none());
        assert!(store.is_empty().unwrap());
        assert_eq!(locks.identity_count(), 0);
        let result = vault.login("alice", &secret);
        assert!(matches!(result, Err(VaultError::InvalidCredentials)));
    }
}
