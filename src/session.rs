//! Authenticated-session markers.
//!
//! A session token is an opaque 32-byte random value bound to an identity
//! token with a bounded lifetime. It carries no cryptographic material —
//! it only gates which identity a subsequent request may fetch or update.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use subtle::ConstantTimeEq;

use crate::{error::VaultError, types::IdentityToken, VaultResult};

/// Returns the current Unix timestamp in seconds.
#[must_use]
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

/// An opaque session marker (256-bit random).
#[derive(Clone, Copy, Hash)]
pub struct SessionToken([u8; 32]);

impl SessionToken {
    /// Creates a token from raw bytes.
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Generates a fresh random token.
    ///
    /// # Panics
    ///
    /// Panics if the system's random number generator fails.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        getrandom::getrandom(&mut bytes).expect("getrandom failed");
        Self(bytes)
    }

    /// Converts the token to a hexadecimal string.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Creates a `SessionToken` from a hexadecimal string.
    ///
    /// # Errors
    /// Returns an error if the string is not valid hex or not exactly 32 bytes.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Self(arr))
    }
}

impl PartialEq for SessionToken {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for SessionToken {}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionToken")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// An active session.
#[derive(Debug, Clone, Copy)]
struct Session {
    /// The identity this session is bound to.
    identity: IdentityToken,
    /// Unix timestamp after which the session is invalid.
    expires_at: u64,
}

impl Session {
    const fn is_expired(&self, now: u64) -> bool {
        self.expires_at <= now
    }
}

/// Issues and validates session markers.
///
/// The session table is a shared resource like the store; an unavailable
/// table surfaces as [`VaultError::StoreUnavailable`] rather than a panic.
pub struct SessionManager {
    /// Active sessions keyed by token.
    sessions: RwLock<HashMap<SessionToken, Session>>,
    /// Session lifetime in seconds.
    ttl_secs: u64,
}

impl SessionManager {
    /// Creates a manager issuing sessions with the given lifetime.
    #[must_use]
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl_secs,
        }
    }

    fn read_guard(&self) -> VaultResult<RwLockReadGuard<'_, HashMap<SessionToken, Session>>> {
        self.sessions
            .read()
            .map_err(|e| VaultError::StoreUnavailable(format!("session table poisoned: {e}")))
    }

    fn write_guard(&self) -> VaultResult<RwLockWriteGuard<'_, HashMap<SessionToken, Session>>> {
        self.sessions
            .write()
            .map_err(|e| VaultError::StoreUnavailable(format!("session table poisoned: {e}")))
    }

    /// Issues a fresh session for an identity.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::StoreUnavailable`] if the session table is
    /// unavailable.
    pub fn issue(&self, identity: IdentityToken) -> VaultResult<SessionToken> {
        self.issue_at(identity, unix_now())
    }

    /// Issues a fresh session with an explicit current time.
    ///
    /// The expiry saturates, so an extreme configured TTL never wraps into
    /// an already-expired session.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::StoreUnavailable`] if the session table is
    /// unavailable.
    pub fn issue_at(&self, identity: IdentityToken, now: u64) -> VaultResult<SessionToken> {
        let token = SessionToken::generate();
        let session = Session {
            identity,
            expires_at: now.saturating_add(self.ttl_secs),
        };
        self.write_guard()?.insert(token, session);
        Ok(token)
    }

    /// Resolves a token to the identity it gates, honoring expiry.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::StoreUnavailable`] if the session table is
    /// unavailable.
    pub fn resolve(&self, token: &SessionToken) -> VaultResult<Option<IdentityToken>> {
        self.resolve_at(token, unix_now())
    }

    /// Resolves a token with an explicit current time.
    ///
    /// An expired entry is removed as a side effect.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::StoreUnavailable`] if the session table is
    /// unavailable.
    pub fn resolve_at(
        &self,
        token: &SessionToken,
        now: u64,
    ) -> VaultResult<Option<IdentityToken>> {
        let mut sessions = self.write_guard()?;
        match sessions.get(token) {
            Some(session) if session.is_expired(now) => {
                sessions.remove(token);
                Ok(None)
            }
            Some(session) => Ok(Some(session.identity)),
            None => Ok(None),
        }
    }

    /// Invalidates a single session (logout).
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::StoreUnavailable`] if the session table is
    /// unavailable.
    pub fn revoke(&self, token: &SessionToken) -> VaultResult<()> {
        self.write_guard()?.remove(token);
        Ok(())
    }

    /// Invalidates every session bound to an identity (account deletion,
    /// password rotation).
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::StoreUnavailable`] if the session table is
    /// unavailable.
    pub fn revoke_identity(&self, identity: &IdentityToken) -> VaultResult<()> {
        self.write_guard()?.retain(|_, s| &s.identity != identity);
        Ok(())
    }

    /// Removes expired entries.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::StoreUnavailable`] if the session table is
    /// unavailable.
    pub fn prune_expired(&self) -> VaultResult<()> {
        let now = unix_now();
        self.write_guard()?.retain(|_, s| !s.is_expired(now));
        Ok(())
    }

    /// Returns the number of tracked sessions, including not-yet-pruned
    /// expired entries.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::StoreUnavailable`] if the session table is
    /// unavailable.
    pub fn active_count(&self) -> VaultResult<usize> {
        Ok(self.read_guard()?.len())
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    const TTL: u64 = 1800;

    fn identity(tag: u8) -> IdentityToken {
        IdentityToken::new([tag; 32])
    }

    #[test]
    fn issue_then_resolve() {
        let manager = SessionManager::new(TTL);
        let token = manager.issue_at(identity(1), 1000).unwrap();

        assert_eq!(manager.resolve_at(&token, 1000).unwrap(), Some(identity(1)));
        assert_eq!(
            manager.resolve_at(&token, 1000 + TTL - 1).unwrap(),
            Some(identity(1))
        );
    }

    #[test]
    fn expired_session_resolves_to_none() {
        let manager = SessionManager::new(TTL);
        let token = manager.issue_at(identity(1), 1000).unwrap();

        assert_eq!(manager.resolve_at(&token, 1000 + TTL).unwrap(), None);
        // The expired entry was removed.
        assert_eq!(manager.active_count().unwrap(), 0);
    }

    #[test]
    fn revoke_invalidates_token() {
        let manager = SessionManager::new(TTL);
        let token = manager.issue_at(identity(1), 1000).unwrap();

        manager.revoke(&token).unwrap();
        assert_eq!(manager.resolve_at(&token, 1000).unwrap(), None);
    }

    #[test]
    fn unknown_token_resolves_to_none() {
        let manager = SessionManager::new(TTL);
        assert_eq!(
            manager.resolve_at(&SessionToken::generate(), 1000).unwrap(),
            None
        );
    }

    #[test]
    fn revoke_identity_clears_all_its_sessions() {
        let manager = SessionManager::new(TTL);
        let a1 = manager.issue_at(identity(1), 1000).unwrap();
        let a2 = manager.issue_at(identity(1), 1000).unwrap();
        let b = manager.issue_at(identity(2), 1000).unwrap();

        manager.revoke_identity(&identity(1)).unwrap();
        assert_eq!(manager.resolve_at(&a1, 1000).unwrap(), None);
        assert_eq!(manager.resolve_at(&a2, 1000).unwrap(), None);
        assert_eq!(manager.resolve_at(&b, 1000).unwrap(), Some(identity(2)));
    }

    #[test]
    fn tokens_are_unique() {
        let manager = SessionManager::new(TTL);
        let t1 = manager.issue_at(identity(1), 1000).unwrap();
        let t2 = manager.issue_at(identity(1), 1000).unwrap();
        assert_ne!(t1, t2);
    }

    #[test]
    fn token_hex_roundtrip() {
        let token = SessionToken::generate();
        assert_eq!(SessionToken::from_hex(&token.to_hex()).unwrap(), token);
    }

    #[test]
    fn extreme_ttl_saturates_instead_of_wrapping() {
        let manager = SessionManager::new(u64::MAX);
        let token = manager.issue_at(identity(1), 1000).unwrap();

        // Wrapping would put expires_at in the past; saturation keeps the
        // session valid at any later time.
        assert_eq!(
            manager.resolve_at(&token, u64::MAX - 1).unwrap(),
            Some(identity(1))
        );
    }

    #[test]
    fn poisoned_table_surfaces_as_store_unavailable() {
        let manager = Arc::new(SessionManager::new(TTL));
        let token = manager.issue_at(identity(1), 1000).unwrap();

        let poisoner = {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                let _guard = manager.sessions.write().unwrap();
                panic!("poison the session table");
            })
        };
        assert!(poisoner.join().is_err());

        assert!(matches!(
            manager.resolve_at(&token, 1000),
            Err(VaultError::StoreUnavailable(_))
        ));
        assert!(matches!(
            manager.issue_at(identity(2), 1000),
            Err(VaultError::StoreUnavailable(_))
        ));
    }
}
