//! Pseudonymous identity derivation.
//!
//! Usernames are never persisted. Each record is keyed by a token computed
//! as a keyed hash of the normalized username:
//!
//! ```text
//! token = HMAC-SHA256(index_key, "planvault:identity" || SHA256(normalize(username)))
//! ```
//!
//! The indexing key lives only on the server. Without it, tokens cannot be
//! correlated to usernames by offline dictionary search, which is why no
//! slow-hash step is needed here — this is an indexing hash, not a password
//! hash.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::types::IdentityToken;

type HmacSha256 = Hmac<Sha256>;

/// Domain separation label for identity tokens.
const LABEL_IDENTITY: &[u8] = b"planvault:identity";

/// Normalizes a username for token derivation.
///
/// Identical usernames must always yield identical tokens, so lookup is
/// insensitive to surrounding whitespace and letter case.
#[must_use]
pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

/// Deterministic, one-way mapping from usernames to storage keys.
///
/// Pure and total: the same username always yields the same token for a
/// given indexing key, and distinct usernames yield distinct tokens with
/// cryptographic probability.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct IdentityHasher {
    /// Server-held indexing key.
    index_key: [u8; 32],
}

impl IdentityHasher {
    /// Creates a hasher with the given server-held indexing key.
    #[must_use]
    pub const fn new(index_key: [u8; 32]) -> Self {
        Self { index_key }
    }

    /// Derives the identity token for a username.
    #[must_use]
    pub fn token(&self, username: &str) -> IdentityToken {
        let fingerprint = Sha256::digest(normalize_username(username).as_bytes());

        let mut mac = HmacSha256::new_from_slice(&self.index_key)
            .expect("HMAC accepts keys of any length");
        mac.update(LABEL_IDENTITY);
        mac.update(&fingerprint);
        let tag = mac.finalize().into_bytes();

        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&tag);
        IdentityToken::new(bytes)
    }
}

impl std::fmt::Debug for IdentityHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityHasher")
            .field("index_key", &"[REDACTED]")
            .finish()
    }
}
