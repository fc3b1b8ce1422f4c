//! Core type definitions for the credential store.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Size in bytes of the XChaCha20-Poly1305 nonce stored with each profile.
pub const NONCE_SIZE: usize = 24;

/// Size in bytes of the client key-derivation salt.
pub const SALT_SIZE: usize = 16;

/// A 32-byte pseudonymous identity derived from a username.
///
/// Records are keyed by this token. It is computed one-way under a
/// server-held indexing key, so the token cannot be correlated back to a
/// username without that key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityToken(pub [u8; 32]);

impl IdentityToken {
    /// Creates a new `IdentityToken` from raw bytes.
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes of the token.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Converts the token to a hexadecimal string.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Creates an `IdentityToken` from a hexadecimal string.
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

impl fmt::Debug for IdentityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityToken({})", self.to_hex())
    }
}

impl fmt::Display for IdentityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl AsRef<[u8]> for IdentityToken {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// The per-record client key-derivation salt.
///
/// Generated once at registration and fixed for the life of a password;
/// replaced only by a password rotation.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfSalt(pub [u8; SALT_SIZE]);

impl KdfSalt {
    /// Creates a new `KdfSalt` from raw bytes.
    #[must_use]
    pub const fn new(bytes: [u8; SALT_SIZE]) -> Self {
        Self(bytes)
    }

    /// Generates a fresh random salt.
    ///
    /// # Panics
    ///
    /// Panics if the system's random number generator fails.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; SALT_SIZE];
        getrandom::getrandom(&mut bytes).expect("getrandom failed");
        Self(bytes)
    }

    /// Returns the raw bytes of the salt.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; SALT_SIZE] {
        &self.0
    }

    /// Converts the salt to a hexadecimal string.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for KdfSalt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KdfSalt({})", self.to_hex())
    }
}

impl AsRef<[u8]> for KdfSalt {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// An Argon2id password verifier in PHC string format.
///
/// The string embeds its own random salt and cost parameters. It can only
/// be used to check future password attempts, never to recover a password.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifierString(String);

impl VerifierString {
    /// Wraps an encoded PHC string.
    #[must_use]
    pub const fn new(encoded: String) -> Self {
        Self(encoded)
    }

    /// Returns the encoded PHC string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for VerifierString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifierString")
            .field("phc", &"[REDACTED]")
            .finish()
    }
}

/// The persisted record for one identity.
///
/// All fields are created atomically at registration. `nonce` and
/// `ciphertext` are replaced together on every profile save; all four
/// mutable fields are replaced together on password rotation. A partial
/// update would desynchronize the verifier from the decryption salt and
/// permanently lock the user out, so the store forbids it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    /// Argon2id verifier for the client's authentication secret.
    pub verifier: VerifierString,
    /// Client key-derivation salt, fixed for the life of the password.
    pub salt: KdfSalt,
    /// AEAD nonce of the current ciphertext, fresh on every save.
    pub nonce: [u8; NONCE_SIZE],
    /// The encrypted profile payload.
    pub ciphertext: Vec<u8>,
    /// Payload schema version for migration support.
    pub schema_version: u32,
    /// Unix timestamp of the last write.
    pub updated_at: u64,
}
