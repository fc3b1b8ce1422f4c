//! Client-side key derivation.
//!
//! Two secrets are derived from the password and the per-record salt:
//!
//! ```text
//! root        = Argon2id(password, salt)                      // slow stretch
//! auth_secret = HKDF-Expand-SHA256(root, "planvault:auth-secret")
//! profile_key = HKDF-Expand-SHA256(root, "planvault:profile-key")
//! ```
//!
//! The two outputs are cryptographically independent: the server receives
//! only `auth_secret`, which gives it no material to reconstruct
//! `profile_key`. Both derivations run exclusively on the client holding
//! the real password; the server never executes this module with a true
//! secret.

use hkdf::Hkdf;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::{
    cipher::ProfileKey,
    config::KdfParams,
    error::VaultError,
    types::KdfSalt,
    VaultResult,
};

/// Domain separation label for the secret sent to the server.
const LABEL_AUTH_SECRET: &[u8] = b"planvault:auth-secret";

/// Domain separation label for the profile encryption key.
const LABEL_PROFILE_KEY: &[u8] = b"planvault:profile-key";

/// The client's authentication secret (256-bit).
///
/// This is the value transmitted to the server at registration and login,
/// where it is fed to the password verifier. It is password-equivalent and
/// zeroized on drop, but it is *not* the profile key — the server learning
/// it does not enable decryption.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AuthSecret([u8; 32]);

impl AuthSecret {
    /// Creates an `AuthSecret` from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw secret bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl PartialEq for AuthSecret {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for AuthSecret {}

impl std::fmt::Debug for AuthSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSecret")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Stretches the password into the 32-byte root key.
fn stretch(password: &str, salt: &KdfSalt, params: KdfParams) -> VaultResult<Zeroizing<[u8; 32]>> {
    let argon2 = argon2::Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        params.to_argon2()?,
    );

    let mut root = Zeroizing::new([0u8; 32]);
    argon2
        .hash_password_into(password.as_bytes(), salt.as_bytes(), &mut root[..])
        .map_err(|e| VaultError::KeyDerivation(format!("argon2 stretch failed: {e}")))?;
    Ok(root)
}

/// Expands the root key under a domain separation label.
fn expand(root: &[u8; 32], label: &[u8]) -> VaultResult<[u8; 32]> {
    let hk = Hkdf::<Sha256>::from_prk(root)
        .map_err(|e| VaultError::KeyDerivation(format!("hkdf prk rejected: {e}")))?;

    let mut okm = [0u8; 32];
    hk.expand(label, &mut okm)
        .map_err(|e| VaultError::KeyDerivation(format!("hkdf expand failed: {e}")))?;
    Ok(okm)
}

/// Derives the authentication secret sent to the server.
///
/// Deterministic: the same password and salt always produce the same
/// output.
///
/// # Errors
///
/// Returns [`VaultError::KeyDerivation`] if stretching or expansion fails.
pub fn derive_auth_secret(
    password: &str,
    salt: &KdfSalt,
    params: KdfParams,
) -> VaultResult<AuthSecret> {
    let root = stretch(password, salt, params)?;
    Ok(AuthSecret::from_bytes(expand(&root, LABEL_AUTH_SECRET)?))
}

/// Derives the symmetric profile key. Never leaves the client.
///
/// # Errors
///
/// Returns [`VaultError::KeyDerivation`] if stretching or expansion fails.
pub fn derive_profile_key(
    password: &str,
    salt: &KdfSalt,
    params: KdfParams,
) -> VaultResult<ProfileKey> {
    let root = stretch(password, salt, params)?;
    Ok(ProfileKey::from_bytes(expand(&root, LABEL_PROFILE_KEY)?))
}
