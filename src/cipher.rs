//! Profile payload encryption.
//!
//! Profiles are sealed with XChaCha20-Poly1305 under the client-derived
//! [`ProfileKey`], with a fresh random 24-byte nonce per call. The AEAD
//! associated data binds the ciphertext to its owning account via a
//! [`ProfileBinding`], so a blob swapped between records fails
//! authentication instead of decrypting to garbage.
//!
//! The payload is opaque at this layer; validation of the decrypted bytes
//! happens in [`crate::profile`].

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{
    error::VaultError,
    identity::normalize_username,
    types::NONCE_SIZE,
    VaultResult,
};

/// Domain separation label for the AEAD associated data.
const LABEL_PROFILE_AAD: &[u8] = b"planvault:profile";

/// Domain separation label for account bindings.
const LABEL_BINDING: &[u8] = b"planvault:binding";

/// Profile encryption key (256-bit).
///
/// Derived on the client from the password and the per-record salt; never
/// transmitted or persisted. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ProfileKey([u8; 32]);

impl ProfileKey {
    /// Creates a profile key from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns a reference to the raw key bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for ProfileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Binds a ciphertext to the account that owns it.
///
/// Computed from the normalized username alone, so the client can construct
/// it without the server's indexing key:
///
/// ```text
/// binding = SHA256("planvault:binding" || normalize(username))
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileBinding([u8; 32]);

impl ProfileBinding {
    /// Derives the binding for a username.
    #[must_use]
    pub fn for_username(username: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(LABEL_BINDING);
        hasher.update(normalize_username(username).as_bytes());
        let hash = hasher.finalize();

        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hash);
        Self(bytes)
    }

    /// Returns the raw binding bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Constructs the AEAD associated data: `binding || "planvault:profile"`.
fn build_associated_data(binding: &ProfileBinding) -> Vec<u8> {
    let mut aad = Vec::with_capacity(32 + LABEL_PROFILE_AAD.len());
    aad.extend_from_slice(binding.as_bytes());
    aad.extend_from_slice(LABEL_PROFILE_AAD);
    aad
}

/// Generates a random nonce for XChaCha20-Poly1305.
///
/// # Panics
///
/// Panics if the system's random number generator fails.
fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    getrandom::getrandom(&mut nonce).expect("getrandom failed");
    nonce
}

/// Encrypts a profile payload.
///
/// A fresh random nonce is generated per call; it is never reused for a
/// given key.
///
/// # Returns
///
/// A tuple of (nonce, ciphertext with auth tag).
///
/// # Errors
///
/// Returns [`VaultError::EncryptionFailure`] if encryption fails (should
/// not happen with valid inputs).
///
/// # Panics
///
/// This function will not panic — the `expect` is for a condition that
/// cannot fail (key length is always 32 bytes by construction).
pub fn encrypt_profile(
    key: &ProfileKey,
    binding: &ProfileBinding,
    plaintext: &[u8],
) -> VaultResult<([u8; NONCE_SIZE], Vec<u8>)> {
    let cipher =
        XChaCha20Poly1305::new_from_slice(key.as_bytes()).expect("key length is always 32");

    let nonce_bytes = generate_nonce();
    let nonce = XNonce::from_slice(&nonce_bytes);
    let aad = build_associated_data(binding);

    let ciphertext = cipher
        .encrypt(nonce, Payload { msg: plaintext, aad: &aad })
        .map_err(|_| VaultError::EncryptionFailure("XChaCha20-Poly1305 seal failed".to_string()))?;

    Ok((nonce_bytes, ciphertext))
}

/// Decrypts a profile payload.
///
/// # Errors
///
/// Returns [`VaultError::DecryptionFailure`] if authentication fails —
/// wrong key, tampered ciphertext, or a binding that does not match the
/// one used at encryption time.
///
/// # Panics
///
/// This function will not panic — the `expect` is for a condition that
/// cannot fail (key length is always 32 bytes by construction).
pub fn decrypt_profile(
    key: &ProfileKey,
    binding: &ProfileBinding,
    nonce: &[u8; NONCE_SIZE],
    ciphertext: &[u8],
) -> VaultResult<Vec<u8>> {
    let cipher =
        XChaCha20Poly1305::new_from_slice(key.as_bytes()).expect("key length is always 32");

    let nonce = XNonce::from_slice(nonce);
    let aad = build_associated_data(binding);

    cipher
        .decrypt(nonce, Payload { msg: ciphertext, aad: &aad })
        .map_err(|_| VaultError::DecryptionFailure)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> ProfileKey {
        ProfileKey::from_bytes([byte; 32])
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = key(0x42);
        let binding = ProfileBinding::for_username("alice");
        let plaintext = b"{\"semesters\":[]}";

        let (nonce, ciphertext) = encrypt_profile(&key, &binding, plaintext).unwrap();
        assert_ne!(&ciphertext[..plaintext.len()], plaintext);
        assert_eq!(ciphertext.len(), plaintext.len() + 16);

        let decrypted = decrypt_profile(&key, &binding, &nonce, &ciphertext).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn roundtrip_arbitrary_bytes() {
        let key = key(0x42);
        let binding = ProfileBinding::for_username("alice");
        for len in [0usize, 1, 15, 16, 17, 1024] {
            let plaintext: Vec<u8> = (0..len).map(|i| u8::try_from(i % 251).unwrap()).collect();
            let (nonce, ciphertext) = encrypt_profile(&key, &binding, &plaintext).unwrap();
            let decrypted = decrypt_profile(&key, &binding, &nonce, &ciphertext).unwrap();
            assert_eq!(decrypted, plaintext);
        }
    }

    #[test]
    fn nonce_is_fresh_per_call() {
        let key = key(0x42);
        let binding = ProfileBinding::for_username("alice");
        let (n1, c1) = encrypt_profile(&key, &binding, b"same plaintext").unwrap();
        let (n2, c2) = encrypt_profile(&key, &binding, b"same plaintext").unwrap();
        assert_ne!(n1, n2);
        assert_ne!(c1, c2);
    }

    #[test]
    fn wrong_key_fails_explicitly() {
        // AEAD authentication makes a wrong key an explicit failure, never
        // silent garbage.
        let binding = ProfileBinding::for_username("alice");
        let (nonce, ciphertext) = encrypt_profile(&key(0x42), &binding, b"secret").unwrap();

        let result = decrypt_profile(&key(0x43), &binding, &nonce, &ciphertext);
        assert!(matches!(result, Err(VaultError::DecryptionFailure)));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = key(0x42);
        let binding = ProfileBinding::for_username("alice");
        let (nonce, mut ciphertext) = encrypt_profile(&key, &binding, b"secret").unwrap();
        ciphertext[0] ^= 0xFF;

        let result = decrypt_profile(&key, &binding, &nonce, &ciphertext);
        assert!(matches!(result, Err(VaultError::DecryptionFailure)));
    }

    #[test]
    fn ciphertext_cannot_swap_accounts() {
        let key = key(0x42);
        let alice = ProfileBinding::for_username("alice");
        let bob = ProfileBinding::for_username("bob");
        let (nonce, ciphertext) = encrypt_profile(&key, &alice, b"alice's plan").unwrap();

        let result = decrypt_profile(&key, &bob, &nonce, &ciphertext);
        assert!(matches!(result, Err(VaultError::DecryptionFailure)));
    }

    #[test]
    fn binding_follows_username_normalization() {
        assert_eq!(
            ProfileBinding::for_username("Alice "),
            ProfileBinding::for_username("alice")
        );
        assert_ne!(
            ProfileBinding::for_username("alice"),
            ProfileBinding::for_username("bob")
        );
    }
}
