//! Password verification.
//!
//! This is the only place the client's authentication secret is evaluated
//! against stored state. The verifier is an Argon2id hash with a fresh
//! random salt generated per call and embedded in the PHC string, so two
//! registrations with the same password never produce equal verifiers.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Version,
};

use crate::{config::KdfParams, error::VaultError, types::VerifierString, VaultResult};

/// Randomized slow hashing and constant-time verification of passwords.
pub struct CredentialVerifier {
    argon2: Argon2<'static>,
}

impl CredentialVerifier {
    /// Creates a verifier with the given cost parameters.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::KeyDerivation`] if the parameters are invalid.
    pub fn new(params: KdfParams) -> VaultResult<Self> {
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params.to_argon2()?),
        })
    }

    /// Hashes a secret into a verifier with a fresh random salt.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::KeyDerivation`] if hashing fails.
    pub fn hash(&self, secret: &[u8]) -> VaultResult<VerifierString> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(secret, &salt)
            .map_err(|e| VaultError::KeyDerivation(format!("argon2 hash failed: {e}")))?;
        Ok(VerifierString::new(hash.to_string()))
    }

    /// Checks a secret against a stored verifier.
    ///
    /// Comparison is constant-time with respect to early mismatch (the
    /// `argon2` crate re-derives the full hash before comparing). A
    /// malformed or corrupt verifier yields `false`, never an error.
    #[must_use]
    pub fn verify(&self, secret: &[u8], verifier: &VerifierString) -> bool {
        let Ok(parsed) = PasswordHash::new(verifier.as_str()) else {
            return false;
        };
        self.argon2.verify_password(secret, &parsed).is_ok()
    }
}

impl std::fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVerifier").finish_non_exhaustive()
    }
}
