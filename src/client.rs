//! Client-side flow driver.
//!
//! [`ProfileClient`] runs everything that must happen on the machine holding
//! the real password: key derivation, profile sealing, and the assembly of
//! the request payloads the service accepts. The password itself never
//! appears in any type this module produces.

use zeroize::Zeroizing;

use crate::{
    cipher::{self, ProfileBinding},
    config::KdfParams,
    kdf::{self, AuthSecret},
    profile::PlanProfile,
    service::{LoginSuccess, PasswordRotation, RegisterRequest},
    types::{KdfSalt, NONCE_SIZE},
    VaultResult,
};

/// Drives the client half of the protocol.
///
/// The cost parameters must match across enrollment and later logins for
/// the same record, since the salt-stretched derivation is deterministic in
/// them.
#[derive(Debug, Clone, Copy)]
pub struct ProfileClient {
    params: KdfParams,
}

impl ProfileClient {
    /// Creates a client with the given derivation cost.
    #[must_use]
    pub const fn new(params: KdfParams) -> Self {
        Self { params }
    }

    /// Builds a registration request for a new account.
    ///
    /// Generates the record's salt, derives both secrets from the password,
    /// and seals the initial profile. The salt is created exactly once here
    /// and reused verbatim for every later derivation until a password
    /// rotation replaces it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::VaultError::KeyDerivation`] if derivation fails,
    /// [`crate::VaultError::Serialization`] if the profile cannot be
    /// encoded, or [`crate::VaultError::EncryptionFailure`] if sealing
    /// fails.
    ///
    /// # Panics
    ///
    /// Panics if the system's random number generator fails.
    pub fn enroll(
        &self,
        username: &str,
        password: &str,
        profile: &PlanProfile,
    ) -> VaultResult<RegisterRequest> {
        let salt = KdfSalt::generate();
        let auth_secret = kdf::derive_auth_secret(password, &salt, self.params)?;
        let key = kdf::derive_profile_key(password, &salt, self.params)?;

        let binding = ProfileBinding::for_username(username);
        let plaintext = Zeroizing::new(profile.to_bytes()?);
        let (nonce, ciphertext) = cipher::encrypt_profile(&key, &binding, &plaintext)?;

        Ok(RegisterRequest {
            username: username.to_string(),
            auth_secret,
            salt,
            nonce,
            ciphertext,
            schema_version: profile.schema_version,
        })
    }

    /// Derives the authentication secret for a login attempt.
    ///
    /// # Errors
    ///
    /// Returns [`crate::VaultError::KeyDerivation`] if derivation fails.
    pub fn auth_secret(&self, password: &str, salt: &KdfSalt) -> VaultResult<AuthSecret> {
        kdf::derive_auth_secret(password, salt, self.params)
    }

    /// Decrypts and parses the profile returned by a successful login.
    ///
    /// # Errors
    ///
    /// Returns [`crate::VaultError::DecryptionFailure`] if the ciphertext
    /// does not authenticate under the derived key, or
    /// [`crate::VaultError::InvalidPayload`] if the decrypted bytes are not
    /// a valid profile.
    pub fn open_profile(
        &self,
        username: &str,
        password: &str,
        login: &LoginSuccess,
    ) -> VaultResult<PlanProfile> {
        let key = kdf::derive_profile_key(password, &login.salt, self.params)?;
        let binding = ProfileBinding::for_username(username);

        let plaintext = Zeroizing::new(cipher::decrypt_profile(
            &key,
            &binding,
            &login.nonce,
            &login.ciphertext,
        )?);
        PlanProfile::from_bytes(&plaintext)
    }

    /// Seals an updated profile for [`crate::PlannerVault::update_profile`].
    ///
    /// Reuses the record's existing salt; only the nonce and ciphertext
    /// change.
    ///
    /// # Errors
    ///
    /// Returns [`crate::VaultError::KeyDerivation`],
    /// [`crate::VaultError::Serialization`], or
    /// [`crate::VaultError::EncryptionFailure`] on the respective failures.
    pub fn seal_profile(
        &self,
        username: &str,
        password: &str,
        salt: &KdfSalt,
        profile: &PlanProfile,
    ) -> VaultResult<([u8; NONCE_SIZE], Vec<u8>)> {
        let key = kdf::derive_profile_key(password, salt, self.params)?;
        let binding = ProfileBinding::for_username(username);
        let plaintext = Zeroizing::new(profile.to_bytes()?);
        cipher::encrypt_profile(&key, &binding, &plaintext)
    }

    /// Prepares a password rotation.
    ///
    /// Generates a fresh salt for the new password, derives the new
    /// authentication secret, and re-encrypts the profile under the new
    /// key. The caller must already hold the decrypted profile (from
    /// [`Self::open_profile`]); the old password is not needed here.
    ///
    /// # Errors
    ///
    /// Returns [`crate::VaultError::KeyDerivation`],
    /// [`crate::VaultError::Serialization`], or
    /// [`crate::VaultError::EncryptionFailure`] on the respective failures.
    ///
    /// # Panics
    ///
    /// Panics if the system's random number generator fails.
    pub fn rotate_password(
        &self,
        username: &str,
        new_password: &str,
        profile: &PlanProfile,
    ) -> VaultResult<PasswordRotation> {
        let salt = KdfSalt::generate();
        let auth_secret = kdf::derive_auth_secret(new_password, &salt, self.params)?;
        let key = kdf::derive_profile_key(new_password, &salt, self.params)?;

        let binding = ProfileBinding::for_username(username);
        let plaintext = Zeroizing::new(profile.to_bytes()?);
        let (nonce, ciphertext) = cipher::encrypt_profile(&key, &binding, &plaintext)?;

        Ok(PasswordRotation {
            auth_secret,
            salt,
            nonce,
            ciphertext,
            schema_version: profile.schema_version,
        })
    }
}

impl Default for ProfileClient {
    fn default() -> Self {
        Self::new(KdfParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VaultError;
    use crate::profile::Semester;

    fn client() -> ProfileClient {
        ProfileClient::new(KdfParams::fast_insecure())
    }

    fn plan() -> PlanProfile {
        PlanProfile {
            schema_version: 1,
            semesters: vec![Semester {
                label: "Fall 2026".to_string(),
                courses: vec!["CS 101".to_string()],
            }],
        }
    }

    #[test]
    fn enroll_produces_decryptable_payload() {
        let client = client();
        let request = client.enroll("alice", "S3cret!", &plan()).unwrap();

        let login = LoginSuccess {
            salt: request.salt,
            nonce: request.nonce,
            ciphertext: request.ciphertext.clone(),
            schema_version: request.schema_version,
            session: crate::SessionToken::generate(),
        };
        let opened = client.open_profile("alice", "S3cret!", &login).unwrap();
        assert_eq!(opened, plan());
    }

    #[test]
    fn enroll_uses_fresh_salt_per_call() {
        let client = client();
        let a = client.enroll("alice", "S3cret!", &plan()).unwrap();
        let b = client.enroll("alice", "S3cret!", &plan()).unwrap();
        assert_ne!(a.salt, b.salt);
    }

    #[test]
    fn wrong_password_cannot_open_profile() {
        let client = client();
        let request = client.enroll("alice", "S3cret!", &plan()).unwrap();

        let login = LoginSuccess {
            salt: request.salt,
            nonce: request.nonce,
            ciphertext: request.ciphertext,
            schema_version: request.schema_version,
            session: crate::SessionToken::generate(),
        };
        let result = client.open_profile("alice", "wrong", &login);
        assert!(matches!(result, Err(VaultError::DecryptionFailure)));
    }

    #[test]
    fn rotation_changes_salt_and_secret() {
        let client = client();
        let request = client.enroll("alice", "old-password", &plan()).unwrap();
        let rotation = client
            .rotate_password("alice", "new-password", &plan())
            .unwrap();

        assert_ne!(rotation.salt, request.salt);
        assert_ne!(rotation.auth_secret, request.auth_secret);

        // Profile decrypts under the new password and salt.
        let login = LoginSuccess {
            salt: rotation.salt,
            nonce: rotation.nonce,
            ciphertext: rotation.ciphertext,
            schema_version: rotation.schema_version,
            session: crate::SessionToken::generate(),
        };
        let opened = client.open_profile("alice", "new-password", &login).unwrap();
        assert_eq!(opened, plan());
    }
}
