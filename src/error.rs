use thiserror::Error;

/// Errors produced by the credential store.
///
/// Unknown identity and wrong password both surface as
/// [`VaultError::InvalidCredentials`] so callers cannot enumerate usernames.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The username/secret pair did not authenticate. Deliberately does not
    /// distinguish an unknown identity from a wrong password.
    #[error("invalid_credentials")]
    InvalidCredentials,

    /// Registration collided with an existing identity.
    #[error("duplicate_identity")]
    DuplicateIdentity,

    /// No record exists for the identity (mapped to a 404 at the edge).
    #[error("identity_not_found")]
    IdentityNotFound,

    /// The session marker is missing, expired, or revoked.
    #[error("invalid_session")]
    InvalidSession,

    /// Client-side decryption failed. Indistinguishable from a wrong
    /// password at this layer; surfaced to the end user as such.
    #[error("decryption_failure")]
    DecryptionFailure,

    /// The decrypted bytes were not a valid profile payload.
    #[error("invalid_payload: {0}")]
    InvalidPayload(String),

    /// A request field is missing or malformed.
    #[error("invalid_input '{field}': {reason}")]
    InvalidInput {
        /// Name of the offending field.
        field: &'static str,
        /// Description of the issue.
        reason: String,
    },

    /// Encryption failed.
    #[error("encryption_failure: {0}")]
    EncryptionFailure(String),

    /// Key stretching or expansion failed.
    #[error("key_derivation_failure: {0}")]
    KeyDerivation(String),

    /// Serializing the profile payload failed.
    #[error("serialization_failure: {0}")]
    Serialization(String),

    /// The backing store is temporarily unavailable (5xx-class; not retried
    /// by this layer).
    #[error("store_unavailable: {0}")]
    StoreUnavailable(String),

    /// An invariant was violated internally.
    #[error("internal: {0}")]
    Internal(String),
}
