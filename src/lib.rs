//! Encrypted-profile credential store for a student degree-planning app.
//!
//! The store never sees a username or a password in a form it could persist:
//!
//! 1. **Pseudonymous lookup** — records are keyed by an [`IdentityToken`]
//!    derived from the username under a server-held indexing key. No reverse
//!    mapping exists anywhere in the system.
//!
//! 2. **Password verification** — the server holds only an Argon2id
//!    verifier. The value the client sends for authentication is itself a
//!    derived secret, domain-separated from the profile encryption key.
//!
//! 3. **Client-side profile encryption** — the academic plan is sealed with
//!    XChaCha20-Poly1305 under a key derived on the client from the password
//!    and a per-record salt. The server stores `(salt, nonce, ciphertext)`
//!    and can never decrypt.
//!
//! # Architecture
//!
//! The crate is split along the trust boundary:
//!
//! - Server side: [`IdentityHasher`], [`CredentialVerifier`], the
//!   [`ProfileStore`] trait with its in-memory implementation, the
//!   [`SessionManager`], and the [`PlannerVault`] service that orchestrates
//!   registration, login, and profile updates.
//! - Client side: [`kdf`] key derivation, [`cipher`] profile sealing, and
//!   the [`ProfileClient`] helper that drives the full enrollment and
//!   decryption flows.
//!
//! Persistence and locking are trait seams ([`ProfileStore`],
//! [`IdentityLockManager`]) so deployments can bring their own backend.

#![deny(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod cipher;
pub mod client;
pub mod config;
mod error;
pub mod identity;
pub mod kdf;
pub mod profile;
pub mod service;
pub mod session;
pub mod store;
mod types;
pub mod verifier;

pub use client::ProfileClient;
pub use config::{KdfParams, VaultConfig};
pub use error::VaultError;
pub use identity::IdentityHasher;
pub use kdf::AuthSecret;
pub use profile::PlanProfile;
pub use service::{LoginSuccess, PasswordRotation, PlannerVault, RegisterRequest};
pub use session::{SessionManager, SessionToken};
pub use store::{IdentityLockManager, MemoryLockManager, MemoryProfileStore, ProfileStore};
pub use types::{IdentityToken, KdfSalt, ProfileRecord, VerifierString, NONCE_SIZE};
pub use verifier::CredentialVerifier;

/// Result type alias for credential store operations.
pub type VaultResult<T> = Result<T, VaultError>;
