//! The academic-plan payload.
//!
//! The server treats this as opaque ciphertext; only the client ever sees
//! these types populated.

use serde::{Deserialize, Serialize};

use crate::{error::VaultError, VaultResult};

/// Current version of the profile payload schema.
pub const PROFILE_SCHEMA_VERSION: u32 = 1;

/// One planned semester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Semester {
    /// Display label, e.g. "Fall 2026".
    pub label: String,
    /// Course identifiers planned for this semester.
    pub courses: Vec<String>,
}

/// A student's degree plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanProfile {
    /// Payload schema version for migration support.
    pub schema_version: u32,
    /// Planned semesters in chronological order.
    pub semesters: Vec<Semester>,
}

impl PlanProfile {
    /// Creates an empty plan at the current schema version.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            schema_version: PROFILE_SCHEMA_VERSION,
            semesters: Vec::new(),
        }
    }

    /// Serializes the plan to its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Serialization`] if encoding fails.
    pub fn to_bytes(&self) -> VaultResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| VaultError::Serialization(e.to_string()))
    }

    /// Parses and validates a decrypted payload.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidPayload`] if the bytes are not valid
    /// JSON for this type, or if the embedded schema version is newer than
    /// this library supports.
    pub fn from_bytes(bytes: &[u8]) -> VaultResult<Self> {
        let profile: Self = serde_json::from_slice(bytes)
            .map_err(|e| VaultError::InvalidPayload(format!("malformed payload: {e}")))?;

        if profile.schema_version > PROFILE_SCHEMA_VERSION {
            return Err(VaultError::InvalidPayload(format!(
                "unsupported schema version {} (max {PROFILE_SCHEMA_VERSION})",
                profile.schema_version
            )));
        }
        Ok(profile)
    }
}

impl Default for PlanProfile {
    fn default() -> Self {
        Self::new()
    }
}
