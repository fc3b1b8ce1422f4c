//! Tuning parameters for key stretching and sessions.

use crate::{error::VaultError, VaultResult};

/// Argon2id cost parameters.
///
/// Used both for the server-side password verifier and for the client-side
/// profile key derivation. The cost is a deliberate brute-force deterrent:
/// it makes every hash and verify CPU-bound for tens to low-hundreds of
/// milliseconds and must not be lowered outside tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub mem_kib: u32,
    /// Number of passes over memory.
    pub time_cost: u32,
    /// Degree of parallelism.
    pub lanes: u32,
}

impl KdfParams {
    /// Output length of the stretched key in bytes.
    pub const OUTPUT_LEN: usize = 32;

    /// Converts to `argon2` parameters with a fixed 32-byte output.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::KeyDerivation`] if the parameter combination is
    /// rejected by the `argon2` crate.
    pub fn to_argon2(self) -> VaultResult<argon2::Params> {
        argon2::Params::new(self.mem_kib, self.time_cost, self.lanes, Some(Self::OUTPUT_LEN))
            .map_err(|e| VaultError::KeyDerivation(format!("invalid argon2 params: {e}")))
    }

    /// Minimal-cost parameters for unit tests.
    ///
    /// **FOR TESTING ONLY** — these provide no brute-force resistance.
    #[must_use]
    pub const fn fast_insecure() -> Self {
        Self {
            mem_kib: 8,
            time_cost: 1,
            lanes: 1,
        }
    }
}

impl Default for KdfParams {
    /// 64 MiB, three passes, one lane.
    fn default() -> Self {
        Self {
            mem_kib: 64 * 1024,
            time_cost: 3,
            lanes: 1,
        }
    }
}

/// Configuration for a [`crate::PlannerVault`] instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaultConfig {
    /// Cost parameters for the server-side password verifier.
    pub verifier_params: KdfParams,
    /// Lifetime of an authenticated session in seconds.
    pub session_ttl_secs: u64,
}

impl VaultConfig {
    /// Low-cost configuration for unit tests.
    ///
    /// **FOR TESTING ONLY.**
    #[must_use]
    pub const fn fast_insecure() -> Self {
        Self {
            verifier_params: KdfParams::fast_insecure(),
            session_ttl_secs: 1800,
        }
    }
}

impl Default for VaultConfig {
    /// Default verifier cost and a 30-minute session lifetime.
    fn default() -> Self {
        Self {
            verifier_params: KdfParams::default(),
            session_ttl_secs: 1800,
        }
    }
}
