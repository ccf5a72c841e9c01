//! Key derivation from low-entropy secrets.
//!
//! Two algorithms are supported:
//! - **Argon2id** — the default for new vaults. Memory-hard, which is
//!   what matters when master-password guessing is the main threat.
//! - **PBKDF2** — legacy/back-compat path for vaults created before
//!   the Argon2id switch.
//!
//! The full parameter set travels with the vault metadata, so unlock
//! always reproduces the exact key used at wrap time.

use crate::error::CryptoError;
use crate::memory::SecretBytes;
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Sha512};
use zeroize::Zeroize;

/// Derived key length in bytes (256 bits).
pub const DERIVED_KEY_LEN: usize = 32;

/// Minimum salt length in bytes.
pub const MIN_SALT_LEN: usize = 16;

/// Default Argon2id memory cost: 64 MiB in KiB.
const DEFAULT_M_COST: u32 = 65_536;

/// Default Argon2id iteration count.
const DEFAULT_T_COST: u32 = 3;

/// Default Argon2id parallelism.
const DEFAULT_P_COST: u32 = 4;

// ---------------------------------------------------------------------------
// Parameter types
// ---------------------------------------------------------------------------

/// Argon2id parameter set, `argon2` crate conventions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Argon2idParams {
    /// Memory cost in kibibytes (64 MiB = `65_536`).
    pub m_cost: u32,
    /// Number of iterations.
    pub t_cost: u32,
    /// Degree of parallelism.
    pub p_cost: u32,
}

impl Default for Argon2idParams {
    fn default() -> Self {
        Self {
            m_cost: DEFAULT_M_COST,
            t_cost: DEFAULT_T_COST,
            p_cost: DEFAULT_P_COST,
        }
    }
}

/// Digest choices for the PBKDF2 legacy path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Pbkdf2Digest {
    /// HMAC-SHA256.
    Sha256,
    /// HMAC-SHA512.
    Sha512,
}

/// PBKDF2 parameter set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pbkdf2Params {
    /// Iteration count (must be non-zero).
    pub iterations: u32,
    /// HMAC digest.
    pub digest: Pbkdf2Digest,
}

/// KDF algorithm selector — serialized into vault metadata as
/// `{ "kdfType": ..., "kdfParams": { ... } }`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kdfType", content = "kdfParams", rename_all = "camelCase")]
pub enum KdfAlgorithm {
    /// Argon2id (default for new vaults).
    Argon2id(Argon2idParams),
    /// PBKDF2 (legacy vaults only).
    Pbkdf2(Pbkdf2Params),
}

impl KdfAlgorithm {
    /// The algorithm new vaults are created with.
    #[must_use]
    pub fn default_for_new_vaults() -> Self {
        Self::Argon2id(Argon2idParams::default())
    }
}

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// Derive a 256-bit key from a secret and salt.
///
/// Deterministic: the same `(secret, salt, algorithm)` triple always
/// yields the same key. Unsupported or malformed parameters are a
/// programmer error surfaced as [`CryptoError::KeyDerivation`], never
/// a user-facing authentication failure.
///
/// # Errors
///
/// Returns [`CryptoError::KeyDerivation`] if the salt is shorter than
/// [`MIN_SALT_LEN`], the parameters are invalid, or derivation fails.
pub fn derive_key(
    secret: &[u8],
    salt: &[u8],
    algorithm: &KdfAlgorithm,
) -> Result<SecretBytes<DERIVED_KEY_LEN>, CryptoError> {
    if salt.len() < MIN_SALT_LEN {
        return Err(CryptoError::KeyDerivation(format!(
            "salt too short: {} bytes (minimum {MIN_SALT_LEN})",
            salt.len()
        )));
    }

    let mut output = [0u8; DERIVED_KEY_LEN];
    match algorithm {
        KdfAlgorithm::Argon2id(params) => derive_argon2id(secret, salt, params, &mut output)?,
        KdfAlgorithm::Pbkdf2(params) => derive_pbkdf2(secret, salt, params, &mut output)?,
    }

    let key = SecretBytes::new(output);
    output.zeroize();
    Ok(key)
}

fn derive_argon2id(
    secret: &[u8],
    salt: &[u8],
    params: &Argon2idParams,
    output: &mut [u8; DERIVED_KEY_LEN],
) -> Result<(), CryptoError> {
    let argon2_params = argon2::Params::new(
        params.m_cost,
        params.t_cost,
        params.p_cost,
        Some(DERIVED_KEY_LEN),
    )
    .map_err(|e| CryptoError::KeyDerivation(format!("invalid argon2 params: {e}")))?;

    let argon2 = argon2::Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        argon2_params,
    );

    argon2
        .hash_password_into(secret, salt, output)
        .map_err(|e| CryptoError::KeyDerivation(format!("argon2id derivation failed: {e}")))
}

fn derive_pbkdf2(
    secret: &[u8],
    salt: &[u8],
    params: &Pbkdf2Params,
    output: &mut [u8; DERIVED_KEY_LEN],
) -> Result<(), CryptoError> {
    if params.iterations == 0 {
        return Err(CryptoError::KeyDerivation(
            "pbkdf2 iterations must be non-zero".into(),
        ));
    }
    match params.digest {
        Pbkdf2Digest::Sha256 => {
            pbkdf2::pbkdf2_hmac::<Sha256>(secret, salt, params.iterations, output);
        }
        Pbkdf2Digest::Sha512 => {
            pbkdf2::pbkdf2_hmac::<Sha512>(secret, salt, params.iterations, output);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Tiny parameters so tests stay fast — never use in production.
    fn test_argon2id() -> KdfAlgorithm {
        KdfAlgorithm::Argon2id(Argon2idParams {
            m_cost: 32,
            t_cost: 1,
            p_cost: 1,
        })
    }

    fn test_pbkdf2() -> KdfAlgorithm {
        KdfAlgorithm::Pbkdf2(Pbkdf2Params {
            iterations: 10,
            digest: Pbkdf2Digest::Sha256,
        })
    }

    const TEST_SALT: &[u8; 16] = b"0123456789abcdef";

    #[test]
    fn argon2id_produces_32_bytes() {
        let key = derive_key(b"password", TEST_SALT, &test_argon2id())
            .expect("derive should succeed");
        assert_eq!(key.expose().len(), 32);
    }

    #[test]
    fn argon2id_is_deterministic() {
        let a = derive_key(b"password", TEST_SALT, &test_argon2id())
            .expect("derive should succeed");
        let b = derive_key(b"password", TEST_SALT, &test_argon2id())
            .expect("derive should succeed");
        assert_eq!(a.expose(), b.expose());
    }

    #[test]
    fn pbkdf2_is_deterministic() {
        let a = derive_key(b"password", TEST_SALT, &test_pbkdf2()).expect("derive should succeed");
        let b = derive_key(b"password", TEST_SALT, &test_pbkdf2()).expect("derive should succeed");
        assert_eq!(a.expose(), b.expose());
    }

    #[test]
    fn algorithms_disagree() {
        let a = derive_key(b"password", TEST_SALT, &test_argon2id())
            .expect("derive should succeed");
        let b = derive_key(b"password", TEST_SALT, &test_pbkdf2()).expect("derive should succeed");
        assert_ne!(a.expose(), b.expose());
    }

    #[test]
    fn different_salts_differ() {
        let a = derive_key(b"password", b"salt_aaaaaaaaaaaa", &test_argon2id())
            .expect("derive should succeed");
        let b = derive_key(b"password", b"salt_bbbbbbbbbbbb", &test_argon2id())
            .expect("derive should succeed");
        assert_ne!(a.expose(), b.expose());
    }

    #[test]
    fn different_secrets_differ() {
        let a = derive_key(b"password_a", TEST_SALT, &test_argon2id())
            .expect("derive should succeed");
        let b = derive_key(b"password_b", TEST_SALT, &test_argon2id())
            .expect("derive should succeed");
        assert_ne!(a.expose(), b.expose());
    }

    #[test]
    fn short_salt_rejected() {
        let err = derive_key(b"password", b"short", &test_argon2id())
            .expect_err("short salt should fail");
        assert!(format!("{err}").contains("salt too short"));
    }

    #[test]
    fn zero_pbkdf2_iterations_rejected() {
        let algorithm = KdfAlgorithm::Pbkdf2(Pbkdf2Params {
            iterations: 0,
            digest: Pbkdf2Digest::Sha256,
        });
        let result = derive_key(b"password", TEST_SALT, &algorithm);
        assert!(matches!(result, Err(CryptoError::KeyDerivation(_))));
    }

    #[test]
    fn kdf_algorithm_serde_shape() {
        let json = serde_json::to_value(KdfAlgorithm::default_for_new_vaults())
            .expect("serialize should succeed");
        assert_eq!(json["kdfType"], "argon2id");
        assert_eq!(json["kdfParams"]["mCost"], 65_536);
    }

    #[test]
    fn kdf_algorithm_serde_roundtrip() {
        for algorithm in [test_argon2id(), test_pbkdf2()] {
            let json = serde_json::to_string(&algorithm).expect("serialize should succeed");
            let back: KdfAlgorithm =
                serde_json::from_str(&json).expect("deserialize should succeed");
            assert_eq!(back, algorithm);
        }
    }
}
