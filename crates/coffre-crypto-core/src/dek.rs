//! DEK wrapping — three independent unwrap paths to one key.
//!
//! The data-encryption key is wrapped separately under the master,
//! recovery, and (optionally) hint derived keys. Every path shares one
//! wrap/unwrap routine, parameterized by [`WrappedBy`]; each path uses
//! a distinct AAD tag so a slot produced for one path can never be
//! unwrapped as another.
//!
//! ```text
//! master key   ──► wraps ──► DEK
//! recovery key ──► wraps ──► DEK (same bytes)
//! hint key     ──► wraps ──► DEK (same bytes, relaxed mode only)
//! ```

use crate::envelope::{self, WrappedData};
use crate::error::CryptoError;
use crate::memory::SecretBytes;
use serde::{Deserialize, Serialize};

/// Data-encryption key length in bytes (256 bits).
pub const DEK_LEN: usize = 32;

/// Wrapping key length in bytes (256 bits).
pub const WRAPPING_KEY_LEN: usize = 32;

/// Which derived key a DEK slot is wrapped under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WrappedBy {
    /// Master-password derived key.
    Master,
    /// Recovery-phrase derived key.
    Recovery,
    /// Hint-answer derived key (relaxed security mode only).
    Hint,
}

impl WrappedBy {
    /// AAD tag for AES-256-GCM domain separation between paths.
    #[must_use]
    pub const fn aad_tag(self) -> &'static [u8] {
        match self {
            Self::Master => b"coffre-dek-master",
            Self::Recovery => b"coffre-dek-recovery",
            Self::Hint => b"coffre-dek-hint",
        }
    }

    /// Stable string identifier (audit records, logs).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::Recovery => "recovery",
            Self::Hint => "hint",
        }
    }
}

/// One wrapped copy of the DEK.
#[must_use = "a DEK slot must be persisted in the vault metadata"]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DekSlot {
    /// The unlock path this slot serves.
    pub wrapped_by: WrappedBy,
    /// The DEK encrypted under the path's derived key.
    pub data: WrappedData,
}

/// Wrap the DEK under a derived key for the given path.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidKeyMaterial`] if either key is not
/// exactly 32 bytes, or [`CryptoError::Encryption`] if sealing fails.
pub fn wrap_dek(
    dek: &[u8],
    wrapping_key: &[u8],
    wrapped_by: WrappedBy,
) -> Result<DekSlot, CryptoError> {
    if dek.len() != DEK_LEN {
        return Err(CryptoError::InvalidKeyMaterial(format!(
            "invalid DEK length: {} bytes (expected {DEK_LEN})",
            dek.len()
        )));
    }
    if wrapping_key.len() != WRAPPING_KEY_LEN {
        return Err(CryptoError::InvalidKeyMaterial(format!(
            "invalid wrapping key length: {} bytes (expected {WRAPPING_KEY_LEN})",
            wrapping_key.len()
        )));
    }

    let data = envelope::encrypt(dek, wrapping_key, wrapped_by.aad_tag())?;
    Ok(DekSlot { wrapped_by, data })
}

/// Unwrap a DEK slot with the derived key for its path.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidKeyMaterial`] on a bad wrapping-key
/// length and [`CryptoError::AuthenticationFailed`] when the key is
/// wrong, the slot is tampered, or the path does not match.
pub fn unwrap_dek(slot: &DekSlot, wrapping_key: &[u8]) -> Result<SecretBytes<DEK_LEN>, CryptoError> {
    if wrapping_key.len() != WRAPPING_KEY_LEN {
        return Err(CryptoError::InvalidKeyMaterial(format!(
            "invalid wrapping key length: {} bytes (expected {WRAPPING_KEY_LEN})",
            wrapping_key.len()
        )));
    }

    let plain = envelope::decrypt(&slot.data, wrapping_key, slot.wrapped_by.aad_tag())?;
    SecretBytes::from_slice(plain.expose())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const DEK: [u8; DEK_LEN] = [0xD0; DEK_LEN];
    const WRAP_KEY: [u8; WRAPPING_KEY_LEN] = [0x77; WRAPPING_KEY_LEN];
    const WRONG_KEY: [u8; WRAPPING_KEY_LEN] = [0x78; WRAPPING_KEY_LEN];

    #[test]
    fn wrap_unwrap_all_paths() {
        for path in [WrappedBy::Master, WrappedBy::Recovery, WrappedBy::Hint] {
            let slot = wrap_dek(&DEK, &WRAP_KEY, path).expect("wrap should succeed");
            assert_eq!(slot.wrapped_by, path);
            let dek = unwrap_dek(&slot, &WRAP_KEY).expect("unwrap should succeed");
            assert_eq!(dek.expose(), &DEK);
        }
    }

    #[test]
    fn wrong_key_fails() {
        let slot = wrap_dek(&DEK, &WRAP_KEY, WrappedBy::Master).expect("wrap should succeed");
        let result = unwrap_dek(&slot, &WRONG_KEY);
        assert!(matches!(result, Err(CryptoError::AuthenticationFailed)));
    }

    #[test]
    fn cross_path_unwrap_fails() {
        let slot = wrap_dek(&DEK, &WRAP_KEY, WrappedBy::Master).expect("wrap should succeed");
        let forged = DekSlot {
            wrapped_by: WrappedBy::Recovery,
            data: slot.data,
        };
        let result = unwrap_dek(&forged, &WRAP_KEY);
        assert!(matches!(result, Err(CryptoError::AuthenticationFailed)));
    }

    #[test]
    fn tampered_slot_fails() {
        let mut slot = wrap_dek(&DEK, &WRAP_KEY, WrappedBy::Recovery).expect("wrap should succeed");
        if let Some(byte) = slot.data.ciphertext.first_mut() {
            *byte ^= 0xFF;
        }
        let result = unwrap_dek(&slot, &WRAP_KEY);
        assert!(matches!(result, Err(CryptoError::AuthenticationFailed)));
    }

    #[test]
    fn bad_lengths_rejected() {
        assert!(matches!(
            wrap_dek(&[0u8; 31], &WRAP_KEY, WrappedBy::Master),
            Err(CryptoError::InvalidKeyMaterial(_))
        ));
        assert!(matches!(
            wrap_dek(&DEK, &[0u8; 33], WrappedBy::Master),
            Err(CryptoError::InvalidKeyMaterial(_))
        ));
        let slot = wrap_dek(&DEK, &WRAP_KEY, WrappedBy::Master).expect("wrap should succeed");
        assert!(matches!(
            unwrap_dek(&slot, &[0u8; 16]),
            Err(CryptoError::InvalidKeyMaterial(_))
        ));
    }

    #[test]
    fn independent_slots_share_one_dek() {
        let master = wrap_dek(&DEK, &[0x01; 32], WrappedBy::Master).expect("wrap should succeed");
        let recovery =
            wrap_dek(&DEK, &[0x02; 32], WrappedBy::Recovery).expect("wrap should succeed");
        let hint = wrap_dek(&DEK, &[0x03; 32], WrappedBy::Hint).expect("wrap should succeed");

        let a = unwrap_dek(&master, &[0x01; 32]).expect("unwrap should succeed");
        let b = unwrap_dek(&recovery, &[0x02; 32]).expect("unwrap should succeed");
        let c = unwrap_dek(&hint, &[0x03; 32]).expect("unwrap should succeed");
        assert_eq!(a.expose(), b.expose());
        assert_eq!(b.expose(), c.expose());
    }

    #[test]
    fn slot_serde_roundtrip() {
        let slot = wrap_dek(&DEK, &WRAP_KEY, WrappedBy::Hint).expect("wrap should succeed");
        let json = serde_json::to_string(&slot).expect("serialize should succeed");
        let back: DekSlot = serde_json::from_str(&json).expect("deserialize should succeed");
        assert_eq!(back, slot);
        let dek = unwrap_dek(&back, &WRAP_KEY).expect("unwrap should succeed");
        assert_eq!(dek.expose(), &DEK);
    }
}
