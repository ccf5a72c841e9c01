//! Vault cryptographic metadata.
//!
//! [`VaultCryptoMeta`] is the single record that makes a vault
//! unlockable: KDF parameters, per-path salts, and the wrapped DEK
//! slots. It contains no plaintext key material — losing it makes the
//! vault unrecoverable, leaking it costs an attacker nothing without a
//! secret to feed the KDF.

use coffre_crypto_core::{DekSlot, KdfAlgorithm};
use serde::{Deserialize, Serialize};

/// Storage identifier for the one-and-only metadata record.
pub const META_ID: &str = "primary";

/// Current metadata schema version.
pub const META_SCHEMA_VERSION: u32 = 1;

/// Salt length in bytes for every KDF path.
pub const SALT_LEN: usize = 16;

/// Vault security posture, chosen at setup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SecurityMode {
    /// Master password and recovery phrase only.
    Strict,
    /// Additionally allows unlock via a hint question/answer pair.
    Relaxed,
}

/// Everything needed to unlock a vault, minus the secrets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultCryptoMeta {
    /// Schema version for forward migrations.
    pub schema_version: u32,
    /// Security posture chosen at setup.
    pub security_mode: SecurityMode,
    /// KDF algorithm and parameters, shared by all unlock paths.
    pub kdf: KdfAlgorithm,
    /// Salt for the master-password derivation.
    pub master_salt: Vec<u8>,
    /// Salt for the recovery-phrase derivation.
    pub recovery_salt: Vec<u8>,
    /// Salt for the hint-answer derivation (relaxed mode only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint_salt: Option<Vec<u8>>,
    /// DEK wrapped under the master key.
    pub master_slot: DekSlot,
    /// DEK wrapped under the recovery key.
    pub recovery_slot: DekSlot,
    /// DEK wrapped under the hint key (relaxed mode only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint_slot: Option<DekSlot>,
    /// The hint question shown at unlock. Never the answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint_question: Option<String>,
    /// ISO 8601 creation timestamp.
    pub created_at: String,
    /// ISO 8601 timestamp of the last rotation (or creation).
    pub updated_at: String,
}

impl VaultCryptoMeta {
    /// `true` when the hint unlock path is configured.
    #[must_use]
    pub const fn has_hint(&self) -> bool {
        self.hint_slot.is_some()
    }
}
