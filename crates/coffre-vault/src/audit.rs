//! Security audit trail.
//!
//! Every security-relevant transition — setup, unlock attempts, locks,
//! rotations, biometric enrollment — appends an [`AuditEvent`]. Events
//! record outcomes and reason codes, never secrets or derived keys.

use crate::util::{generate_uuid, now_iso8601};
use serde::{Deserialize, Serialize};

/// Reason codes for failed events. Stable strings, safe to log.
pub mod reason {
    /// Master password did not unwrap the master slot.
    pub const INVALID_MASTER_PASSWORD: &str = "invalid_master_password";
    /// Recovery phrase was malformed or did not unwrap the recovery slot.
    pub const INVALID_RECOVERY_KEY: &str = "invalid_recovery_key";
    /// Hint answer did not unwrap the hint slot.
    pub const INVALID_HINT_ANSWER: &str = "invalid_hint_answer";
    /// No biometric material is enrolled for this vault.
    pub const BIOMETRIC_MATERIAL_NOT_FOUND: &str = "biometric_material_not_found";
    /// Cached biometric DEK failed round-trip verification.
    pub const BIOMETRIC_DEK_INVALID: &str = "biometric_dek_invalid";
}

/// What kind of transition an event records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuditEventType {
    /// Initial vault setup.
    Setup,
    /// Unlock attempt with the master password.
    UnlockMasterPassword,
    /// Unlock attempt with the recovery phrase.
    UnlockRecoveryKey,
    /// Unlock attempt with the hint answer.
    UnlockHintAnswer,
    /// Unlock attempt with cached biometric material.
    UnlockBiometric,
    /// Explicit or auto-triggered lock.
    Lock,
    /// Master password rotation.
    Rotation,
    /// Biometric material enrolled.
    BiometricEnroll,
    /// Biometric material cleared.
    BiometricClear,
}

/// Whether the recorded transition succeeded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuditResult {
    /// The transition completed.
    Success,
    /// The transition was refused; `reason_code` says why.
    Failure,
}

/// One append-only audit record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    /// Random event ID (UUID).
    pub id: String,
    /// Transition kind.
    pub event_type: AuditEventType,
    /// Outcome.
    pub result: AuditResult,
    /// Machine-readable failure reason; `None` on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<String>,
    /// ISO 8601 timestamp.
    pub created_at: String,
}

impl AuditEvent {
    /// Record a successful transition.
    #[must_use]
    pub fn success(event_type: AuditEventType) -> Self {
        Self {
            id: generate_uuid(),
            event_type,
            result: AuditResult::Success,
            reason_code: None,
            created_at: now_iso8601(),
        }
    }

    /// Record a refused transition with a reason code.
    #[must_use]
    pub fn failure(event_type: AuditEventType, reason_code: &str) -> Self {
        Self {
            id: generate_uuid(),
            event_type,
            result: AuditResult::Failure,
            reason_code: Some(reason_code.to_owned()),
            created_at: now_iso8601(),
        }
    }
}
