//! Wire protocol between the controller and the key-custody worker.
//!
//! Newline-delimited JSON over the worker's stdin/stdout. One request
//! line produces exactly one response line, correlated by `id`:
//!
//! ```text
//! → {"id":1,"action":"unlockWithMasterPassword","payload":{...}}
//! ← {"id":1,"ok":true,"result":{}}
//! ← {"id":2,"ok":false,"error":{"code":"invalid_secret","message":"invalid secret"}}
//! ```
//!
//! Binary fields travel base64-encoded. Errors cross as stable code
//! strings (see [`coffre_vault::VaultError::code`]), never as
//! secret-derived detail.

use coffre_vault::{HintConfig, VaultCryptoMeta, VaultError, VaultItemSecret};
use serde::{Deserialize, Serialize};

/// Base64 (de)serialization for byte fields on the wire.
pub mod b64 {
    use data_encoding::BASE64;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Encode bytes as a base64 string.
    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        BASE64.encode(bytes).serialize(serializer)
    }

    /// Decode a base64 string into bytes.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// Hint configuration as it crosses the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireHint {
    /// Question stored in plaintext metadata.
    pub question: String,
    /// Answer, consumed for derivation and never persisted.
    pub answer: String,
}

impl From<&WireHint> for HintConfig {
    fn from(wire: &WireHint) -> Self {
        Self {
            question: wire.question.clone(),
            answer: wire.answer.clone(),
        }
    }
}

/// Every operation the worker performs.
///
/// The worker is storage-free: metadata and item records arrive in
/// the request and updated versions return in the result. Only the
/// DEK stays behind.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "action", content = "payload", rename_all = "camelCase")]
pub enum Action {
    /// Create the key hierarchy for a new vault; leaves the worker
    /// unlocked with the fresh DEK.
    #[serde(rename_all = "camelCase")]
    SetupMasterPassword {
        /// The chosen master password.
        master_password: String,
        /// Optional hint pair; presence selects relaxed mode.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hint: Option<WireHint>,
    },
    /// Unlock by master password.
    #[serde(rename_all = "camelCase")]
    UnlockWithMasterPassword {
        /// Current vault metadata.
        meta: VaultCryptoMeta,
        /// The presented password.
        master_password: String,
    },
    /// Unlock by recovery phrase.
    #[serde(rename_all = "camelCase")]
    UnlockWithRecoveryKey {
        /// Current vault metadata.
        meta: VaultCryptoMeta,
        /// The presented phrase (dashes and case are forgiven).
        recovery_phrase: String,
    },
    /// Unlock by hint answer (relaxed mode only).
    #[serde(rename_all = "camelCase")]
    UnlockWithHintAnswer {
        /// Current vault metadata.
        meta: VaultCryptoMeta,
        /// The presented answer, normalized worker-side.
        hint_answer: String,
    },
    /// Rotate to a new master password: new DEK, rewrapped item keys.
    #[serde(rename_all = "camelCase")]
    RotateMasterPassword {
        /// Current vault metadata.
        meta: VaultCryptoMeta,
        /// The replacement password.
        new_master_password: String,
        /// Optional new hint pair; omitted drops the hint path.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hint: Option<WireHint>,
        /// Every stored item, for key rewrapping.
        items: Vec<VaultItemSecret>,
    },
    /// Install a DEK directly (biometric unlock path).
    #[serde(rename = "setDEK")]
    SetDek {
        /// Raw DEK bytes, base64.
        #[serde(with = "b64")]
        dek: Vec<u8>,
    },
    /// Export the live DEK (biometric enrollment / verification).
    #[serde(rename = "exportDEK")]
    ExportDek,
    /// Drop and zeroize the live DEK.
    Lock,
    /// Report whether a DEK is currently held.
    IsUnlocked,
    /// Encrypt a payload for a new item under a fresh item key.
    #[serde(rename_all = "camelCase")]
    EncryptItemPayload {
        /// Item identifier the ciphertext is bound to.
        item_id: String,
        /// Plaintext payload, base64.
        #[serde(with = "b64")]
        payload: Vec<u8>,
    },
    /// Decrypt an item's payload.
    #[serde(rename_all = "camelCase")]
    DecryptItemPayload {
        /// The stored item record.
        item: VaultItemSecret,
    },
    /// Replace an item's payload, keeping its item key.
    #[serde(rename_all = "camelCase")]
    ReencryptItemPayload {
        /// The stored item record.
        item: VaultItemSecret,
        /// Replacement plaintext, base64.
        #[serde(with = "b64")]
        payload: Vec<u8>,
    },
    /// Zeroize and exit the worker process.
    Shutdown,
}

/// One request line.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Request {
    /// Correlation id, echoed in the response.
    pub id: u64,
    /// The operation to perform.
    #[serde(flatten)]
    pub action: Action,
}

/// Error payload on a failed response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireError {
    /// Stable machine-readable code.
    pub code: String,
    /// Human-readable detail, never secret-derived.
    pub message: String,
}

impl From<&VaultError> for WireError {
    fn from(err: &VaultError) -> Self {
        Self {
            code: err.code().to_owned(),
            message: err.to_string(),
        }
    }
}

impl From<&WireError> for VaultError {
    fn from(wire: &WireError) -> Self {
        Self::from_code(&wire.code, &wire.message)
    }
}

/// One response line.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Response {
    /// Correlation id from the request (0 when the line was
    /// unparseable).
    pub id: u64,
    /// Whether the action succeeded.
    pub ok: bool,
    /// Action-specific result on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Error details on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WireError>,
}

impl Response {
    /// Build a success response.
    #[must_use]
    pub fn success(id: u64, result: serde_json::Value) -> Self {
        Self {
            id,
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    /// Build a failure response from a vault error.
    #[must_use]
    pub fn failure(id: u64, err: &VaultError) -> Self {
        Self {
            id,
            ok: false,
            result: None,
            error: Some(WireError::from(err)),
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
