//! Vault error types for `coffre-vault`.

use coffre_crypto_core::CryptoError;
use thiserror::Error;

/// Errors produced by vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Cryptographic operation failed (delegated from crypto-core).
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// No vault metadata exists yet — setup has not run.
    #[error("vault is not initialized")]
    NotInitialized,

    /// Setup was called on a vault that already has metadata.
    #[error("vault is already initialized")]
    AlreadyInitialized,

    /// Vault is locked — operation requires an unlocked vault.
    #[error("vault is locked")]
    Locked,

    /// Wrong master password, recovery phrase, or hint answer.
    ///
    /// Deliberately indistinguishable across unlock paths.
    #[error("invalid secret")]
    InvalidSecret,

    /// The key-custody worker is not running or stopped responding.
    #[error("key-custody worker unavailable: {0}")]
    WorkerUnavailable(String),

    /// No biometric material is enrolled, or the cached material
    /// failed round-trip verification.
    #[error("biometric unlock unavailable")]
    BiometricUnavailable,

    /// Item not found by ID.
    #[error("item not found: {0}")]
    ItemNotFound(String),

    /// Storage backend failure.
    #[error("storage error: {0}")]
    Storage(String),
}

impl VaultError {
    /// Stable machine-readable code, used on the worker wire and in
    /// audit records. Never includes secret-derived detail.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Crypto(_) => "crypto_error",
            Self::NotInitialized => "not_initialized",
            Self::AlreadyInitialized => "already_initialized",
            Self::Locked => "locked",
            Self::InvalidSecret => "invalid_secret",
            Self::WorkerUnavailable(_) => "worker_unavailable",
            Self::BiometricUnavailable => "biometric_unavailable",
            Self::ItemNotFound(_) => "item_not_found",
            Self::Storage(_) => "storage_error",
        }
    }

    /// Rebuild an error from a wire code. Unknown codes map to
    /// [`Self::Storage`] so callers always get a `VaultError`.
    #[must_use]
    pub fn from_code(code: &str, detail: &str) -> Self {
        match code {
            "not_initialized" => Self::NotInitialized,
            "already_initialized" => Self::AlreadyInitialized,
            "locked" => Self::Locked,
            "invalid_secret" => Self::InvalidSecret,
            "worker_unavailable" => Self::WorkerUnavailable(detail.to_owned()),
            "biometric_unavailable" => Self::BiometricUnavailable,
            "item_not_found" => Self::ItemNotFound(detail.to_owned()),
            "crypto_error" => Self::Crypto(CryptoError::Encryption(detail.to_owned())),
            _ => Self::Storage(detail.to_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_roundtrip() {
        let errors = [
            VaultError::NotInitialized,
            VaultError::AlreadyInitialized,
            VaultError::Locked,
            VaultError::InvalidSecret,
            VaultError::WorkerUnavailable("gone".into()),
            VaultError::BiometricUnavailable,
            VaultError::ItemNotFound("abc".into()),
            VaultError::Storage("disk".into()),
        ];
        for err in errors {
            let back = VaultError::from_code(err.code(), "detail");
            assert_eq!(back.code(), err.code());
        }
    }

    #[test]
    fn invalid_secret_message_carries_no_detail() {
        assert_eq!(format!("{}", VaultError::InvalidSecret), "invalid secret");
    }

    #[test]
    fn unknown_code_maps_to_storage() {
        let err = VaultError::from_code("mystery", "huh");
        assert_eq!(err.code(), "storage_error");
    }
}
