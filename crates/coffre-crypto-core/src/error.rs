//! Cryptographic error types for `coffre-crypto-core`.

use thiserror::Error;

/// Errors produced by cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key derivation failed (bad parameters, short salt, allocation).
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Symmetric encryption failure (AES-256-GCM setup or seal).
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Authentication tag did not verify — wrong key, corrupted data,
    /// or tampering. Deliberately carries no detail: the three causes
    /// must stay indistinguishable to callers.
    #[error("decryption failed: authentication tag mismatch")]
    AuthenticationFailed,

    /// Invalid key material (wrong length, corrupted bytes).
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// TOTP generation error (bad Base32 secret, zero period).
    #[error("OTP error: {0}")]
    Otp(String),

    /// Recovery phrase encoding/decoding failure (bad length,
    /// invalid character, checksum mismatch).
    #[error("recovery phrase error: {0}")]
    RecoveryPhrase(String),

    /// Secure memory allocation or CSPRNG failure.
    #[error("secure memory error: {0}")]
    SecureMemory(String),

    /// Password generation failure (invalid options).
    #[error("password generation error: {0}")]
    PasswordGeneration(String),
}
