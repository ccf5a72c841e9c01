//! `coffre-crypto-core` — Pure cryptographic primitives for Coffre.
//!
//! This crate is the audit target: zero network, zero async, zero IPC
//! dependencies. Everything here is deterministic given its inputs
//! (plus the OS CSPRNG) and safe to call from any process.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod error;
pub mod memory;

pub mod kdf;
pub mod envelope;

pub mod dek;

pub mod recovery;

pub mod totp;

pub mod password;

pub use dek::{unwrap_dek, wrap_dek, DekSlot, WrappedBy, DEK_LEN, WRAPPING_KEY_LEN};
pub use envelope::{decrypt, encrypt, WrappedData, KEY_LEN, NONCE_LEN, TAG_LEN};
pub use error::CryptoError;
pub use kdf::{
    derive_key, Argon2idParams, KdfAlgorithm, Pbkdf2Digest, Pbkdf2Params, DERIVED_KEY_LEN,
    MIN_SALT_LEN,
};
pub use memory::{disable_core_dumps, SecretBuffer, SecretBytes};
pub use password::{
    generate_password, PasswordOptions, DEFAULT_PASSWORD_LEN, MAX_PASSWORD_LEN, MIN_PASSWORD_LEN,
};
pub use recovery::{
    decode_recovery_phrase, encode_recovery_phrase, generate_recovery_phrase,
    RECOVERY_ENTROPY_LEN,
};
pub use totp::{
    decode_base32_secret, generate_totp_code, totp_code_at, TotpCode, TOTP_DIGITS,
    TOTP_PERIOD_SECS,
};
