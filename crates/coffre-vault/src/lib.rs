//! `coffre-vault` — Vault business logic for Coffre.
//!
//! Owns the key hierarchy (setup, unlock, rotation), encrypted item
//! records, the audit trail, and the storage traits backends plug
//! into. No IPC and no async: the key-custody worker drives these
//! functions over its wire protocol.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod error;
pub mod util;

pub mod meta;
pub mod items;

pub mod hierarchy;

pub mod store;

pub mod audit;

pub use audit::{reason, AuditEvent, AuditEventType, AuditResult};
pub use error::VaultError;
pub use hierarchy::{
    decrypt_item_payload, encrypt_item_payload, normalize_hint_answer, reencrypt_item_payload,
    rotate_master_password, setup_vault, unlock_dek, HintConfig, RotationOutcome, SetupOutcome,
    UnlockSecret,
};
pub use items::{VaultItemSecret, ENC_VERSION, ITEM_KEY_LEN};
pub use meta::{SecurityMode, VaultCryptoMeta, META_ID, META_SCHEMA_VERSION, SALT_LEN};
pub use store::{BiometricStore, MemoryBiometricStore, MemoryVaultStore, VaultStore};
pub use util::{generate_uuid, now_iso8601};
