//! The key hierarchy: setup, unlock, rotation, item crypto.
//!
//! ```text
//! master password ──KDF──► master key ──┐
//! recovery phrase ──KDF──► recovery key ├──► unwraps DEK
//! hint answer     ──KDF──► hint key ────┘        │
//!                                                ▼
//!                                     wraps per-item keys
//!                                                │
//!                                                ▼
//!                                        item payloads
//! ```
//!
//! Everything here is pure: callers pass metadata and items in and
//! persist the results themselves. The key-custody worker is the only
//! production caller; tests call it directly.

use crate::error::VaultError;
use crate::items::{item_key_aad, item_payload_aad, VaultItemSecret, ENC_VERSION, ITEM_KEY_LEN};
use crate::meta::{SecurityMode, VaultCryptoMeta, META_SCHEMA_VERSION, SALT_LEN};
use crate::util::now_iso8601;
use coffre_crypto_core::{
    decode_recovery_phrase, derive_key, envelope, generate_recovery_phrase, unwrap_dek, wrap_dek,
    CryptoError, KdfAlgorithm, SecretBuffer, SecretBytes, WrappedBy, DEK_LEN,
};
use rand::rngs::OsRng;
use rand::RngCore;

// ---------------------------------------------------------------------------
// Inputs and outcomes
// ---------------------------------------------------------------------------

/// Hint question/answer pair supplied at setup (relaxed mode).
#[derive(Clone, Debug)]
pub struct HintConfig {
    /// Question shown at unlock, stored in plaintext metadata.
    pub question: String,
    /// Answer, normalized before derivation and never stored.
    pub answer: String,
}

/// A secret presented at unlock, one variant per path.
#[derive(Clone, Debug)]
pub enum UnlockSecret<'a> {
    /// The master password, verbatim.
    MasterPassword(&'a str),
    /// The recovery phrase as displayed at setup (dashes optional).
    RecoveryPhrase(&'a str),
    /// The hint answer (relaxed mode only).
    HintAnswer(&'a str),
}

impl UnlockSecret<'_> {
    /// Which DEK slot this secret targets.
    #[must_use]
    pub const fn path(&self) -> WrappedBy {
        match self {
            Self::MasterPassword(_) => WrappedBy::Master,
            Self::RecoveryPhrase(_) => WrappedBy::Recovery,
            Self::HintAnswer(_) => WrappedBy::Hint,
        }
    }
}

/// Result of initial vault setup.
pub struct SetupOutcome {
    /// Metadata to persist.
    pub meta: VaultCryptoMeta,
    /// Recovery phrase to display exactly once.
    pub recovery_phrase: String,
    /// The fresh DEK, handed to the caller for the unlocked session.
    pub dek: SecretBytes<DEK_LEN>,
}

/// Result of a master-password rotation.
pub struct RotationOutcome {
    /// Replacement metadata (new DEK slots, new salts, new phrase).
    pub meta: VaultCryptoMeta,
    /// The new recovery phrase, displayed exactly once.
    pub recovery_phrase: String,
    /// Every item with its key rewrapped under the new DEK. Payload
    /// ciphertext is untouched.
    pub items: Vec<VaultItemSecret>,
    /// The new DEK for the continuing session.
    pub dek: SecretBytes<DEK_LEN>,
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

/// Create the key hierarchy for a new vault.
///
/// Generates a random DEK and recovery phrase, derives one wrapping
/// key per configured path, and wraps the same DEK under each. The
/// hint path exists only when `hint` is provided, which also switches
/// the vault to [`SecurityMode::Relaxed`].
///
/// # Errors
///
/// Returns [`VaultError::InvalidSecret`] for an empty master password
/// and [`VaultError::Crypto`] if derivation or wrapping fails.
pub fn setup_vault(
    master_password: &str,
    hint: Option<&HintConfig>,
    kdf: &KdfAlgorithm,
) -> Result<SetupOutcome, VaultError> {
    if master_password.is_empty() {
        return Err(VaultError::InvalidSecret);
    }

    let dek = SecretBytes::<DEK_LEN>::random().map_err(VaultError::Crypto)?;
    let (recovery_entropy, recovery_phrase) = generate_recovery_phrase()?;

    let master_salt = fresh_salt();
    let recovery_salt = fresh_salt();

    let master_key = derive_key(master_password.as_bytes(), &master_salt, kdf)?;
    let recovery_key = derive_key(recovery_entropy.expose(), &recovery_salt, kdf)?;

    let master_slot = wrap_dek(dek.expose(), master_key.expose(), WrappedBy::Master)?;
    let recovery_slot = wrap_dek(dek.expose(), recovery_key.expose(), WrappedBy::Recovery)?;

    let (security_mode, hint_salt, hint_slot, hint_question) = match hint {
        Some(config) => {
            let salt = fresh_salt();
            let answer = normalize_hint_answer(&config.answer);
            let hint_key = derive_key(answer.as_bytes(), &salt, kdf)?;
            let slot = wrap_dek(dek.expose(), hint_key.expose(), WrappedBy::Hint)?;
            (
                SecurityMode::Relaxed,
                Some(salt),
                Some(slot),
                Some(config.question.clone()),
            )
        }
        None => (SecurityMode::Strict, None, None, None),
    };

    let now = now_iso8601();
    let meta = VaultCryptoMeta {
        schema_version: META_SCHEMA_VERSION,
        security_mode,
        kdf: kdf.clone(),
        master_salt,
        recovery_salt,
        hint_salt,
        master_slot,
        recovery_slot,
        hint_slot,
        hint_question,
        created_at: now.clone(),
        updated_at: now,
    };

    Ok(SetupOutcome {
        meta,
        recovery_phrase,
        dek,
    })
}

// ---------------------------------------------------------------------------
// Unlock
// ---------------------------------------------------------------------------

/// Recover the DEK from metadata and a presented secret.
///
/// Every failure mode — wrong secret, malformed recovery phrase,
/// unconfigured hint path, tampered slot — collapses into
/// [`VaultError::InvalidSecret`]. Callers cannot learn which check
/// rejected the attempt.
///
/// # Errors
///
/// Returns [`VaultError::InvalidSecret`] on any authentication
/// failure, or [`VaultError::Crypto`] for KDF parameter errors.
pub fn unlock_dek(
    meta: &VaultCryptoMeta,
    secret: &UnlockSecret<'_>,
) -> Result<SecretBytes<DEK_LEN>, VaultError> {
    let (wrapping_key, slot) = match secret {
        UnlockSecret::MasterPassword(password) => {
            let key = derive_key(password.as_bytes(), &meta.master_salt, &meta.kdf)?;
            (key, &meta.master_slot)
        }
        UnlockSecret::RecoveryPhrase(phrase) => {
            let entropy = decode_recovery_phrase(phrase).map_err(|_| VaultError::InvalidSecret)?;
            let key = derive_key(entropy.expose(), &meta.recovery_salt, &meta.kdf)?;
            (key, &meta.recovery_slot)
        }
        UnlockSecret::HintAnswer(answer) => {
            let (Some(salt), Some(slot)) = (&meta.hint_salt, &meta.hint_slot) else {
                return Err(VaultError::InvalidSecret);
            };
            let normalized = normalize_hint_answer(answer);
            let key = derive_key(normalized.as_bytes(), salt, &meta.kdf)?;
            (key, slot)
        }
    };

    unwrap_dek(slot, wrapping_key.expose()).map_err(|err| match err {
        CryptoError::AuthenticationFailed => VaultError::InvalidSecret,
        other => VaultError::Crypto(other),
    })
}

// ---------------------------------------------------------------------------
// Rotation
// ---------------------------------------------------------------------------

/// Rotate the master password: new DEK, new salts, new recovery
/// phrase, every item key rewrapped. O(items), payloads untouched.
///
/// The hint path is re-established only when `hint` is supplied;
/// otherwise the rotated vault drops it (the old hint key cannot wrap
/// the new DEK without the answer).
///
/// # Errors
///
/// Returns [`VaultError::InvalidSecret`] for an empty new password,
/// [`VaultError::Crypto`] if any unwrap of an item key under the
/// current DEK fails (corrupt vault), or if derivation/wrapping fails.
pub fn rotate_master_password(
    meta: &VaultCryptoMeta,
    current_dek: &SecretBytes<DEK_LEN>,
    new_master_password: &str,
    hint: Option<&HintConfig>,
    items: &[VaultItemSecret],
) -> Result<RotationOutcome, VaultError> {
    if new_master_password.is_empty() {
        return Err(VaultError::InvalidSecret);
    }

    // Unwrap every item key under the old DEK before touching
    // anything, so a corrupt record aborts the rotation whole.
    let mut item_keys = Vec::with_capacity(items.len());
    for item in items {
        let key = envelope::decrypt(
            &item.wrapped_item_key,
            current_dek.expose(),
            &item_key_aad(&item.item_id),
        )?;
        item_keys.push(key);
    }

    let outcome = setup_vault(new_master_password, hint, &meta.kdf)?;

    let mut rewrapped = Vec::with_capacity(items.len());
    for (item, key) in items.iter().zip(&item_keys) {
        let wrapped_item_key = envelope::encrypt(
            key.expose(),
            outcome.dek.expose(),
            &item_key_aad(&item.item_id),
        )?;
        rewrapped.push(VaultItemSecret {
            item_id: item.item_id.clone(),
            encrypted_payload: item.encrypted_payload.clone(),
            wrapped_item_key,
            enc_version: item.enc_version,
        });
    }

    let mut new_meta = outcome.meta;
    new_meta.created_at = meta.created_at.clone();
    new_meta.updated_at = now_iso8601();

    Ok(RotationOutcome {
        meta: new_meta,
        recovery_phrase: outcome.recovery_phrase,
        items: rewrapped,
        dek: outcome.dek,
    })
}

// ---------------------------------------------------------------------------
// Item crypto
// ---------------------------------------------------------------------------

/// Encrypt a payload for a new item under a fresh item key.
///
/// # Errors
///
/// Returns [`VaultError::Crypto`] if key generation or encryption
/// fails.
pub fn encrypt_item_payload(
    dek: &SecretBytes<DEK_LEN>,
    item_id: &str,
    payload: &[u8],
) -> Result<VaultItemSecret, VaultError> {
    let item_key = SecretBytes::<ITEM_KEY_LEN>::random().map_err(VaultError::Crypto)?;

    let encrypted_payload =
        envelope::encrypt(payload, item_key.expose(), &item_payload_aad(item_id))?;
    let wrapped_item_key =
        envelope::encrypt(item_key.expose(), dek.expose(), &item_key_aad(item_id))?;

    Ok(VaultItemSecret {
        item_id: item_id.to_owned(),
        encrypted_payload,
        wrapped_item_key,
        enc_version: ENC_VERSION,
    })
}

/// Decrypt an item's payload.
///
/// # Errors
///
/// Returns [`VaultError::Crypto`] with
/// [`CryptoError::AuthenticationFailed`] if the DEK is wrong or the
/// record was tampered with.
pub fn decrypt_item_payload(
    dek: &SecretBytes<DEK_LEN>,
    item: &VaultItemSecret,
) -> Result<SecretBuffer, VaultError> {
    let item_key = envelope::decrypt(
        &item.wrapped_item_key,
        dek.expose(),
        &item_key_aad(&item.item_id),
    )?;
    let payload = envelope::decrypt(
        &item.encrypted_payload,
        item_key.expose(),
        &item_payload_aad(&item.item_id),
    )?;
    Ok(payload)
}

/// Re-encrypt an item's payload in place, keeping its item key.
///
/// Used for edits: the wrapped item key is reused verbatim, only the
/// payload ciphertext (and its nonce) changes.
///
/// # Errors
///
/// Returns [`VaultError::Crypto`] if the existing item key cannot be
/// unwrapped or encryption fails.
pub fn reencrypt_item_payload(
    dek: &SecretBytes<DEK_LEN>,
    item: &VaultItemSecret,
    new_payload: &[u8],
) -> Result<VaultItemSecret, VaultError> {
    let item_key = envelope::decrypt(
        &item.wrapped_item_key,
        dek.expose(),
        &item_key_aad(&item.item_id),
    )?;
    let encrypted_payload = envelope::encrypt(
        new_payload,
        item_key.expose(),
        &item_payload_aad(&item.item_id),
    )?;

    Ok(VaultItemSecret {
        item_id: item.item_id.clone(),
        encrypted_payload,
        wrapped_item_key: item.wrapped_item_key.clone(),
        enc_version: item.enc_version,
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Normalize a hint answer before derivation: trim surrounding
/// whitespace and lowercase, so "  Paris " and "paris" agree.
#[must_use]
pub fn normalize_hint_answer(answer: &str) -> String {
    answer.trim().to_lowercase()
}

fn fresh_salt() -> Vec<u8> {
    let mut salt = vec![0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
