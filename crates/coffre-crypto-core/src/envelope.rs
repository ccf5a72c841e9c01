//! AES-256-GCM envelope encryption.
//!
//! Everything the vault persists — wrapped DEK copies, wrapped item
//! keys, item payloads — goes through this one module. The output is
//! a self-contained [`WrappedData`]: ciphertext, nonce, and tag are
//! only ever valid together.

use crate::error::CryptoError;
use crate::memory::SecretBuffer;
use rand::rngs::OsRng;
use rand::RngCore;
use ring::aead;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Nonce length in bytes (96 bits), fresh random per encryption.
pub const NONCE_LEN: usize = 12;

/// Authentication tag length in bytes (128 bits).
pub const TAG_LEN: usize = 16;

/// Key length in bytes (256 bits).
pub const KEY_LEN: usize = 32;

// ---------------------------------------------------------------------------
// WrappedData
// ---------------------------------------------------------------------------

/// The atomic output of envelope encryption.
///
/// Never partially valid: decryption authenticates nonce, ciphertext,
/// and tag as a unit, and any modification fails the whole bundle.
#[must_use = "wrapped data must be stored or transmitted"]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrappedData {
    /// Encrypted bytes, same length as the plaintext.
    pub ciphertext: Vec<u8>,
    /// 96-bit random nonce, unique per encryption call.
    pub nonce: [u8; NONCE_LEN],
    /// 128-bit authentication tag.
    pub tag: [u8; TAG_LEN],
}

impl WrappedData {
    /// Serialize to the compact wire layout `nonce || ciphertext || tag`.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            NONCE_LEN
                .saturating_add(self.ciphertext.len())
                .saturating_add(TAG_LEN),
        );
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out.extend_from_slice(&self.tag);
        out
    }

    /// Parse the compact wire layout produced by [`Self::to_bytes`].
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Encryption`] if the input is shorter
    /// than a nonce plus a tag.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let Some(ct_len) = bytes.len().checked_sub(NONCE_LEN.saturating_add(TAG_LEN)) else {
            return Err(CryptoError::Encryption(format!(
                "wrapped data too short: {} bytes",
                bytes.len()
            )));
        };

        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&bytes[..NONCE_LEN]);

        let tag_start = NONCE_LEN.saturating_add(ct_len);
        let ciphertext = bytes[NONCE_LEN..tag_start].to_vec();

        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&bytes[tag_start..]);

        Ok(Self {
            ciphertext,
            nonce,
            tag,
        })
    }
}

// ---------------------------------------------------------------------------
// Encrypt / decrypt
// ---------------------------------------------------------------------------

fn aead_key(key: &[u8]) -> Result<aead::LessSafeKey, CryptoError> {
    if key.len() != KEY_LEN {
        return Err(CryptoError::Encryption(format!(
            "invalid key length: {} bytes (expected {KEY_LEN})",
            key.len()
        )));
    }
    let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, key)
        .map_err(|_| CryptoError::Encryption("failed to build AES-256-GCM key".into()))?;
    Ok(aead::LessSafeKey::new(unbound))
}

/// Encrypt `plaintext` under a 256-bit key with a fresh random nonce.
///
/// `aad` is authenticated but not encrypted; the same bytes must be
/// supplied at decryption. Nonces are never reused under a key: every
/// call draws 12 fresh bytes from the OS CSPRNG.
///
/// # Errors
///
/// Returns [`CryptoError::Encryption`] on a bad key length or a
/// failed seal operation.
pub fn encrypt(plaintext: &[u8], key: &[u8], aad: &[u8]) -> Result<WrappedData, CryptoError> {
    let sealing_key = aead_key(key)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = aead::Nonce::assume_unique_for_key(nonce_bytes);

    let mut in_out = plaintext.to_vec();
    let tag = match sealing_key.seal_in_place_separate_tag(nonce, aead::Aad::from(aad), &mut in_out)
    {
        Ok(tag) => tag,
        Err(_) => {
            in_out.zeroize();
            return Err(CryptoError::Encryption("AES-256-GCM seal failed".into()));
        }
    };

    let mut tag_bytes = [0u8; TAG_LEN];
    tag_bytes.copy_from_slice(tag.as_ref());

    Ok(WrappedData {
        ciphertext: in_out,
        nonce: nonce_bytes,
        tag: tag_bytes,
    })
}

/// Decrypt and authenticate a [`WrappedData`] bundle.
///
/// Fails with [`CryptoError::AuthenticationFailed`] whenever the tag
/// does not verify — wrong key, corrupted data, tampering, or AAD
/// mismatch. The caller cannot (and must not) tell these apart.
///
/// # Errors
///
/// Returns [`CryptoError::Encryption`] on a bad key length and
/// [`CryptoError::AuthenticationFailed`] on tag verification failure.
pub fn decrypt(wrapped: &WrappedData, key: &[u8], aad: &[u8]) -> Result<SecretBuffer, CryptoError> {
    let opening_key = aead_key(key)?;
    let nonce = aead::Nonce::assume_unique_for_key(wrapped.nonce);

    let mut buffer = Vec::with_capacity(wrapped.ciphertext.len().saturating_add(TAG_LEN));
    buffer.extend_from_slice(&wrapped.ciphertext);
    buffer.extend_from_slice(&wrapped.tag);

    let plaintext = opening_key
        .open_in_place(nonce, aead::Aad::from(aad), &mut buffer)
        .map_err(|_| CryptoError::AuthenticationFailed)?;

    let out = SecretBuffer::new(plaintext)?;
    buffer.zeroize();
    Ok(out)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
