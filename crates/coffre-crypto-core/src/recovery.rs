//! Recovery phrase generation and decoding.
//!
//! A recovery phrase carries 128 bits of CSPRNG entropy in a
//! human-readable form, displayed exactly once at vault setup:
//!
//! - **Alphabet**: Crockford base32, `0123456789ABCDEFGHJKMNPQRSTVWXYZ`
//!   (no I, L, O, or U), 5 bits per character
//! - **Layout**: 26 data characters + 2 checksum characters, grouped
//!   in sevens of four: `XXXX-XXXX-XXXX-XXXX-XXXX-XXXX-XXXX`
//! - **Checksum**: first byte of `BLAKE3(entropy)`, split into a
//!   5-bit and a 3-bit character — catches typos before the expensive
//!   KDF runs
//! - Decoding is case-insensitive, tolerates missing dashes, and maps
//!   a typed `O` to `0` and `I`/`L` to `1`, so the letters the
//!   alphabet bans still decode as the digit they resemble

use crate::error::CryptoError;
use crate::memory::SecretBytes;

/// Recovery entropy length in bytes (128 bits).
pub const RECOVERY_ENTROPY_LEN: usize = 16;

/// Crockford base32 alphabet (excludes I, L, O, U).
const ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Data characters: 128 bits at 5 bits/char, rounded up.
const DATA_CHARS: usize = 26;

/// Checksum characters appended after the data.
const CHECKSUM_CHARS: usize = 2;

/// Characters per dash-separated group.
const GROUP_SIZE: usize = 4;

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Generate fresh recovery entropy and its display phrase.
///
/// The entropy feeds the recovery-key KDF; the phrase is shown to the
/// user once and never persisted.
///
/// # Errors
///
/// Returns [`CryptoError::SecureMemory`] if the CSPRNG fails.
pub fn generate_recovery_phrase(
) -> Result<(SecretBytes<RECOVERY_ENTROPY_LEN>, String), CryptoError> {
    let entropy = SecretBytes::<RECOVERY_ENTROPY_LEN>::random()?;
    let phrase = encode_recovery_phrase(entropy.expose());
    Ok((entropy, phrase))
}

/// Encode 16 bytes of entropy as a dash-grouped recovery phrase.
#[must_use]
#[allow(clippy::arithmetic_side_effects)] // bit packing over bounded accumulators
pub fn encode_recovery_phrase(entropy: &[u8; RECOVERY_ENTROPY_LEN]) -> String {
    let mut chars = Vec::with_capacity(DATA_CHARS + CHECKSUM_CHARS);

    // 5-bit big-endian packing; the final character carries 3 bits of
    // data padded with zeros.
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    for &byte in entropy {
        acc = (acc << 8) | u32::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            chars.push(ALPHABET[((acc >> bits) & 0x1F) as usize]);
        }
    }
    if bits > 0 {
        chars.push(ALPHABET[((acc << (5 - bits)) & 0x1F) as usize]);
    }

    let checksum = blake3::hash(entropy).as_bytes()[0];
    chars.push(ALPHABET[usize::from(checksum >> 3)]);
    chars.push(ALPHABET[usize::from(checksum & 0x07)]);

    // Dash every GROUP_SIZE characters.
    let mut out = String::with_capacity(chars.len() + chars.len() / GROUP_SIZE);
    for (i, &c) in chars.iter().enumerate() {
        if i > 0 && i % GROUP_SIZE == 0 {
            out.push('-');
        }
        out.push(char::from(c));
    }
    out
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode a recovery phrase back to its 16 entropy bytes.
///
/// Accepts lowercase input, ignores dashes and whitespace, and reads
/// the banned confusable letters `O`, `I`, and `L` as `0` and `1`.
///
/// # Errors
///
/// Returns [`CryptoError::RecoveryPhrase`] on a wrong length, a
/// character outside the alphabet, or a checksum mismatch.
#[allow(clippy::arithmetic_side_effects)] // bit unpacking over bounded accumulators
pub fn decode_recovery_phrase(
    phrase: &str,
) -> Result<SecretBytes<RECOVERY_ENTROPY_LEN>, CryptoError> {
    let mut values = Vec::with_capacity(DATA_CHARS + CHECKSUM_CHARS);
    for c in phrase.chars() {
        if c == '-' || c.is_whitespace() {
            continue;
        }
        let canonical = match c.to_ascii_uppercase() {
            'O' => '0',
            'I' | 'L' => '1',
            other => other,
        };
        let Some(value) = ALPHABET.iter().position(|&a| char::from(a) == canonical) else {
            return Err(CryptoError::RecoveryPhrase(format!(
                "invalid character '{c}'"
            )));
        };
        values.push(value as u8);
    }

    if values.len() != DATA_CHARS + CHECKSUM_CHARS {
        return Err(CryptoError::RecoveryPhrase(format!(
            "expected {} characters, got {}",
            DATA_CHARS + CHECKSUM_CHARS,
            values.len()
        )));
    }

    // Unpack the 26 data characters into 16 bytes (130 bits, the last
    // 2 are padding).
    let mut entropy = [0u8; RECOVERY_ENTROPY_LEN];
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let mut idx = 0;
    for &value in &values[..DATA_CHARS] {
        acc = (acc << 5) | u32::from(value);
        bits += 5;
        if bits >= 8 && idx < RECOVERY_ENTROPY_LEN {
            bits -= 8;
            entropy[idx] = ((acc >> bits) & 0xFF) as u8;
            idx += 1;
        }
    }

    let checksum = blake3::hash(&entropy).as_bytes()[0];
    let expected = [checksum >> 3, checksum & 0x07];
    if values[DATA_CHARS..] != expected {
        return Err(CryptoError::RecoveryPhrase("checksum mismatch".into()));
    }

    Ok(SecretBytes::new(entropy))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
