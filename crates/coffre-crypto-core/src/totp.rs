//! RFC 6238 TOTP code generation.
//!
//! HMAC-SHA1, 30-second period, 6 digits — the parameters virtually
//! every authenticator-compatible service uses. Secrets arrive as the
//! Base32 strings services display during 2FA enrollment.

use crate::error::CryptoError;
use data_encoding::BASE32_NOPAD;
use ring::hmac;
use std::time::{SystemTime, UNIX_EPOCH};

/// Time-step length in seconds.
pub const TOTP_PERIOD_SECS: u64 = 30;

/// Number of digits in a generated code.
pub const TOTP_DIGITS: u32 = 6;

const TOTP_MODULUS: u32 = 1_000_000;

/// A generated TOTP code with its remaining validity window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TotpCode {
    /// Zero-padded 6-digit code.
    pub code: String,
    /// Seconds until the current time step rolls over (1..=30).
    pub remaining_seconds: u64,
}

/// Generate the current TOTP code for a Base32-encoded secret.
///
/// The secret is normalized before decoding: uppercased, with spaces
/// and trailing `=` padding stripped, so values pasted straight from
/// an enrollment screen work as-is.
///
/// # Errors
///
/// Returns [`CryptoError::Otp`] on an empty or malformed secret, or
/// if the system clock reads before the Unix epoch.
#[allow(clippy::arithmetic_side_effects)] // modulo by a non-zero period
pub fn generate_totp_code(base32_secret: &str) -> Result<TotpCode, CryptoError> {
    let secret = decode_base32_secret(base32_secret)?;
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| CryptoError::Otp(format!("system clock before Unix epoch: {e}")))?
        .as_secs();

    let code = totp_code_at(&secret, now);
    let remaining_seconds = TOTP_PERIOD_SECS.saturating_sub(now % TOTP_PERIOD_SECS);
    Ok(TotpCode {
        code,
        remaining_seconds,
    })
}

/// Compute the 6-digit code for `unix_secs` (RFC 6238 over RFC 4226).
#[must_use]
#[allow(clippy::arithmetic_side_effects)] // indices bounded by the 20-byte SHA-1 output
pub fn totp_code_at(secret: &[u8], unix_secs: u64) -> String {
    let counter = unix_secs / TOTP_PERIOD_SECS;

    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, secret);
    let mac = hmac::sign(&key, &counter.to_be_bytes());
    let digest = mac.as_ref();

    // RFC 4226 §5.3 dynamic truncation.
    let offset = usize::from(digest[19] & 0x0F);
    let binary = (u32::from(digest[offset] & 0x7F) << 24)
        | (u32::from(digest[offset + 1]) << 16)
        | (u32::from(digest[offset + 2]) << 8)
        | u32::from(digest[offset + 3]);

    format!("{:06}", binary % TOTP_MODULUS)
}

/// Decode a user-supplied Base32 secret into raw bytes.
///
/// # Errors
///
/// Returns [`CryptoError::Otp`] if the normalized input is empty or
/// not valid Base32.
pub fn decode_base32_secret(base32_secret: &str) -> Result<Vec<u8>, CryptoError> {
    let normalized: String = base32_secret
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let normalized = normalized.trim_end_matches('=');

    if normalized.is_empty() {
        return Err(CryptoError::Otp("empty TOTP secret".into()));
    }

    BASE32_NOPAD
        .decode(normalized.as_bytes())
        .map_err(|e| CryptoError::Otp(format!("invalid Base32 secret: {e}")))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
