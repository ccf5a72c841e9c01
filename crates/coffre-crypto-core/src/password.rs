//! Random password generation.
//!
//! Character pools exclude visually confusable glyphs (`0`/`O`,
//! `1`/`l`/`I`, `` ` ``/`'`) since generated passwords are routinely
//! read off a screen or typed on another device.

use crate::error::CryptoError;
use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::Rng;

/// Shortest allowed password.
pub const MIN_PASSWORD_LEN: usize = 4;

/// Longest allowed password.
pub const MAX_PASSWORD_LEN: usize = 256;

/// Default generated length.
pub const DEFAULT_PASSWORD_LEN: usize = 20;

const UPPERCASE: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
const LOWERCASE: &[u8] = b"abcdefghijkmnopqrstuvwxyz";
const DIGITS: &[u8] = b"23456789";
const SYMBOLS: &[u8] = b"!@#$%^&*-_=+?";

/// Which character classes to draw from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PasswordOptions {
    /// Total password length.
    pub length: usize,
    /// Include `A-Z` (minus confusables).
    pub uppercase: bool,
    /// Include `a-z` (minus confusables).
    pub lowercase: bool,
    /// Include `2-9`.
    pub digits: bool,
    /// Include punctuation.
    pub symbols: bool,
}

impl Default for PasswordOptions {
    fn default() -> Self {
        Self {
            length: DEFAULT_PASSWORD_LEN,
            uppercase: true,
            lowercase: true,
            digits: true,
            symbols: true,
        }
    }
}

impl PasswordOptions {
    fn enabled_pools(&self) -> Vec<&'static [u8]> {
        let mut pools = Vec::with_capacity(4);
        if self.uppercase {
            pools.push(UPPERCASE);
        }
        if self.lowercase {
            pools.push(LOWERCASE);
        }
        if self.digits {
            pools.push(DIGITS);
        }
        if self.symbols {
            pools.push(SYMBOLS);
        }
        pools
    }
}

/// Generate a random password from the enabled character classes.
///
/// Every enabled class contributes at least one character; positions
/// are shuffled afterwards so the guaranteed picks do not cluster at
/// the front.
///
/// # Errors
///
/// Returns [`CryptoError::PasswordGeneration`] when no class is
/// enabled, the length is outside `4..=256`, or the length is too
/// short to fit one character per enabled class.
pub fn generate_password(options: &PasswordOptions) -> Result<String, CryptoError> {
    let pools = options.enabled_pools();
    if pools.is_empty() {
        return Err(CryptoError::PasswordGeneration(
            "at least one character class must be enabled".into(),
        ));
    }
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&options.length) {
        return Err(CryptoError::PasswordGeneration(format!(
            "length {} outside {MIN_PASSWORD_LEN}..={MAX_PASSWORD_LEN}",
            options.length
        )));
    }
    if options.length < pools.len() {
        return Err(CryptoError::PasswordGeneration(format!(
            "length {} cannot cover {} enabled classes",
            options.length,
            pools.len()
        )));
    }

    let combined: Vec<u8> = pools.iter().flat_map(|pool| pool.iter().copied()).collect();

    let mut rng = OsRng;
    let mut chars = Vec::with_capacity(options.length);
    for pool in &pools {
        chars.push(pool[rng.gen_range(0..pool.len())]);
    }
    while chars.len() < options.length {
        chars.push(combined[rng.gen_range(0..combined.len())]);
    }
    chars.shuffle(&mut rng);

    // The pools are all ASCII.
    Ok(chars.into_iter().map(char::from).collect())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_produce_20_chars() {
        let password = generate_password(&PasswordOptions::default())
            .expect("generation should succeed");
        assert_eq!(password.len(), DEFAULT_PASSWORD_LEN);
    }

    #[test]
    fn every_enabled_class_is_represented() {
        for _ in 0..50 {
            let password = generate_password(&PasswordOptions::default())
                .expect("generation should succeed");
            assert!(password.bytes().any(|b| UPPERCASE.contains(&b)));
            assert!(password.bytes().any(|b| LOWERCASE.contains(&b)));
            assert!(password.bytes().any(|b| DIGITS.contains(&b)));
            assert!(password.bytes().any(|b| SYMBOLS.contains(&b)));
        }
    }

    #[test]
    fn disabled_classes_never_appear() {
        let options = PasswordOptions {
            length: 32,
            uppercase: false,
            lowercase: true,
            digits: true,
            symbols: false,
        };
        for _ in 0..50 {
            let password = generate_password(&options).expect("generation should succeed");
            assert!(!password.bytes().any(|b| UPPERCASE.contains(&b)));
            assert!(!password.bytes().any(|b| SYMBOLS.contains(&b)));
        }
    }

    #[test]
    fn single_class_works() {
        let options = PasswordOptions {
            length: 8,
            uppercase: false,
            lowercase: false,
            digits: true,
            symbols: false,
        };
        let password = generate_password(&options).expect("generation should succeed");
        assert!(password.bytes().all(|b| DIGITS.contains(&b)));
    }

    #[test]
    fn no_class_rejected() {
        let options = PasswordOptions {
            length: 20,
            uppercase: false,
            lowercase: false,
            digits: false,
            symbols: false,
        };
        let result = generate_password(&options);
        assert!(matches!(result, Err(CryptoError::PasswordGeneration(_))));
    }

    #[test]
    fn out_of_range_lengths_rejected() {
        for length in [0, 3, 257] {
            let options = PasswordOptions {
                length,
                ..PasswordOptions::default()
            };
            let result = generate_password(&options);
            assert!(matches!(result, Err(CryptoError::PasswordGeneration(_))));
        }
    }

    #[test]
    fn boundary_lengths_accepted() {
        for length in [MIN_PASSWORD_LEN, MAX_PASSWORD_LEN] {
            let options = PasswordOptions {
                length,
                ..PasswordOptions::default()
            };
            let password = generate_password(&options).expect("generation should succeed");
            assert_eq!(password.len(), length);
        }
    }

    #[test]
    fn confusables_never_appear() {
        let options = PasswordOptions {
            length: 64,
            ..PasswordOptions::default()
        };
        for _ in 0..20 {
            let password = generate_password(&options).expect("generation should succeed");
            for banned in ['0', 'O', '1', 'l', 'I'] {
                assert!(
                    !password.contains(banned),
                    "password must not contain '{banned}'"
                );
            }
        }
    }

    #[test]
    fn outputs_differ() {
        let a = generate_password(&PasswordOptions::default()).expect("generation should succeed");
        let b = generate_password(&PasswordOptions::default()).expect("generation should succeed");
        assert_ne!(a, b);
    }
}
