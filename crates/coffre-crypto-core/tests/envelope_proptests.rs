#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Property-based tests for AES-256-GCM envelope encryption.

use coffre_crypto_core::envelope::{decrypt, encrypt, WrappedData, KEY_LEN};
use proptest::prelude::*;

/// Fixed key for property tests.
const PROP_KEY: [u8; KEY_LEN] = [0xCC; KEY_LEN];

proptest! {
    /// Encrypt→decrypt roundtrip always recovers original plaintext (empty AAD).
    #[test]
    fn encrypt_decrypt_roundtrip(
        plaintext in proptest::collection::vec(any::<u8>(), 0..4096),
    ) {
        let wrapped = encrypt(&plaintext, &PROP_KEY, &[])
            .expect("encrypt should succeed");
        let decrypted = decrypt(&wrapped, &PROP_KEY, &[])
            .expect("decrypt should succeed");
        prop_assert_eq!(decrypted.expose(), plaintext.as_slice());
    }

    /// Encrypt→decrypt roundtrip with arbitrary AAD.
    #[test]
    fn encrypt_decrypt_roundtrip_with_aad(
        plaintext in proptest::collection::vec(any::<u8>(), 0..2048),
        aad in proptest::collection::vec(any::<u8>(), 0..256),
    ) {
        let wrapped = encrypt(&plaintext, &PROP_KEY, &aad)
            .expect("encrypt should succeed");
        let decrypted = decrypt(&wrapped, &PROP_KEY, &aad)
            .expect("decrypt should succeed");
        prop_assert_eq!(decrypted.expose(), plaintext.as_slice());
    }

    /// Wire layout roundtrips for any bundle.
    #[test]
    fn wire_layout_roundtrip(
        plaintext in proptest::collection::vec(any::<u8>(), 0..2048),
    ) {
        let wrapped = encrypt(&plaintext, &PROP_KEY, &[])
            .expect("encrypt should succeed");
        let bytes = wrapped.to_bytes();
        let back = WrappedData::from_bytes(&bytes)
            .expect("from_bytes should succeed");
        prop_assert_eq!(back, wrapped);
    }

    /// Flipping any single ciphertext bit fails authentication.
    #[test]
    fn single_bit_flip_fails(
        plaintext in proptest::collection::vec(any::<u8>(), 1..512),
        byte_index in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let mut wrapped = encrypt(&plaintext, &PROP_KEY, &[])
            .expect("encrypt should succeed");
        let index = byte_index.index(wrapped.ciphertext.len());
        wrapped.ciphertext[index] ^= 1 << bit;
        prop_assert!(decrypt(&wrapped, &PROP_KEY, &[]).is_err());
    }
}
