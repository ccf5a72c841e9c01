//! Encrypted vault items.
//!
//! Each item gets its own random 256-bit item key, wrapped under the
//! DEK. Payloads are encrypted under the item key, never the DEK
//! directly, so rotation only rewraps the small item keys and leaves
//! payload ciphertext untouched.

use coffre_crypto_core::WrappedData;
use serde::{Deserialize, Serialize};

/// Current item encryption scheme version.
pub const ENC_VERSION: u32 = 1;

/// Item key length in bytes (256 bits).
pub const ITEM_KEY_LEN: usize = 32;

/// AAD prefix binding an item key to its item.
pub(crate) const ITEM_KEY_AAD_PREFIX: &str = "coffre-item-key:";

/// AAD prefix binding a payload to its item.
pub(crate) const ITEM_PAYLOAD_AAD_PREFIX: &str = "coffre-item-payload:";

/// An item's encrypted secret material as stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultItemSecret {
    /// Stable item identifier (UUID).
    pub item_id: String,
    /// Payload encrypted under the item key.
    pub encrypted_payload: WrappedData,
    /// Item key wrapped under the DEK.
    pub wrapped_item_key: WrappedData,
    /// Encryption scheme version this record was written with.
    pub enc_version: u32,
}

/// AAD for wrapping an item key under the DEK.
pub(crate) fn item_key_aad(item_id: &str) -> Vec<u8> {
    let mut aad = ITEM_KEY_AAD_PREFIX.as_bytes().to_vec();
    aad.extend_from_slice(item_id.as_bytes());
    aad
}

/// AAD for encrypting a payload under its item key.
pub(crate) fn item_payload_aad(item_id: &str) -> Vec<u8> {
    let mut aad = ITEM_PAYLOAD_AAD_PREFIX.as_bytes().to_vec();
    aad.extend_from_slice(item_id.as_bytes());
    aad
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aads_are_distinct_per_item_and_purpose() {
        assert_ne!(item_key_aad("a"), item_key_aad("b"));
        assert_ne!(item_payload_aad("a"), item_payload_aad("b"));
        assert_ne!(item_key_aad("a"), item_payload_aad("a"));
    }

    #[test]
    fn serde_uses_camel_case() {
        let item = VaultItemSecret {
            item_id: "id-1".into(),
            encrypted_payload: WrappedData {
                ciphertext: vec![1, 2, 3],
                nonce: [0; 12],
                tag: [0; 16],
            },
            wrapped_item_key: WrappedData {
                ciphertext: vec![4, 5, 6],
                nonce: [0; 12],
                tag: [0; 16],
            },
            enc_version: ENC_VERSION,
        };
        let json = serde_json::to_value(&item).expect("serialize");
        assert!(json.get("itemId").is_some());
        assert!(json.get("encryptedPayload").is_some());
        assert!(json.get("wrappedItemKey").is_some());
        assert_eq!(json["encVersion"], 1);
    }
}
