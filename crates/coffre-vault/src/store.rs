//! Storage abstraction.
//!
//! The vault treats its backend as a blob store: metadata, item
//! records, and audit events go in and come out as structured values,
//! and the backend never needs (or gets) key material. The in-memory
//! implementations back the test suite and serve as the reference
//! semantics for real backends.

use crate::audit::AuditEvent;
use crate::error::VaultError;
use crate::items::VaultItemSecret;
use crate::meta::VaultCryptoMeta;
use std::collections::HashMap;
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Persistence backend for vault metadata, items, and the audit trail.
pub trait VaultStore: Send + Sync {
    /// Load the metadata record, `None` before setup.
    fn load_meta(&self) -> Result<Option<VaultCryptoMeta>, VaultError>;

    /// Create or overwrite the metadata record.
    fn save_meta(&self, meta: &VaultCryptoMeta) -> Result<(), VaultError>;

    /// Load one item's encrypted material.
    fn load_item(&self, item_id: &str) -> Result<Option<VaultItemSecret>, VaultError>;

    /// Create or overwrite one item's encrypted material.
    fn save_item(&self, item: &VaultItemSecret) -> Result<(), VaultError>;

    /// Delete one item. Deleting a missing item is not an error.
    fn delete_item(&self, item_id: &str) -> Result<(), VaultError>;

    /// List every stored item.
    fn list_items(&self) -> Result<Vec<VaultItemSecret>, VaultError>;

    /// Atomically replace the metadata and every item record.
    ///
    /// Rotation depends on this being all-or-nothing: a vault must
    /// never persist new metadata alongside item keys wrapped under
    /// the old DEK.
    fn replace_all(
        &self,
        meta: &VaultCryptoMeta,
        items: &[VaultItemSecret],
    ) -> Result<(), VaultError>;

    /// Destroy the vault: metadata, items, and audit trail.
    ///
    /// Only the destructive reset flow calls this; there is no undo.
    fn wipe(&self) -> Result<(), VaultError>;

    /// Append one audit event.
    fn append_audit(&self, event: &AuditEvent) -> Result<(), VaultError>;

    /// List audit events in append order.
    fn list_audit(&self) -> Result<Vec<AuditEvent>, VaultError>;
}

/// Platform-protected storage for cached biometric unlock material.
///
/// Implementations wrap an OS keystore (Keychain, TPM-backed vault);
/// the bytes stored are already an opaque wrapped DEK, so even the
/// in-memory test double leaks nothing useful on its own.
pub trait BiometricStore: Send + Sync {
    /// Persist wrapped biometric material, replacing any existing entry.
    fn save(&self, material: &[u8]) -> Result<(), VaultError>;

    /// Load the wrapped material, `None` when nothing is enrolled.
    fn load(&self) -> Result<Option<Vec<u8>>, VaultError>;

    /// `true` when material is enrolled.
    fn has_entry(&self) -> Result<bool, VaultError>;

    /// Remove any enrolled material. Idempotent.
    fn clear(&self) -> Result<(), VaultError>;
}

// ---------------------------------------------------------------------------
// In-memory implementations
// ---------------------------------------------------------------------------

/// In-memory [`VaultStore`] used by tests and the reference worker.
#[derive(Default)]
pub struct MemoryVaultStore {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    meta: Option<VaultCryptoMeta>,
    items: HashMap<String, VaultItemSecret>,
    audit: Vec<AuditEvent>,
}

impl MemoryVaultStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, VaultError> {
        self.state
            .lock()
            .map_err(|_| VaultError::Storage("memory store poisoned".into()))
    }
}

impl VaultStore for MemoryVaultStore {
    fn load_meta(&self) -> Result<Option<VaultCryptoMeta>, VaultError> {
        Ok(self.locked()?.meta.clone())
    }

    fn save_meta(&self, meta: &VaultCryptoMeta) -> Result<(), VaultError> {
        self.locked()?.meta = Some(meta.clone());
        Ok(())
    }

    fn load_item(&self, item_id: &str) -> Result<Option<VaultItemSecret>, VaultError> {
        Ok(self.locked()?.items.get(item_id).cloned())
    }

    fn save_item(&self, item: &VaultItemSecret) -> Result<(), VaultError> {
        self.locked()?
            .items
            .insert(item.item_id.clone(), item.clone());
        Ok(())
    }

    fn delete_item(&self, item_id: &str) -> Result<(), VaultError> {
        self.locked()?.items.remove(item_id);
        Ok(())
    }

    fn list_items(&self) -> Result<Vec<VaultItemSecret>, VaultError> {
        let mut items: Vec<_> = self.locked()?.items.values().cloned().collect();
        items.sort_by(|a, b| a.item_id.cmp(&b.item_id));
        Ok(items)
    }

    fn replace_all(
        &self,
        meta: &VaultCryptoMeta,
        items: &[VaultItemSecret],
    ) -> Result<(), VaultError> {
        let mut state = self.locked()?;
        state.meta = Some(meta.clone());
        state.items = items
            .iter()
            .map(|item| (item.item_id.clone(), item.clone()))
            .collect();
        Ok(())
    }

    fn wipe(&self) -> Result<(), VaultError> {
        let mut state = self.locked()?;
        *state = MemoryState::default();
        Ok(())
    }

    fn append_audit(&self, event: &AuditEvent) -> Result<(), VaultError> {
        self.locked()?.audit.push(event.clone());
        Ok(())
    }

    fn list_audit(&self) -> Result<Vec<AuditEvent>, VaultError> {
        Ok(self.locked()?.audit.clone())
    }
}

/// In-memory [`BiometricStore`] test double.
#[derive(Default)]
pub struct MemoryBiometricStore {
    material: Mutex<Option<Vec<u8>>>,
}

impl MemoryBiometricStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> Result<std::sync::MutexGuard<'_, Option<Vec<u8>>>, VaultError> {
        self.material
            .lock()
            .map_err(|_| VaultError::Storage("biometric store poisoned".into()))
    }
}

impl BiometricStore for MemoryBiometricStore {
    fn save(&self, material: &[u8]) -> Result<(), VaultError> {
        *self.locked()? = Some(material.to_vec());
        Ok(())
    }

    fn load(&self) -> Result<Option<Vec<u8>>, VaultError> {
        Ok(self.locked()?.clone())
    }

    fn has_entry(&self) -> Result<bool, VaultError> {
        Ok(self.locked()?.is_some())
    }

    fn clear(&self) -> Result<(), VaultError> {
        *self.locked()? = None;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
