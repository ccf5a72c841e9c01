//! Session and lock state machine.
//!
//! [`SessionManager`] is the controller boundary the embedding
//! application talks to. It owns the storage handles and the custody
//! client, enforces `Uninitialized → Locked → Unlocked`, appends the
//! audit trail, runs the auto-lock clock, and manages the biometric
//! DEK cache. Key material itself lives in the worker process; this
//! side only ever relays it between the worker and the platform
//! keystore.

use crate::client::CustodyClient;
use crate::proto::{Action, WireHint};
use coffre_crypto_core::{
    generate_password, generate_totp_code, PasswordOptions, TotpCode,
};
use coffre_vault::{
    generate_uuid, reason, AuditEvent, AuditEventType, BiometricStore, SecurityMode,
    VaultCryptoMeta, VaultError, VaultItemSecret, VaultStore,
};
use data_encoding::BASE64;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Default auto-lock timeout.
pub const DEFAULT_AUTO_LOCK: Duration = Duration::from_secs(10 * 60);

/// Shortest permitted auto-lock timeout; shorter configs are clamped.
pub const MIN_AUTO_LOCK: Duration = Duration::from_secs(60);

/// Controller-side session configuration.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Idle time before the session locks itself.
    pub auto_lock_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_lock_timeout: DEFAULT_AUTO_LOCK,
        }
    }
}

/// Where the session currently stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    /// No vault metadata exists yet.
    Uninitialized,
    /// Metadata exists, no DEK in custody.
    Locked,
    /// The worker holds the DEK.
    Unlocked,
}

struct SessionInner {
    unlocked: bool,
    deadline: Option<Instant>,
}

/// The controller boundary: state machine, audit, auto-lock,
/// biometric cache, item CRUD.
pub struct SessionManager {
    store: Arc<dyn VaultStore>,
    biometric: Arc<dyn BiometricStore>,
    client: CustodyClient,
    auto_lock_timeout: Duration,
    inner: Mutex<SessionInner>,
}

impl SessionManager {
    /// Wire a session to its stores and a connected custody client.
    ///
    /// The configured auto-lock timeout is clamped to
    /// [`MIN_AUTO_LOCK`].
    #[must_use]
    pub fn new(
        store: Arc<dyn VaultStore>,
        biometric: Arc<dyn BiometricStore>,
        client: CustodyClient,
        config: &SessionConfig,
    ) -> Self {
        Self {
            store,
            biometric,
            client,
            auto_lock_timeout: config.auto_lock_timeout.max(MIN_AUTO_LOCK),
            inner: Mutex::new(SessionInner {
                unlocked: false,
                deadline: None,
            }),
        }
    }

    // -----------------------------------------------------------------
    // Status
    // -----------------------------------------------------------------

    /// Current state, after applying any due auto-lock.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Storage`] if metadata cannot be read.
    pub async fn status(&self) -> Result<SessionStatus, VaultError> {
        self.enforce_auto_lock().await;
        if self.store.load_meta()?.is_none() {
            return Ok(SessionStatus::Uninitialized);
        }
        let inner = self.inner.lock().await;
        Ok(if inner.unlocked {
            SessionStatus::Unlocked
        } else {
            SessionStatus::Locked
        })
    }

    // -----------------------------------------------------------------
    // Setup / unlock / lock / reset
    // -----------------------------------------------------------------

    /// Create the vault and leave the session unlocked.
    ///
    /// Returns the recovery phrase — the only time it is ever shown.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::AlreadyInitialized`] if metadata already
    /// exists, or propagates worker/storage failures.
    pub async fn setup(
        &self,
        master_password: &str,
        hint: Option<WireHint>,
    ) -> Result<String, VaultError> {
        if self.store.load_meta()?.is_some() {
            return Err(VaultError::AlreadyInitialized);
        }

        let result = self
            .call(Action::SetupMasterPassword {
                master_password: master_password.to_owned(),
                hint,
            })
            .await?;

        let meta: VaultCryptoMeta = serde_json::from_value(result["meta"].clone())
            .map_err(|e| VaultError::Storage(format!("setup result decode: {e}")))?;
        let recovery_phrase = result["recoveryPhrase"]
            .as_str()
            .ok_or_else(|| VaultError::Storage("setup result missing phrase".into()))?
            .to_owned();

        self.store.save_meta(&meta)?;
        self.audit(AuditEvent::success(AuditEventType::Setup));
        self.mark_unlocked().await;
        self.cache_dek_for_biometric().await;
        info!("vault created and unlocked");
        Ok(recovery_phrase)
    }

    /// Unlock with the master password.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidSecret`] on a wrong password,
    /// [`VaultError::NotInitialized`] before setup.
    pub async fn unlock_with_master_password(&self, password: &str) -> Result<(), VaultError> {
        let meta = self.require_meta()?;
        let action = Action::UnlockWithMasterPassword {
            meta,
            master_password: password.to_owned(),
        };
        self.unlock_via(
            action,
            AuditEventType::UnlockMasterPassword,
            reason::INVALID_MASTER_PASSWORD,
        )
        .await
    }

    /// Unlock with the recovery phrase.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidSecret`] on a wrong or malformed
    /// phrase, [`VaultError::NotInitialized`] before setup.
    pub async fn unlock_with_recovery_phrase(&self, phrase: &str) -> Result<(), VaultError> {
        let meta = self.require_meta()?;
        let action = Action::UnlockWithRecoveryKey {
            meta,
            recovery_phrase: phrase.to_owned(),
        };
        self.unlock_via(
            action,
            AuditEventType::UnlockRecoveryKey,
            reason::INVALID_RECOVERY_KEY,
        )
        .await
    }

    /// Unlock with the hint answer (relaxed mode only).
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidSecret`] on a wrong answer or
    /// when no hint path is configured.
    pub async fn unlock_with_hint_answer(&self, answer: &str) -> Result<(), VaultError> {
        let meta = self.require_meta()?;
        if meta.security_mode != SecurityMode::Relaxed || !meta.has_hint() {
            self.audit(AuditEvent::failure(
                AuditEventType::UnlockHintAnswer,
                reason::INVALID_HINT_ANSWER,
            ));
            return Err(VaultError::InvalidSecret);
        }
        let action = Action::UnlockWithHintAnswer {
            meta,
            hint_answer: answer.to_owned(),
        };
        self.unlock_via(
            action,
            AuditEventType::UnlockHintAnswer,
            reason::INVALID_HINT_ANSWER,
        )
        .await
    }

    /// Unlock with the cached biometric material.
    ///
    /// Installs the cached DEK in the worker, then exports it back
    /// and compares — a cache that fails the round trip is cleared
    /// and the caller falls back to a primary secret.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::BiometricUnavailable`] when nothing is
    /// enrolled or verification fails (non-fatal: primary unlock
    /// paths remain usable).
    pub async fn unlock_with_biometric(&self) -> Result<(), VaultError> {
        self.require_meta()?;

        let Some(material) = self.biometric.load()? else {
            self.audit(AuditEvent::failure(
                AuditEventType::UnlockBiometric,
                reason::BIOMETRIC_MATERIAL_NOT_FOUND,
            ));
            return Err(VaultError::BiometricUnavailable);
        };

        let verified = self.verify_cached_dek(&material).await;
        if !verified {
            // Poisoned cache: clear it and make sure no half-installed
            // DEK stays in custody.
            if let Err(e) = self.biometric.clear() {
                warn!("failed to clear biometric cache: {e}");
            }
            drop(self.call(Action::Lock).await);
            self.mark_locked().await;
            self.audit(AuditEvent::failure(
                AuditEventType::UnlockBiometric,
                reason::BIOMETRIC_DEK_INVALID,
            ));
            return Err(VaultError::BiometricUnavailable);
        }

        self.audit(AuditEvent::success(AuditEventType::UnlockBiometric));
        self.mark_unlocked().await;
        info!("unlocked via biometric cache");
        Ok(())
    }

    /// Lock the session: the worker zeroizes its DEK.
    ///
    /// # Errors
    ///
    /// Never fails on a dead worker — that state is already locked.
    pub async fn lock(&self) -> Result<(), VaultError> {
        match self.call(Action::Lock).await {
            Ok(_) | Err(VaultError::WorkerUnavailable(_)) => {}
            Err(other) => return Err(other),
        }
        self.mark_locked().await;
        self.audit(AuditEvent::success(AuditEventType::Lock));
        info!("session locked");
        Ok(())
    }

    /// Destroy the vault: custody DEK, biometric cache, metadata,
    /// items, audit trail. The session returns to `Uninitialized`.
    ///
    /// No audit event is recorded for the reset itself: the wipe
    /// destroys the trail, so no entry could survive it.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Storage`] if the wipe fails.
    pub async fn reset(&self) -> Result<(), VaultError> {
        drop(self.call(Action::Lock).await);
        self.mark_locked().await;
        self.biometric.clear()?;
        self.store.wipe()?;
        info!("vault reset to uninitialized");
        Ok(())
    }

    // -----------------------------------------------------------------
    // Rotation
    // -----------------------------------------------------------------

    /// Rotate the master password and return the new recovery phrase.
    ///
    /// Metadata and rewrapped item keys are persisted in one atomic
    /// `replace_all`; the biometric cache is refreshed for the new
    /// DEK.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Locked`] when not unlocked, and
    /// propagates worker/storage failures without partial writes.
    pub async fn rotate_master_password(
        &self,
        new_password: &str,
        hint: Option<WireHint>,
    ) -> Result<String, VaultError> {
        self.ensure_unlocked().await?;
        let meta = self.require_meta()?;
        let items = self.store.list_items()?;

        let result = self
            .call(Action::RotateMasterPassword {
                meta,
                new_master_password: new_password.to_owned(),
                hint,
                items,
            })
            .await?;

        let new_meta: VaultCryptoMeta = serde_json::from_value(result["meta"].clone())
            .map_err(|e| VaultError::Storage(format!("rotation result decode: {e}")))?;
        let new_items: Vec<VaultItemSecret> = serde_json::from_value(result["items"].clone())
            .map_err(|e| VaultError::Storage(format!("rotation result decode: {e}")))?;
        let recovery_phrase = result["recoveryPhrase"]
            .as_str()
            .ok_or_else(|| VaultError::Storage("rotation result missing phrase".into()))?
            .to_owned();

        if let Err(err) = self.store.replace_all(&new_meta, &new_items) {
            // Storage kept the old hierarchy but the worker already
            // holds the new DEK; force a lock so the next unlock
            // re-derives from what was actually persisted.
            drop(self.call(Action::Lock).await);
            self.mark_locked().await;
            return Err(err);
        }
        self.audit(AuditEvent::success(AuditEventType::Rotation));

        // The cached DEK is now stale; re-enroll from the new one.
        if self.biometric.has_entry()? {
            self.biometric.clear()?;
            self.cache_dek_for_biometric().await;
        }

        self.touch().await;
        info!("master password rotated");
        Ok(recovery_phrase)
    }

    // -----------------------------------------------------------------
    // Items
    // -----------------------------------------------------------------

    /// Encrypt and store a new item; returns its generated id.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Locked`] when not unlocked.
    pub async fn create_item(&self, payload: &[u8]) -> Result<String, VaultError> {
        self.ensure_unlocked().await?;
        let item_id = generate_uuid();
        let result = self
            .call(Action::EncryptItemPayload {
                item_id: item_id.clone(),
                payload: payload.to_vec(),
            })
            .await?;
        let item: VaultItemSecret = serde_json::from_value(result["item"].clone())
            .map_err(|e| VaultError::Storage(format!("encrypt result decode: {e}")))?;
        self.store.save_item(&item)?;
        self.touch().await;
        Ok(item_id)
    }

    /// Decrypt one item's payload.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::ItemNotFound`] for an unknown id,
    /// [`VaultError::Locked`] when not unlocked.
    pub async fn read_item(&self, item_id: &str) -> Result<Vec<u8>, VaultError> {
        self.ensure_unlocked().await?;
        let item = self
            .store
            .load_item(item_id)?
            .ok_or_else(|| VaultError::ItemNotFound(item_id.to_owned()))?;
        let result = self.call(Action::DecryptItemPayload { item }).await?;
        let payload = result["payload"]
            .as_str()
            .ok_or_else(|| VaultError::Storage("decrypt result missing payload".into()))?;
        let bytes = BASE64
            .decode(payload.as_bytes())
            .map_err(|e| VaultError::Storage(format!("decrypt result decode: {e}")))?;
        self.touch().await;
        Ok(bytes)
    }

    /// Replace an item's payload, keeping its item key.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::ItemNotFound`] for an unknown id,
    /// [`VaultError::Locked`] when not unlocked.
    pub async fn update_item(&self, item_id: &str, payload: &[u8]) -> Result<(), VaultError> {
        self.ensure_unlocked().await?;
        let item = self
            .store
            .load_item(item_id)?
            .ok_or_else(|| VaultError::ItemNotFound(item_id.to_owned()))?;
        let result = self
            .call(Action::ReencryptItemPayload {
                item,
                payload: payload.to_vec(),
            })
            .await?;
        let updated: VaultItemSecret = serde_json::from_value(result["item"].clone())
            .map_err(|e| VaultError::Storage(format!("reencrypt result decode: {e}")))?;
        self.store.save_item(&updated)?;
        self.touch().await;
        Ok(())
    }

    /// Delete an item. Unknown ids are a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Locked`] when not unlocked.
    pub async fn delete_item(&self, item_id: &str) -> Result<(), VaultError> {
        self.ensure_unlocked().await?;
        self.store.delete_item(item_id)?;
        self.touch().await;
        Ok(())
    }

    /// List stored item ids.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Storage`] on backend failure.
    pub fn list_item_ids(&self) -> Result<Vec<String>, VaultError> {
        Ok(self
            .store
            .list_items()?
            .into_iter()
            .map(|item| item.item_id)
            .collect())
    }

    // -----------------------------------------------------------------
    // Generators
    // -----------------------------------------------------------------

    /// Generate a random password. Works locked — no key material is
    /// involved.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Crypto`] on invalid options.
    pub fn generate_password(&self, options: &PasswordOptions) -> Result<String, VaultError> {
        Ok(generate_password(options)?)
    }

    /// Current TOTP code for a Base32 secret. Works locked only in
    /// the sense that the caller already holds the decrypted secret.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Crypto`] on a malformed secret.
    pub fn totp_code(&self, base32_secret: &str) -> Result<TotpCode, VaultError> {
        Ok(generate_totp_code(base32_secret)?)
    }

    // -----------------------------------------------------------------
    // Auto-lock
    // -----------------------------------------------------------------

    /// Lock now if the idle deadline has passed.
    pub async fn enforce_auto_lock(&self) {
        let expired = {
            let inner = self.inner.lock().await;
            inner.unlocked && inner.deadline.is_some_and(|d| Instant::now() >= d)
        };
        if expired {
            debug!("auto-lock deadline reached");
            if let Err(e) = self.lock().await {
                warn!("auto-lock failed: {e}");
            }
        }
    }

    /// Spawn a background ticker that enforces auto-lock every
    /// second. The task ends when the session manager drops.
    pub fn spawn_auto_lock_ticker(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            loop {
                interval.tick().await;
                let Some(session) = weak.upgrade() else { break };
                session.enforce_auto_lock().await;
            }
        })
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    /// Relay one action, treating worker death as an implicit lock.
    async fn call(&self, action: Action) -> Result<serde_json::Value, VaultError> {
        match self.client.call(action).await {
            Err(VaultError::WorkerUnavailable(detail)) => {
                warn!("worker unavailable, session locked: {detail}");
                self.mark_locked().await;
                Err(VaultError::WorkerUnavailable(detail))
            }
            other => other,
        }
    }

    async fn unlock_via(
        &self,
        action: Action,
        event_type: AuditEventType,
        failure_reason: &str,
    ) -> Result<(), VaultError> {
        match self.call(action).await {
            Ok(_) => {
                self.audit(AuditEvent::success(event_type));
                self.mark_unlocked().await;
                self.cache_dek_for_biometric().await;
                Ok(())
            }
            Err(VaultError::InvalidSecret) => {
                self.audit(AuditEvent::failure(event_type, failure_reason));
                Err(VaultError::InvalidSecret)
            }
            Err(other) => Err(other),
        }
    }

    /// Export the live DEK and enroll it in the biometric cache.
    /// Best-effort: failure leaves primary unlock untouched.
    async fn cache_dek_for_biometric(&self) {
        let result = async {
            let exported = self.call(Action::ExportDek).await?;
            let dek = exported["dek"]
                .as_str()
                .ok_or_else(|| VaultError::Storage("export result missing dek".into()))?;
            let bytes = BASE64
                .decode(dek.as_bytes())
                .map_err(|e| VaultError::Storage(format!("export decode: {e}")))?;
            self.biometric.save(&bytes)?;
            self.audit(AuditEvent::success(AuditEventType::BiometricEnroll));
            Ok::<(), VaultError>(())
        }
        .await;
        if let Err(e) = result {
            warn!("biometric DEK caching skipped: {e}");
        }
    }

    /// `setDek` then `exportDek`; `true` when the bytes round-trip.
    async fn verify_cached_dek(&self, material: &[u8]) -> bool {
        let result = async {
            self.call(Action::SetDek {
                dek: material.to_vec(),
            })
            .await?;
            let exported = self.call(Action::ExportDek).await?;
            let dek = exported["dek"]
                .as_str()
                .ok_or_else(|| VaultError::Storage("export result missing dek".into()))?;
            let bytes = BASE64
                .decode(dek.as_bytes())
                .map_err(|e| VaultError::Storage(format!("export decode: {e}")))?;
            Ok::<Vec<u8>, VaultError>(bytes)
        }
        .await;
        matches!(result, Ok(bytes) if bytes == material)
    }

    fn require_meta(&self) -> Result<VaultCryptoMeta, VaultError> {
        self.store.load_meta()?.ok_or(VaultError::NotInitialized)
    }

    async fn ensure_unlocked(&self) -> Result<(), VaultError> {
        self.enforce_auto_lock().await;
        let inner = self.inner.lock().await;
        if inner.unlocked {
            Ok(())
        } else {
            Err(VaultError::Locked)
        }
    }

    async fn mark_unlocked(&self) {
        let mut inner = self.inner.lock().await;
        inner.unlocked = true;
        inner.deadline = Instant::now().checked_add(self.auto_lock_timeout);
    }

    async fn mark_locked(&self) {
        let mut inner = self.inner.lock().await;
        inner.unlocked = false;
        inner.deadline = None;
    }

    /// Refresh the idle deadline after an authenticated operation.
    async fn touch(&self) {
        let mut inner = self.inner.lock().await;
        if inner.unlocked {
            inner.deadline = Instant::now().checked_add(self.auto_lock_timeout);
        }
    }

    fn audit(&self, event: AuditEvent) {
        if let Err(e) = self.store.append_audit(&event) {
            warn!("audit append failed: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
