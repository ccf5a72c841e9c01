//! The key-custody worker.
//!
//! Runs in its own process so the DEK never shares an address space
//! with the UI or the controller. The worker holds exactly one piece
//! of state — the live DEK — and is otherwise a pure function of its
//! requests: metadata and item records arrive on the wire and updated
//! versions go back out.
//!
//! Requests are handled strictly sequentially. A `lock` queued behind
//! in-flight work therefore observes a consistent world: nothing is
//! half-encrypted when the DEK drops.

use crate::proto::{Action, Request, Response};
use coffre_crypto_core::{KdfAlgorithm, SecretBytes, DEK_LEN};
use coffre_vault::{
    decrypt_item_payload, encrypt_item_payload, reencrypt_item_payload, rotate_master_password,
    setup_vault, unlock_dek, HintConfig, UnlockSecret, VaultError,
};
use data_encoding::BASE64;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

/// The worker's entire state: at most one live DEK.
#[derive(Default)]
pub struct CustodyWorker {
    dek: Option<SecretBytes<DEK_LEN>>,
}

impl CustodyWorker {
    /// Create a locked worker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` while a DEK is held.
    #[must_use]
    pub const fn is_unlocked(&self) -> bool {
        self.dek.is_some()
    }

    fn dek(&self) -> Result<&SecretBytes<DEK_LEN>, VaultError> {
        self.dek.as_ref().ok_or(VaultError::Locked)
    }

    /// Execute one action against the held state.
    ///
    /// # Errors
    ///
    /// Returns the action's [`VaultError`]; crypto failures never
    /// alter the held DEK.
    #[allow(clippy::too_many_lines)]
    pub fn handle(&mut self, action: Action) -> Result<serde_json::Value, VaultError> {
        match action {
            Action::SetupMasterPassword {
                master_password,
                hint,
            } => {
                let hint_config = hint.as_ref().map(HintConfig::from);
                let outcome = setup_vault(
                    &master_password,
                    hint_config.as_ref(),
                    &KdfAlgorithm::default_for_new_vaults(),
                )?;
                self.dek = Some(outcome.dek);
                info!("vault hierarchy created, worker unlocked");
                Ok(json!({
                    "meta": outcome.meta,
                    "recoveryPhrase": outcome.recovery_phrase,
                }))
            }
            Action::UnlockWithMasterPassword {
                meta,
                master_password,
            } => {
                let dek = unlock_dek(&meta, &UnlockSecret::MasterPassword(&master_password))?;
                self.dek = Some(dek);
                info!("unlocked via master password");
                Ok(json!({}))
            }
            Action::UnlockWithRecoveryKey {
                meta,
                recovery_phrase,
            } => {
                let dek = unlock_dek(&meta, &UnlockSecret::RecoveryPhrase(&recovery_phrase))?;
                self.dek = Some(dek);
                info!("unlocked via recovery phrase");
                Ok(json!({}))
            }
            Action::UnlockWithHintAnswer { meta, hint_answer } => {
                let dek = unlock_dek(&meta, &UnlockSecret::HintAnswer(&hint_answer))?;
                self.dek = Some(dek);
                info!("unlocked via hint answer");
                Ok(json!({}))
            }
            Action::RotateMasterPassword {
                meta,
                new_master_password,
                hint,
                items,
            } => {
                let current = self.dek()?;
                let hint_config = hint.as_ref().map(HintConfig::from);
                let outcome = rotate_master_password(
                    &meta,
                    current,
                    &new_master_password,
                    hint_config.as_ref(),
                    &items,
                )?;
                self.dek = Some(outcome.dek);
                info!(items = outcome.items.len(), "master password rotated");
                Ok(json!({
                    "meta": outcome.meta,
                    "recoveryPhrase": outcome.recovery_phrase,
                    "items": outcome.items,
                }))
            }
            Action::SetDek { dek } => {
                self.dek = Some(SecretBytes::from_slice(&dek)?);
                debug!("DEK installed directly");
                Ok(json!({}))
            }
            Action::ExportDek => {
                let dek = self.dek()?;
                Ok(json!({ "dek": BASE64.encode(dek.expose()) }))
            }
            Action::Lock => {
                // Dropping the SecretBytes zeroizes it.
                self.dek = None;
                info!("worker locked");
                Ok(json!({}))
            }
            Action::IsUnlocked => Ok(json!({ "unlocked": self.is_unlocked() })),
            Action::EncryptItemPayload { item_id, payload } => {
                let item = encrypt_item_payload(self.dek()?, &item_id, &payload)?;
                Ok(json!({ "item": item }))
            }
            Action::DecryptItemPayload { item } => {
                let payload = decrypt_item_payload(self.dek()?, &item)?;
                Ok(json!({ "payload": BASE64.encode(payload.expose()) }))
            }
            Action::ReencryptItemPayload { item, payload } => {
                let updated = reencrypt_item_payload(self.dek()?, &item, &payload)?;
                Ok(json!({ "item": updated }))
            }
            Action::Shutdown => {
                self.dek = None;
                Ok(json!({}))
            }
        }
    }
}

/// Serve the newline-delimited JSON protocol until `shutdown` or EOF.
///
/// Strictly sequential: the next line is not read until the previous
/// response is flushed. Malformed lines get an `ok:false` response
/// (id 0 when the id itself is unreadable) instead of killing the
/// process.
///
/// # Errors
///
/// Returns the underlying I/O error if the transport fails.
pub async fn serve<R, W>(reader: R, mut writer: W) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut worker = CustodyWorker::new();
    let mut line = String::new();

    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            info!("stdin closed, worker exiting");
            break;
        }
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(trimmed) {
            Ok(request) => {
                let shutdown = matches!(request.action, Action::Shutdown);
                let response = match worker.handle(request.action) {
                    Ok(result) => Response::success(request.id, result),
                    Err(err) => {
                        debug!(code = err.code(), "action failed");
                        Response::failure(request.id, &err)
                    }
                };
                write_response(&mut writer, &response).await?;
                if shutdown {
                    info!("shutdown requested, worker exiting");
                    return Ok(());
                }
                continue;
            }
            Err(parse_err) => {
                warn!("unparseable request line: {parse_err}");
                // Salvage the id if the line was at least valid JSON.
                let id = serde_json::from_str::<serde_json::Value>(trimmed)
                    .ok()
                    .and_then(|v| v.get("id").and_then(serde_json::Value::as_u64))
                    .unwrap_or(0);
                Response::failure(
                    id,
                    &VaultError::Storage(format!("malformed request: {parse_err}")),
                )
            }
        };
        write_response(&mut writer, &response).await?;
    }
    Ok(())
}

async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &Response,
) -> std::io::Result<()> {
    let encoded = serde_json::to_string(response).map_err(std::io::Error::other)?;
    writer.write_all(encoded.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const PASSWORD: &str = "CorrectHorseBatteryStaple!123";

    fn setup_action() -> Action {
        Action::SetupMasterPassword {
            master_password: PASSWORD.into(),
            hint: None,
        }
    }

    #[test]
    fn starts_locked() {
        let worker = CustodyWorker::new();
        assert!(!worker.is_unlocked());
    }

    #[test]
    fn setup_unlocks_and_returns_meta() {
        let mut worker = CustodyWorker::new();
        let result = worker.handle(setup_action()).expect("setup should succeed");
        assert!(worker.is_unlocked());
        assert!(result.get("meta").is_some());
        assert!(result["recoveryPhrase"].is_string());
    }

    #[test]
    fn locked_worker_refuses_item_crypto() {
        let mut worker = CustodyWorker::new();
        let result = worker.handle(Action::EncryptItemPayload {
            item_id: "a".into(),
            payload: b"data".to_vec(),
        });
        assert!(matches!(result, Err(VaultError::Locked)));
    }

    #[test]
    fn lock_clears_dek() {
        let mut worker = CustodyWorker::new();
        worker.handle(setup_action()).expect("setup should succeed");
        worker.handle(Action::Lock).expect("lock should succeed");
        assert!(!worker.is_unlocked());
        assert!(matches!(
            worker.handle(Action::ExportDek),
            Err(VaultError::Locked)
        ));
    }

    #[test]
    fn set_and_export_dek_roundtrip() {
        let mut worker = CustodyWorker::new();
        let dek = vec![0x42; 32];
        worker
            .handle(Action::SetDek { dek: dek.clone() })
            .expect("setDek should succeed");
        let result = worker
            .handle(Action::ExportDek)
            .expect("exportDek should succeed");
        let exported = BASE64
            .decode(result["dek"].as_str().expect("dek string").as_bytes())
            .expect("valid base64");
        assert_eq!(exported, dek);
    }

    #[test]
    fn set_dek_rejects_wrong_length() {
        let mut worker = CustodyWorker::new();
        let result = worker.handle(Action::SetDek {
            dek: vec![0x42; 31],
        });
        assert!(result.is_err());
        assert!(!worker.is_unlocked());
    }

    #[test]
    fn item_crypto_roundtrip_through_actions() {
        let mut worker = CustodyWorker::new();
        worker.handle(setup_action()).expect("setup should succeed");

        let encrypted = worker
            .handle(Action::EncryptItemPayload {
                item_id: "item-1".into(),
                payload: b"{\"password\":\"s3cr3t\"}".to_vec(),
            })
            .expect("encrypt should succeed");
        let item = serde_json::from_value(encrypted["item"].clone()).expect("item deserializes");

        let decrypted = worker
            .handle(Action::DecryptItemPayload { item })
            .expect("decrypt should succeed");
        let payload = BASE64
            .decode(decrypted["payload"].as_str().expect("payload").as_bytes())
            .expect("valid base64");
        assert_eq!(payload, b"{\"password\":\"s3cr3t\"}");
    }

    #[tokio::test]
    async fn serve_handles_a_session_over_duplex() {
        let (client_io, worker_io) = tokio::io::duplex(64 * 1024);
        let (worker_read, worker_write) = tokio::io::split(worker_io);
        let server = tokio::spawn(serve(worker_read, worker_write));

        let (client_read, mut client_write) = tokio::io::split(client_io);
        let mut reader = BufReader::new(client_read);

        async fn roundtrip<R, W>(reader: &mut R, writer: &mut W, line: &str) -> Response
        where
            R: AsyncBufReadExt + Unpin,
            W: AsyncWriteExt + Unpin,
        {
            writer.write_all(line.as_bytes()).await.unwrap();
            writer.write_all(b"\n").await.unwrap();
            let mut response = String::new();
            reader.read_line(&mut response).await.unwrap();
            serde_json::from_str::<Response>(response.trim_end()).unwrap()
        }

        let response = roundtrip(
            &mut reader,
            &mut client_write,
            r#"{"id":1,"action":"isUnlocked"}"#,
        )
        .await;
        assert!(response.ok);
        assert_eq!(response.result.unwrap()["unlocked"], false);

        // Malformed line keeps the worker alive.
        let response = roundtrip(
            &mut reader,
            &mut client_write,
            r#"{"id":2,"action":"noSuchAction"}"#,
        )
        .await;
        assert_eq!(response.id, 2);
        assert!(!response.ok);

        // Not even JSON: id falls back to 0.
        let response = roundtrip(&mut reader, &mut client_write, "garbage").await;
        assert_eq!(response.id, 0);
        assert!(!response.ok);

        let response = roundtrip(
            &mut reader,
            &mut client_write,
            r#"{"id":3,"action":"shutdown"}"#,
        )
        .await;
        assert!(response.ok);

        server.await.unwrap().unwrap();
    }
}
