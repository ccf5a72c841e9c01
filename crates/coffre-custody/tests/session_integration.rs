#![allow(clippy::unwrap_used)]

//! End-to-end scenarios over an in-process worker.

use coffre_custody::{Action, CustodyClient, SessionConfig, SessionManager, SessionStatus};
use coffre_vault::{MemoryBiometricStore, MemoryVaultStore, VaultError};
use data_encoding::BASE64;
use std::sync::Arc;

const PASSWORD: &str = "CorrectHorseBatteryStaple!123";

fn connected_client() -> CustodyClient {
    let (client_io, worker_io) = tokio::io::duplex(256 * 1024);
    let (worker_read, worker_write) = tokio::io::split(worker_io);
    tokio::spawn(coffre_custody::serve(worker_read, worker_write));
    let (client_read, client_write) = tokio::io::split(client_io);
    CustodyClient::connect(client_read, client_write)
}

fn session() -> SessionManager {
    SessionManager::new(
        Arc::new(MemoryVaultStore::new()),
        Arc::new(MemoryBiometricStore::new()),
        connected_client(),
        &SessionConfig::default(),
    )
}

#[tokio::test]
async fn end_to_end_recovery_scenario() {
    let session = session();

    // Setup, shown the recovery phrase exactly once.
    let recovery_phrase = session.setup(PASSWORD, None).await.unwrap();
    assert_eq!(session.status().await.unwrap(), SessionStatus::Unlocked);

    // Store a login item.
    let payload = br#"{"username":"alice","password":"s3cr3t"}"#;
    let item_id = session.create_item(payload).await.unwrap();

    // Lock, then recover without the master password.
    session.lock().await.unwrap();
    assert!(matches!(
        session.read_item(&item_id).await,
        Err(VaultError::Locked)
    ));

    session
        .unlock_with_recovery_phrase(&recovery_phrase)
        .await
        .unwrap();
    assert_eq!(session.read_item(&item_id).await.unwrap(), payload);
}

#[tokio::test]
async fn every_unlock_path_exports_the_same_dek() {
    let session = session();
    let recovery_phrase = session.setup(PASSWORD, None).await.unwrap();

    // The biometric cache was filled from the setup DEK; every path
    // must land the custody worker on the same bytes, which we
    // observe through item decryption.
    let item_id = session.create_item(b"probe").await.unwrap();

    session.lock().await.unwrap();
    session.unlock_with_master_password(PASSWORD).await.unwrap();
    assert_eq!(session.read_item(&item_id).await.unwrap(), b"probe");

    session.lock().await.unwrap();
    session
        .unlock_with_recovery_phrase(&recovery_phrase)
        .await
        .unwrap();
    assert_eq!(session.read_item(&item_id).await.unwrap(), b"probe");

    session.lock().await.unwrap();
    session.unlock_with_biometric().await.unwrap();
    assert_eq!(session.read_item(&item_id).await.unwrap(), b"probe");
}

#[tokio::test]
async fn lock_clears_custody_over_the_wire() {
    let client = connected_client();

    client
        .call(Action::SetupMasterPassword {
            master_password: PASSWORD.into(),
            hint: None,
        })
        .await
        .unwrap();

    let exported = client.call(Action::ExportDek).await.unwrap();
    let dek = BASE64
        .decode(exported["dek"].as_str().unwrap().as_bytes())
        .unwrap();
    assert_eq!(dek.len(), 32);

    client.call(Action::Lock).await.unwrap();
    assert!(matches!(
        client.call(Action::ExportDek).await,
        Err(VaultError::Locked)
    ));
    let status = client.call(Action::IsUnlocked).await.unwrap();
    assert_eq!(status["unlocked"], false);
}

#[tokio::test]
async fn worker_death_fails_pending_session_calls() {
    let session = session();
    session.setup(PASSWORD, None).await.unwrap();
    let item_id = session.create_item(b"data").await.unwrap();

    // Kill the worker by asking it to exit.
    // Subsequent custody calls must surface WorkerUnavailable and
    // leave the session locked.
    let (client_io, worker_io) = tokio::io::duplex(1024);
    drop(worker_io);
    let (client_read, client_write) = tokio::io::split(client_io);
    let dead_client = CustodyClient::connect(client_read, client_write);
    let dead_session = SessionManager::new(
        Arc::new(MemoryVaultStore::new()),
        Arc::new(MemoryBiometricStore::new()),
        dead_client,
        &SessionConfig::default(),
    );
    assert!(matches!(
        dead_session.setup(PASSWORD, None).await,
        Err(VaultError::WorkerUnavailable(_))
    ));

    // The healthy session is unaffected.
    assert_eq!(session.read_item(&item_id).await.unwrap(), b"data");
}
