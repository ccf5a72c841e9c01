//! Async client side of the custody wire protocol.
//!
//! A background read task correlates response lines to pending calls
//! by id. If the worker dies or its stream closes, every pending and
//! future call fails with [`VaultError::WorkerUnavailable`] — the
//! controller treats that as an implicit lock, never as a retry
//! opportunity.

use crate::proto::{Action, Request, Response};
use coffre_vault::VaultError;
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, warn};

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Response>>>>;

/// Handle to a running key-custody worker.
pub struct CustodyClient {
    next_id: AtomicU64,
    pending: PendingMap,
    closed: Arc<AtomicBool>,
    writer: Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
    // Kept so the subprocess is reaped when the client drops.
    _child: Option<Child>,
}

impl CustodyClient {
    /// Spawn the worker binary as a subprocess and connect to it.
    ///
    /// stdin/stdout carry the protocol; stderr is inherited so the
    /// worker's tracing output lands next to the controller's.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::WorkerUnavailable`] if the process
    /// cannot be spawned or its pipes are missing.
    pub fn spawn(worker_path: &Path) -> Result<Self, VaultError> {
        let mut child = Command::new(worker_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| VaultError::WorkerUnavailable(format!("spawn failed: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| VaultError::WorkerUnavailable("worker stdin missing".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| VaultError::WorkerUnavailable("worker stdout missing".into()))?;

        let mut client = Self::connect(stdout, stdin);
        client._child = Some(child);
        Ok(client)
    }

    /// Connect over an arbitrary stream pair (tests use
    /// `tokio::io::duplex` with an in-process [`crate::worker::serve`]).
    pub fn connect<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));
        tokio::spawn(read_loop(
            reader,
            Arc::clone(&pending),
            Arc::clone(&closed),
        ));

        Self {
            next_id: AtomicU64::new(1),
            pending,
            closed,
            writer: Mutex::new(Box::new(writer)),
            _child: None,
        }
    }

    /// Send one action and wait for its response.
    ///
    /// # Errors
    ///
    /// Returns the worker's error mapped back to [`VaultError`], or
    /// [`VaultError::WorkerUnavailable`] if the worker died first.
    pub async fn call(&self, action: Action) -> Result<serde_json::Value, VaultError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(VaultError::WorkerUnavailable(
                "worker stream closed".into(),
            ));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = Request { id, action };
        let line = serde_json::to_string(&request)
            .map_err(|e| VaultError::Storage(format!("request encode: {e}")))?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        {
            let mut writer = self.writer.lock().await;
            let send = async {
                writer.write_all(line.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await
            };
            if let Err(e) = send.await {
                self.pending.lock().await.remove(&id);
                return Err(VaultError::WorkerUnavailable(format!("write failed: {e}")));
            }
        }

        // The read loop may have exited between the insert and the
        // write; its final sweep only drops senders already in the
        // map, so re-check before suspending on the receiver.
        if self.closed.load(Ordering::Acquire) {
            self.pending.lock().await.remove(&id);
            return Err(VaultError::WorkerUnavailable(
                "worker stream closed".into(),
            ));
        }

        let response = rx
            .await
            .map_err(|_| VaultError::WorkerUnavailable("worker stream closed".into()))?;

        if response.ok {
            Ok(response.result.unwrap_or(serde_json::Value::Null))
        } else {
            let wire = response
                .error
                .ok_or_else(|| VaultError::Storage("failure response without error".into()))?;
            Err(VaultError::from(&wire))
        }
    }
}

/// Read response lines and deliver them to waiting callers. Exits on
/// EOF or a transport error, dropping every pending sender so callers
/// observe `WorkerUnavailable`.
async fn read_loop<R: AsyncRead + Unpin>(
    reader: R,
    pending: PendingMap,
    closed: Arc<AtomicBool>,
) {
    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("worker stream closed");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("worker read failed: {e}");
                break;
            }
        }
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<Response>(trimmed) {
            Ok(response) => {
                let sender = pending.lock().await.remove(&response.id);
                match sender {
                    // A dropped receiver means the caller went away; fine.
                    Some(tx) => drop(tx.send(response)),
                    None => warn!(id = response.id, "response with no pending call"),
                }
            }
            Err(e) => warn!("unparseable response line: {e}"),
        }
    }
    // Fail everything still in flight.
    closed.store(true, Ordering::Release);
    pending.lock().await.clear();
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
