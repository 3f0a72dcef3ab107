//! Debounced snapshot writer
//!
//! Mutations only mark the store dirty. A background task waits out the
//! debounce window, captures the store under a read lock, then serializes
//! and writes with no lock held. Bursts of mutations collapse into a
//! single write.
//!
//! The task also holds an exclusive advisory lock on `<snapshot>.lock` for
//! as long as it runs, so only one process at a time owns a snapshot file.
//! The lock lives on a sidecar because every write replaces the snapshot
//! itself by rename.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::{Result, RetainError};
use crate::storage::snapshot::Snapshot;
use crate::storage::tiers::TierStore;

/// Pending dirty marks beyond this are redundant: a write is already queued
const QUEUE_DEPTH: usize = 64;

enum WriterCommand {
    Dirty,
    Flush(oneshot::Sender<Result<()>>),
    Shutdown(oneshot::Sender<Result<()>>),
}

/// Handle to the background writer task. Cloning shares the same task.
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    tx: mpsc::Sender<WriterCommand>,
    path: PathBuf,
}

impl std::fmt::Debug for WriterCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriterCommand::Dirty => f.write_str("Dirty"),
            WriterCommand::Flush(_) => f.write_str("Flush"),
            WriterCommand::Shutdown(_) => f.write_str("Shutdown"),
        }
    }
}

impl SnapshotWriter {
    /// Spawn the writer task for `tiers`, writing to `path`.
    ///
    /// Fails with `Persistence` when another writer, in this process or
    /// another one, already owns `path`. The lock is released when the task
    /// stops. Must be called from within a Tokio runtime.
    pub async fn spawn(
        tiers: Arc<RwLock<TierStore>>,
        path: PathBuf,
        debounce: Duration,
    ) -> Result<(Self, JoinHandle<()>)> {
        let lock = open_lock_file(&path).await?;
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let (ready_tx, ready_rx) = oneshot::channel();
        let handle = tokio::spawn(run(lock, ready_tx, rx, tiers, path.clone(), debounce));

        ready_rx.await.map_err(|_| {
            RetainError::Persistence("snapshot writer exited before starting".to_string())
        })??;
        Ok((Self { tx, path }, handle))
    }

    /// Where snapshots are written
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Schedule a write. Never blocks.
    pub fn mark_dirty(&self) {
        match self.tx.try_send(WriterCommand::Dirty) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => {}
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("snapshot writer has stopped; change will not be persisted");
            }
        }
    }

    /// Write now and wait for the result
    pub async fn flush(&self) -> Result<()> {
        self.request(WriterCommand::Flush).await
    }

    /// Write a final snapshot and stop the task. Later dirty marks are
    /// dropped with a warning.
    pub async fn shutdown(&self) -> Result<()> {
        self.request(WriterCommand::Shutdown).await
    }

    async fn request(
        &self,
        command: fn(oneshot::Sender<Result<()>>) -> WriterCommand,
    ) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(command(ack_tx))
            .await
            .map_err(|_| RetainError::Persistence("snapshot writer has stopped".to_string()))?;
        ack_rx.await.map_err(|_| {
            RetainError::Persistence("snapshot writer dropped the flush request".to_string())
        })?
    }
}

/// Sidecar file guarding `path`
pub fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".lock");
    path.with_file_name(name)
}

async fn open_lock_file(path: &Path) -> Result<fd_lock::RwLock<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            RetainError::Persistence(format!(
                "Failed to create data directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    let lock_path = lock_path(path);
    let file = tokio::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)
        .await
        .map_err(|e| {
            RetainError::Persistence(format!("Failed to open {}: {}", lock_path.display(), e))
        })?;
    Ok(fd_lock::RwLock::new(file.into_std().await))
}

async fn run(
    mut lock: fd_lock::RwLock<File>,
    ready: oneshot::Sender<Result<()>>,
    mut rx: mpsc::Receiver<WriterCommand>,
    tiers: Arc<RwLock<TierStore>>,
    path: PathBuf,
    debounce: Duration,
) {
    let mut guard = match lock.try_write() {
        Ok(guard) => Some(guard),
        Err(e) => {
            let _ = ready.send(Err(RetainError::Persistence(format!(
                "Snapshot {} is in use by another process: {}",
                path.display(),
                e
            ))));
            return;
        }
    };
    let _ = ready.send(Ok(()));
    debug!(path = %path.display(), "acquired snapshot lock");

    let mut stopping = false;
    while !stopping {
        let Some(command) = rx.recv().await else {
            break;
        };
        let mut acks = Vec::new();
        if matches!(command, WriterCommand::Dirty) && !debounce.is_zero() {
            tokio::time::sleep(debounce).await;
        }

        // Anything queued meanwhile is covered by the write below.
        let mut pending = Some(command);
        while let Some(command) = pending.take().or_else(|| rx.try_recv().ok()) {
            match command {
                WriterCommand::Dirty => {}
                WriterCommand::Flush(ack) => acks.push(ack),
                WriterCommand::Shutdown(ack) => {
                    acks.push(ack);
                    stopping = true;
                }
            }
        }

        let result = write_once(&tiers, &path).await;
        if let Err(ref e) = result {
            error!(error = %e, path = %path.display(), "failed to persist snapshot");
        }

        // Release before acknowledging so a caller can reopen right away.
        if stopping {
            drop(guard.take());
        }

        for ack in acks {
            let reply = match &result {
                Ok(()) => Ok(()),
                Err(RetainError::Persistence(message)) => {
                    Err(RetainError::Persistence(message.clone()))
                }
                Err(e) => Err(RetainError::Persistence(e.to_string())),
            };
            let _ = ack.send(reply);
        }
    }
    debug!("snapshot writer stopped");
}

async fn write_once(tiers: &RwLock<TierStore>, path: &Path) -> Result<()> {
    let snapshot = {
        let guard = tiers.read().await;
        Snapshot::capture(&guard)
    };
    snapshot.write(path).await?;
    debug!(
        path = %path.display(),
        working = snapshot.working.len(),
        short_term = snapshot.short_term.len(),
        long_term = snapshot.long_term.len(),
        "snapshot written"
    );
    Ok(())
}
