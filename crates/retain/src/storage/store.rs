//! Shared, persistent memory store
//!
//! `MemoryStore` puts a `TierStore` behind one async `RwLock` and attaches
//! the debounced snapshot writer. Every logical operation holds the lock for
//! its whole duration, so callers on different tasks never observe a
//! half-applied mutation.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::config::Config;
use crate::error::Result;
use crate::memory::types::{MemoryId, MemoryItem, Tier};
use crate::storage::persister::SnapshotWriter;
use crate::storage::query::MemoryQuery;
use crate::storage::retention::{MaintenanceReport, RetentionConfig};
use crate::storage::snapshot::Snapshot;
use crate::storage::tiers::{MemoryStats, TierConfig, TierStore};

/// Thread-safe handle to a tiered memory store. Clones share state.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    tiers: Arc<RwLock<TierStore>>,
    retention: RetentionConfig,
    writer: Option<SnapshotWriter>,
}

impl MemoryStore {
    /// Open the store described by `config`, restoring the last snapshot.
    ///
    /// A missing snapshot is a cold start. An unreadable one is logged and
    /// the store starts empty; the error is not returned. Fails with
    /// `Persistence` when another open store, in any process, owns the
    /// snapshot file.
    pub async fn open(config: &Config) -> Result<Self> {
        config.validate()?;

        if !config.storage.persist {
            info!("persistence disabled; store is memory-only");
            return Ok(Self::in_memory(config.tiers, config.retention));
        }

        // The snapshot is only read once its lock is held.
        let path = config.storage.snapshot_path();
        let tiers = Arc::new(RwLock::new(TierStore::new(config.tiers)));
        let (writer, _handle) =
            SnapshotWriter::spawn(tiers.clone(), path.clone(), config.storage.debounce()).await?;
        *tiers.write().await = restore(&path, config.tiers).await;

        Ok(Self {
            tiers,
            retention: config.retention,
            writer: Some(writer),
        })
    }

    /// A store that never touches disk
    pub fn in_memory(tiers: TierConfig, retention: RetentionConfig) -> Self {
        Self {
            tiers: Arc::new(RwLock::new(TierStore::new(tiers))),
            retention,
            writer: None,
        }
    }

    pub fn retention(&self) -> &RetentionConfig {
        &self.retention
    }

    /// Snapshot file, if this store persists
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.writer.as_ref().map(|w| w.path().as_path())
    }

    fn mark_dirty(&self) {
        if let Some(ref writer) = self.writer {
            writer.mark_dirty();
        }
    }

    /// Insert a memory into the tier named on it
    pub async fn store(&self, item: MemoryItem) -> Result<MemoryId> {
        let id = self.tiers.write().await.store(item)?;
        self.mark_dirty();
        Ok(id)
    }

    pub async fn get(&self, id: MemoryId) -> Option<MemoryItem> {
        self.tiers.read().await.get(id).cloned()
    }

    pub async fn remove(&self, id: MemoryId) -> Result<MemoryItem> {
        let item = self.tiers.write().await.remove(id)?;
        self.mark_dirty();
        Ok(item)
    }

    /// Link two long-term memories. `Ok(false)` if already linked.
    pub async fn associate(&self, a: MemoryId, b: MemoryId) -> Result<bool> {
        let added = self.tiers.write().await.associate(a, b)?;
        if added {
            self.mark_dirty();
        }
        Ok(added)
    }

    /// Unlink two long-term memories. `Ok(false)` if they were not linked.
    pub async fn dissociate(&self, a: MemoryId, b: MemoryId) -> Result<bool> {
        let removed = self.tiers.write().await.dissociate(a, b)?;
        if removed {
            self.mark_dirty();
        }
        Ok(removed)
    }

    /// Memories linked to `id`, pruning links that no longer resolve
    pub async fn related(&self, id: MemoryId) -> Result<Vec<MemoryItem>> {
        let mut tiers = self.tiers.write().await;
        let linked = tiers.get(id).map_or(0, |m| m.associations.len());
        let related = tiers.related(id)?;
        drop(tiers);

        if related.len() != linked {
            self.mark_dirty();
        }
        Ok(related)
    }

    /// Run `query`, bumping access statistics on every match
    pub async fn search(&self, query: &MemoryQuery, tier: Option<Tier>) -> Vec<MemoryItem> {
        let results = self.tiers.write().await.search(query, tier);
        if !results.is_empty() {
            self.mark_dirty();
        }
        results
    }

    pub async fn consolidate(&self) -> Vec<MemoryId> {
        let promoted = self.tiers.write().await.consolidate(&self.retention);
        if !promoted.is_empty() {
            self.mark_dirty();
        }
        promoted
    }

    pub async fn decay(&self) -> Vec<MemoryId> {
        self.decay_at(Utc::now()).await
    }

    pub async fn decay_at(&self, now: DateTime<Utc>) -> Vec<MemoryId> {
        let forgotten = self.tiers.write().await.decay_at(&self.retention, now);
        if !forgotten.is_empty() {
            self.mark_dirty();
        }
        forgotten
    }

    /// Consolidation followed by decay, under a single lock
    pub async fn run_maintenance(&self) -> MaintenanceReport {
        self.run_maintenance_at(Utc::now()).await
    }

    pub async fn run_maintenance_at(&self, now: DateTime<Utc>) -> MaintenanceReport {
        let report = self
            .tiers
            .write()
            .await
            .run_maintenance_at(&self.retention, now);
        if !report.is_empty() {
            self.mark_dirty();
        }
        report
    }

    /// Memories in one tier, in tier order
    pub async fn list(&self, tier: Tier) -> Vec<MemoryItem> {
        self.tiers.read().await.iter_tier(tier).cloned().collect()
    }

    /// Every memory: working, short-term, then long-term
    pub async fn all(&self) -> Vec<MemoryItem> {
        self.tiers.read().await.iter().cloned().collect()
    }

    pub async fn stats(&self) -> MemoryStats {
        self.tiers.read().await.stats()
    }

    /// Point-in-time copy of the whole store
    pub async fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&*self.tiers.read().await)
    }

    /// Write a snapshot now. No-op for memory-only stores.
    pub async fn flush(&self) -> Result<()> {
        match self.writer {
            Some(ref writer) => writer.flush().await,
            None => Ok(()),
        }
    }

    /// Write a final snapshot and stop the background writer
    pub async fn shutdown(&self) -> Result<()> {
        match self.writer {
            Some(ref writer) => {
                writer.shutdown().await?;
                info!("memory store shut down");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

async fn restore(path: &Path, config: TierConfig) -> TierStore {
    match Snapshot::load(path).await {
        Ok(Some(snapshot)) => {
            let store = snapshot.into_store(config);
            let stats = store.stats();
            info!(
                path = %path.display(),
                working = stats.working_count,
                short_term = stats.short_term_count,
                long_term = stats.long_term_count,
                "restored memory snapshot"
            );
            store
        }
        Ok(None) => {
            info!(path = %path.display(), "no snapshot found, starting empty");
            TierStore::new(config)
        }
        Err(e) => {
            error!(error = %e, "could not restore snapshot, starting empty");
            TierStore::new(config)
        }
    }
}
