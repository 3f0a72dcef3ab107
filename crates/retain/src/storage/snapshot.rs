//! Durable snapshots of the whole store
//!
//! One JSON document per store: working and short-term as ordered lists,
//! long-term as an id-keyed map, each item carrying its association set.
//! Files are written to a sibling temp file and renamed into place.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, RetainError};
use crate::memory::types::{MemoryId, MemoryItem, Tier};
use crate::storage::tiers::{TierConfig, TierStore};

/// Current on-disk format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Point-in-time copy of all three tiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub working: Vec<MemoryItem>,
    pub short_term: Vec<MemoryItem>,
    pub long_term: BTreeMap<MemoryId, MemoryItem>,
}

impl Snapshot {
    /// Copy the current contents of `store`
    pub fn capture(store: &TierStore) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            working: store.working.iter().cloned().collect(),
            short_term: store.short_term.iter().cloned().collect(),
            long_term: store
                .long_term
                .iter()
                .map(|(id, item)| (*id, item.clone()))
                .collect(),
        }
    }

    /// Rebuild a store from this snapshot.
    ///
    /// Damaged input is repaired rather than rejected: tier fields are reset
    /// to the collection the item was found in, invalid and duplicate items
    /// are dropped, bounded tiers keep only their newest entries, and
    /// associations are made symmetric between surviving long-term items.
    pub fn into_store(self, config: TierConfig) -> TierStore {
        let mut seen = std::collections::HashSet::new();
        let mut repaired = 0usize;

        let mut keep = |mut item: MemoryItem, tier: Tier| -> Option<MemoryItem> {
            if item.validate().is_err() || !seen.insert(item.id) {
                repaired += 1;
                return None;
            }
            if item.tier != tier {
                repaired += 1;
                item.tier = tier;
            }
            if tier != Tier::LongTerm && !item.associations.is_empty() {
                repaired += 1;
                item.associations.clear();
            }
            Some(item)
        };

        let mut long_term: HashMap<MemoryId, MemoryItem> = HashMap::new();
        for (key, mut item) in self.long_term {
            item.id = key;
            if let Some(item) = keep(item, Tier::LongTerm) {
                long_term.insert(key, item);
            }
        }
        let working: Vec<MemoryItem> = self
            .working
            .into_iter()
            .filter_map(|item| keep(item, Tier::Working))
            .collect();
        let short_term: Vec<MemoryItem> = self
            .short_term
            .into_iter()
            .filter_map(|item| keep(item, Tier::ShortTerm))
            .collect();

        repaired += repair_associations(&mut long_term);

        let working = newest(working, config.working_capacity, &mut repaired);
        let short_term = newest(short_term, config.short_term_capacity, &mut repaired);

        if repaired > 0 {
            warn!(repaired, "snapshot needed repairs during restore");
        }

        let store = TierStore {
            config,
            working,
            short_term,
            long_term,
        };
        debug_assert!(store.check_invariants().is_ok());
        store
    }

    /// Read a snapshot file.
    ///
    /// Returns `Ok(None)` when the file does not exist (cold start).
    pub async fn load(path: &Path) -> Result<Option<Snapshot>> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(RetainError::Persistence(format!(
                    "Failed to read snapshot {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let corrupt = |e: serde_json::Error| {
            RetainError::Persistence(format!("Corrupt snapshot {}: {}", path.display(), e))
        };

        // Other versions may lay out the rest of the file differently.
        let header: SnapshotHeader = serde_json::from_slice(&bytes).map_err(corrupt)?;
        if header.version != SNAPSHOT_VERSION {
            return Err(RetainError::Persistence(format!(
                "Unsupported snapshot version {} in {} (expected {})",
                header.version,
                path.display(),
                SNAPSHOT_VERSION
            )));
        }

        let snapshot: Snapshot = serde_json::from_slice(&bytes).map_err(corrupt)?;
        Ok(Some(snapshot))
    }

    /// Serialize and atomically replace the file at `path`
    pub async fn write(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec(self)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                RetainError::Persistence(format!(
                    "Failed to create data directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let tmp = temp_path(path);
        tokio::fs::write(&tmp, &bytes).await.map_err(|e| {
            RetainError::Persistence(format!("Failed to write {}: {}", tmp.display(), e))
        })?;
        tokio::fs::rename(&tmp, path).await.map_err(|e| {
            RetainError::Persistence(format!(
                "Failed to move snapshot into place at {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(())
    }
}

/// Just enough of a snapshot to tell which layout the rest uses
#[derive(Deserialize)]
struct SnapshotHeader {
    version: u32,
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Drop dangling links and mirror one-sided ones. Returns the number of fixes.
fn repair_associations(long_term: &mut HashMap<MemoryId, MemoryItem>) -> usize {
    let mut fixes = 0;

    let links: Vec<(MemoryId, MemoryId)> = long_term
        .values()
        .flat_map(|item| item.associations.iter().map(move |peer| (item.id, *peer)))
        .collect();

    for (from, to) in links {
        if from == to || !long_term.contains_key(&to) {
            if let Some(item) = long_term.get_mut(&from) {
                item.associations.remove(&to);
            }
            fixes += 1;
        } else if let Some(peer) = long_term.get_mut(&to) {
            if peer.associations.insert(from) {
                fixes += 1;
            }
        }
    }

    fixes
}

/// Keep the newest `capacity` entries, preserving order
fn newest(items: Vec<MemoryItem>, capacity: usize, repaired: &mut usize) -> VecDeque<MemoryItem> {
    let mut queue: VecDeque<MemoryItem> = items.into();
    while queue.len() > capacity {
        queue.pop_front();
        *repaired += 1;
    }
    queue
}
