//! In-memory snapshot pointer: the node's current view of the ledger head.

use parking_lot::RwLock;

use crate::types::{Snapshot, StoredSnapshot};

struct SnapshotState {
    stored: StoredSnapshot,
    last_snapshot_height: i64,
    next_snapshot_hash: String,
}

pub struct SnapshotStorage {
    inner: RwLock<SnapshotState>,
}

impl SnapshotStorage {
    pub fn new() -> Self {
        let stored = StoredSnapshot::zero();
        let next_snapshot_hash = stored.snapshot.hash();
        Self {
            inner: RwLock::new(SnapshotState {
                stored,
                last_snapshot_height: 0,
                next_snapshot_hash,
            }),
        }
    }

    pub fn stored_snapshot(&self) -> StoredSnapshot {
        self.inner.read().stored.clone()
    }

    pub fn set_stored_snapshot(&self, stored: StoredSnapshot) {
        self.inner.write().stored = stored;
    }

    pub fn current_snapshot(&self) -> Snapshot {
        self.inner.read().stored.snapshot.clone()
    }

    pub fn last_snapshot_height(&self) -> i64 {
        self.inner.read().last_snapshot_height
    }

    pub fn set_last_snapshot_height(&self, height: i64) {
        self.inner.write().last_snapshot_height = height;
    }

    pub fn next_snapshot_hash(&self) -> String {
        self.inner.read().next_snapshot_hash.clone()
    }

    pub fn set_next_snapshot_hash(&self, hash: impl Into<String>) {
        self.inner.write().next_snapshot_hash = hash.into();
    }
}

impl Default for SnapshotStorage {
    fn default() -> Self {
        Self::new()
    }
}
