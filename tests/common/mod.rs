//! Shared fixtures for the snapshot lifecycle tests: an in-memory blob
//! backend with injectable disk-space readings and a fully wired snapshot
//! service.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use meridian::checkpoint_store::CheckpointStorage;
use meridian::config::NodeConfig;
use meridian::errors::{ChainError, ChainResult};
use meridian::exec::ExecutionPools;
use meridian::file_store::{BlobStorage, SnapshotFileStores};
use meridian::keys::generate_keypair;
use meridian::ledger::LedgerServices;
use meridian::redownload::RedownloadStorage;
use meridian::snapshot::{NodeState, SnapshotService};
use meridian::snapshot_store::SnapshotStorage;
use meridian::telemetry::NodeMetrics;
use meridian::trust::TrustManager;
use meridian::types::{
    CheckpointBlock, CheckpointCache, Height, LastTransactionRef, Transaction,
    new_transaction_edge,
};

const PLENTY_OF_SPACE: u64 = 100 << 30;

#[derive(Default)]
pub struct MemoryBlobStore {
    files: Mutex<HashMap<String, Vec<u8>>>,
    usable: AtomicU64,
    write_failures: AtomicU64,
    write_attempts: AtomicU64,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        let store = Self::default();
        store.usable.store(PLENTY_OF_SPACE, Ordering::Relaxed);
        store
    }

    pub fn set_usable_space(&self, bytes: u64) {
        self.usable.store(bytes, Ordering::Relaxed);
    }

    /// Makes the next `count` writes fail with an I/O error.
    pub fn fail_next_writes(&self, count: u64) {
        self.write_failures.store(count, Ordering::Relaxed);
    }

    pub fn write_attempts(&self) -> u64 {
        self.write_attempts.load(Ordering::Relaxed)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.files.lock().contains_key(key)
    }

    pub fn remove(&self, key: &str) {
        self.files.lock().remove(key);
    }
}

impl BlobStorage for MemoryBlobStore {
    fn write(&self, key: &str, bytes: &[u8], replace: bool) -> ChainResult<()> {
        self.write_attempts.fetch_add(1, Ordering::Relaxed);
        if self.write_failures.load(Ordering::Relaxed) > 0 {
            self.write_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(ChainError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "injected write failure",
            )));
        }
        let mut files = self.files.lock();
        if !replace && files.contains_key(key) {
            return Err(ChainError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("key {key} already stored"),
            )));
        }
        files.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn read(&self, key: &str) -> ChainResult<Vec<u8>> {
        self.files.lock().get(key).cloned().ok_or_else(|| {
            ChainError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("key {key} not stored"),
            ))
        })
    }

    fn exists(&self, key: &str) -> bool {
        self.files.lock().contains_key(key)
    }

    fn delete(&self, key: &str) -> ChainResult<()> {
        self.files.lock().remove(key);
        Ok(())
    }

    fn list(&self) -> ChainResult<Vec<String>> {
        let mut keys: Vec<String> = self.files.lock().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    fn usable_space(&self) -> ChainResult<u64> {
        Ok(self.usable.load(Ordering::Relaxed))
    }

    fn occupied_space(&self) -> ChainResult<u64> {
        Ok(self.files.lock().values().map(|bytes| bytes.len() as u64).sum())
    }
}

pub struct TestNode {
    pub service: SnapshotService,
    pub checkpoints: Arc<CheckpointStorage>,
    pub snapshots: Arc<SnapshotStorage>,
    pub redownload: Arc<RedownloadStorage>,
    pub trust: Arc<TrustManager>,
    pub ledger: LedgerServices,
    pub metrics: Arc<NodeMetrics>,
    pub snapshot_blobs: Arc<MemoryBlobStore>,
    pub info_blobs: Arc<MemoryBlobStore>,
}

pub fn test_config(interval: i64, delay: i64, distance: i64) -> NodeConfig {
    let mut config = NodeConfig::default();
    config.snapshot.snapshot_height_interval = interval;
    config.snapshot.snapshot_height_delay_interval = delay;
    config.snapshot.distance_from_majority = distance;
    config
}

pub fn node_with(config: NodeConfig) -> TestNode {
    let checkpoints = Arc::new(CheckpointStorage::new());
    let snapshots = Arc::new(SnapshotStorage::new());
    let redownload = Arc::new(RedownloadStorage::new());
    let trust = Arc::new(TrustManager::new());
    let ledger = LedgerServices::new();
    let metrics = Arc::new(NodeMetrics::new());
    let snapshot_blobs = Arc::new(MemoryBlobStore::new());
    let info_blobs = Arc::new(MemoryBlobStore::new());
    let rewards_blobs = Arc::new(MemoryBlobStore::new());
    let files = SnapshotFileStores {
        snapshots: snapshot_blobs.clone(),
        snapshot_infos: info_blobs.clone(),
        rewards: rewards_blobs,
    };
    let service = SnapshotService::new(
        &config,
        checkpoints.clone(),
        snapshots.clone(),
        redownload.clone(),
        trust.clone(),
        ledger.clone(),
        files,
        metrics.clone(),
        ExecutionPools::current(),
    );
    service.set_node_state(NodeState::Ready);
    TestNode {
        service,
        checkpoints,
        snapshots,
        redownload,
        trust,
        ledger,
        metrics,
        snapshot_blobs,
        info_blobs,
    }
}

pub fn transfer(src: &str, dst: &str, amount: i64) -> Transaction {
    let keypair = generate_keypair();
    Transaction::new(new_transaction_edge(
        src,
        dst,
        LastTransactionRef::empty(),
        amount,
        &keypair,
        None,
        false,
    ))
}

/// Builds a block of `transactions`, registers it at `height`, marks it
/// accepted, and returns its soeHash.
pub fn accept_block(node: &TestNode, height: i64, transactions: Vec<Transaction>) -> String {
    let keypair = generate_keypair();
    let block = CheckpointBlock::new(transactions, Vec::new(), &[], &keypair);
    let soe_hash = block.soe_hash();
    node.checkpoints
        .insert(CheckpointCache::new(block, Height::single(height)));
    node.checkpoints.mark_accepted(&soe_hash);
    soe_hash
}
