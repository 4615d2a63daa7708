//! The snapshot lifecycle: deciding when a snapshot may be cut, selecting
//! the accepted blocks it condenses, constructing and persisting it, and
//! applying the previous snapshot's effects to the ledger services.
//!
//! `attempt_snapshot` is a linear precondition → construction → commit →
//! apply sequence; any precondition failure aborts with a typed error and
//! leaves state untouched. Callers enforce that at most one attempt runs at
//! a time; nothing here takes a lock across an await point, so an attempt is
//! cancellable at every suspension.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use crate::checkpoint_store::CheckpointStorage;
use crate::config::{NodeConfig, ProcessingConfig, SnapshotConfig};
use crate::errors::{ChainError, SnapshotError, SnapshotResult};
use crate::exec::ExecutionPools;
use crate::file_store::{BlobStorage, SnapshotFileStores};
use crate::ledger::LedgerServices;
use crate::redownload::RedownloadStorage;
use crate::serialize::{canonical_bytes, decode_all};
use crate::snapshot_store::SnapshotStorage;
use crate::telemetry::NodeMetrics;
use crate::trust::TrustManager;
use crate::types::{
    CheckpointBlock, CheckpointCache, Snapshot, SnapshotInfo, StoredRewards, StoredSnapshot,
};

/// A snapshot attempt refuses to run with less than this much free disk.
const SNAPSHOT_FREE_SPACE_FLOOR: u64 = 1 << 30;
/// Blob writes retry this many times before surfacing the failure.
const SNAPSHOT_WRITE_ATTEMPTS: u32 = 3;

/// Cluster lifecycle position of this node. Snapshots are only cut while
/// `Ready`; a redownload or shutdown parks the attempter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeState {
    Initial,
    DownloadInProgress,
    Ready,
    Offline,
}

impl NodeState {
    pub fn can_snapshot(&self) -> bool {
        matches!(self, NodeState::Ready)
    }
}

#[derive(Clone, Debug)]
pub struct SnapshotCreated {
    pub hash: String,
    pub height: i64,
    pub snapshot: Snapshot,
}

enum BlobKind {
    Snapshot,
    Info,
    Rewards,
}

impl BlobKind {
    fn wrap(&self, cause: ChainError) -> SnapshotError {
        match self {
            BlobKind::Snapshot => SnapshotError::Io(cause),
            BlobKind::Info => SnapshotError::InfoIo(cause),
            BlobKind::Rewards => SnapshotError::RewardsIo(cause),
        }
    }
}

pub struct SnapshotService {
    checkpoint_storage: Arc<CheckpointStorage>,
    snapshot_storage: Arc<SnapshotStorage>,
    redownload_storage: Arc<RedownloadStorage>,
    trust_manager: Arc<TrustManager>,
    ledger: LedgerServices,
    files: SnapshotFileStores,
    metrics: Arc<NodeMetrics>,
    pools: ExecutionPools,
    node_state: RwLock<NodeState>,
    snapshot_config: SnapshotConfig,
    processing_config: ProcessingConfig,
}

impl SnapshotService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &NodeConfig,
        checkpoint_storage: Arc<CheckpointStorage>,
        snapshot_storage: Arc<SnapshotStorage>,
        redownload_storage: Arc<RedownloadStorage>,
        trust_manager: Arc<TrustManager>,
        ledger: LedgerServices,
        files: SnapshotFileStores,
        metrics: Arc<NodeMetrics>,
        pools: ExecutionPools,
    ) -> Self {
        Self {
            checkpoint_storage,
            snapshot_storage,
            redownload_storage,
            trust_manager,
            ledger,
            files,
            metrics,
            pools,
            node_state: RwLock::new(NodeState::Initial),
            snapshot_config: config.snapshot.clone(),
            processing_config: config.processing.clone(),
        }
    }

    pub fn node_state(&self) -> NodeState {
        *self.node_state.read()
    }

    pub fn set_node_state(&self, state: NodeState) {
        *self.node_state.write() = state;
    }

    /// Height the next snapshot will be cut at.
    pub fn next_snapshot_height(&self) -> i64 {
        self.snapshot_storage.last_snapshot_height()
            + self.snapshot_config.snapshot_height_interval
    }

    /// Runs one snapshot attempt. At most one invocation may be in flight;
    /// the caller serializes attempts and concurrent writers to the
    /// checkpoint and snapshot storages.
    pub async fn attempt_snapshot(&self) -> SnapshotResult<SnapshotCreated> {
        match self.try_snapshot().await {
            Ok(created) => {
                info!(
                    hash = %created.hash,
                    height = created.height,
                    blocks = created.snapshot.checkpoint_blocks.len(),
                    "snapshot created"
                );
                Ok(created)
            }
            Err(err) if err.is_benign() => {
                debug!(%err, "snapshot attempt deferred");
                Err(err)
            }
            Err(err) => {
                match &err {
                    SnapshotError::IllegalState(detail) => {
                        error!(%detail, "snapshot attempt hit an illegal state");
                    }
                    other => warn!(%other, "snapshot attempt failed"),
                }
                Err(err)
            }
        }
    }

    async fn try_snapshot(&self) -> SnapshotResult<SnapshotCreated> {
        if !self.node_state().can_snapshot() {
            return Err(SnapshotError::NodeNotReadyForSnapshots);
        }
        self.validate_accepted_backlog()?;
        self.validate_disk_space()?;

        let last_height = self.snapshot_storage.last_snapshot_height();
        let next_height = last_height + self.snapshot_config.snapshot_height_interval;
        self.validate_distance_from_majority(next_height)?;
        self.validate_height_interval(next_height)?;

        let blocks = self.accepted_blocks_within(last_height, next_height)?;
        let hashes: Vec<String> = blocks.iter().map(CheckpointCache::soe_hash).collect();
        let pairs: Vec<(String, i64)> = hashes
            .iter()
            .map(|soe_hash| (soe_hash.clone(), next_height))
            .collect();

        let public_reputation = self.trust_manager.predicted_reputation();
        let current = self.snapshot_storage.stored_snapshot();
        let next = Snapshot::new(current.snapshot.hash(), hashes, public_reputation);
        let next_hash = next.hash();

        // Published before apply so a crash later is detectable on restart.
        self.snapshot_storage.set_next_snapshot_hash(next_hash.clone());

        self.apply_snapshot(&current).await?;

        self.snapshot_storage.set_last_snapshot_height(next_height);
        self.checkpoint_storage.mark_in_snapshot(&pairs);

        self.metrics.incr_snapshot_count();
        self.metrics.set_last_snapshot(&next_hash, next_height);
        self.metrics
            .set_next_snapshot_height(next_height + self.snapshot_config.snapshot_height_interval);
        self.refresh_membership_metrics();

        self.ledger
            .transactions
            .reset_rate_limits(blocks.iter().map(|cache| &cache.checkpoint_block));

        self.snapshot_storage
            .set_stored_snapshot(StoredSnapshot::new(next.clone(), blocks));
        self.write_snapshot_to_disk(&next).await?;
        self.write_snapshot_info_to_disk().await?;
        self.write_rewards_to_disk(&next).await?;

        Ok(SnapshotCreated {
            hash: next_hash,
            height: next_height,
            snapshot: next,
        })
    }

    fn validate_accepted_backlog(&self) -> SnapshotResult<()> {
        let limit = self.processing_config.max_accepted_cb_hashes_in_memory;
        if limit > 0 && self.checkpoint_storage.accepted_len() > limit {
            return Err(SnapshotError::MaxCbHashesInMemory);
        }
        Ok(())
    }

    fn validate_disk_space(&self) -> SnapshotResult<()> {
        let usable = self
            .files
            .snapshots
            .usable_space()
            .map_err(|err| SnapshotError::Unexpected(format!("disk space probe failed: {err}")))?;
        if usable < SNAPSHOT_FREE_SPACE_FLOOR {
            return Err(SnapshotError::NotEnoughSpace);
        }
        Ok(())
    }

    fn validate_distance_from_majority(&self, next_height: i64) -> SnapshotResult<()> {
        let majority_height = self.redownload_storage.latest_majority_height();
        if next_height > majority_height + self.snapshot_config.distance_from_majority {
            return Err(SnapshotError::Unexpected(
                "Max distance from majority reached".into(),
            ));
        }
        Ok(())
    }

    fn validate_height_interval(&self, next_height: i64) -> SnapshotResult<()> {
        let min_tip_height = self.checkpoint_storage.min_tip_height();
        self.metrics.set_min_tip_height(min_tip_height);
        if let Some(min_waiting) = self.checkpoint_storage.min_waiting_height() {
            self.metrics.set_min_waiting_height(min_waiting);
        }
        if min_tip_height > next_height + self.snapshot_config.snapshot_height_delay_interval {
            self.metrics.incr_height_interval_condition_met();
            Ok(())
        } else {
            self.metrics.incr_height_interval_condition_not_met();
            Err(SnapshotError::HeightIntervalConditionNotMet)
        }
    }

    /// Accepted caches with `last_height < height.min <= next_height`, in
    /// canonical (soeHash) order. An accepted hash without a cache entry is
    /// an invariant violation.
    fn accepted_blocks_within(
        &self,
        last_height: i64,
        next_height: i64,
    ) -> SnapshotResult<Vec<CheckpointCache>> {
        let accepted = self.checkpoint_storage.accepted();
        if accepted.is_empty() {
            return Err(SnapshotError::NoAcceptedCbsSinceSnapshot);
        }
        let mut caches = Vec::with_capacity(accepted.len());
        for soe_hash in &accepted {
            match self.checkpoint_storage.get_checkpoint(soe_hash) {
                Some(cache) => caches.push(cache),
                None => {
                    self.metrics.incr_snapshot_invalid_data();
                    return Err(SnapshotError::IllegalState(format!(
                        "accepted checkpoint {soe_hash} has no cache entry"
                    )));
                }
            }
        }
        let mut within: Vec<CheckpointCache> = caches
            .into_iter()
            .filter(|cache| last_height < cache.height.min && cache.height.min <= next_height)
            .collect();
        if within.is_empty() {
            self.metrics.incr_no_blocks_within_height_interval();
            return Err(SnapshotError::NoBlocksWithinHeightInterval);
        }
        within.sort_by_cached_key(CheckpointCache::soe_hash);
        Ok(within)
    }

    /// Applies the previous snapshot's effects: transfers every non-dummy
    /// transaction, registers them as snapshotted, and retires each block's
    /// observations. CPU-bound, so it runs on the bounded pool.
    pub async fn apply_snapshot(&self, current: &StoredSnapshot) -> SnapshotResult<()> {
        if current.snapshot.is_zero() {
            return Ok(());
        }
        let mut blocks: Vec<CheckpointBlock> =
            Vec::with_capacity(current.snapshot.checkpoint_blocks.len());
        for soe_hash in &current.snapshot.checkpoint_blocks {
            let cache = self
                .checkpoint_storage
                .get_checkpoint(soe_hash)
                .or_else(|| {
                    current
                        .checkpoint_cache
                        .iter()
                        .find(|cache| &cache.soe_hash() == soe_hash)
                        .cloned()
                });
            match cache {
                Some(cache) => blocks.push(cache.checkpoint_block),
                None => {
                    self.metrics.incr_cb_accept_query_failed();
                    return Err(SnapshotError::Unexpected(format!(
                        "snapshotted checkpoint {soe_hash} is missing from storage"
                    )));
                }
            }
        }
        let ledger = self.ledger.clone();
        self.pools
            .run_bounded(move || {
                for block in blocks {
                    let transactions: Vec<_> = block
                        .transactions
                        .iter()
                        .filter(|transaction| !transaction.is_dummy)
                        .cloned()
                        .collect();
                    for transaction in &transactions {
                        ledger.addresses.transfer_snapshot_transaction(transaction)?;
                    }
                    ledger.transactions.apply_snapshot_direct(&transactions);
                    ledger.observations.remove_all(block.observation_hashes());
                }
                Ok::<(), ChainError>(())
            })
            .await?
            .map_err(|err| SnapshotError::Unexpected(format!("ledger application failed: {err}")))
    }

    /// Serializes the stored snapshot on the bounded pool and writes it on
    /// the unbounded pool, retrying with a capacity fail-fast per attempt.
    pub async fn write_snapshot_to_disk(&self, snapshot: &Snapshot) -> SnapshotResult<()> {
        let mut caches = Vec::with_capacity(snapshot.checkpoint_blocks.len());
        for soe_hash in &snapshot.checkpoint_blocks {
            match self.checkpoint_storage.get_checkpoint(soe_hash) {
                Some(cache) => caches.push(cache),
                None => {
                    self.metrics.incr_snapshot_invalid_data();
                    return Err(SnapshotError::IllegalState(format!(
                        "checkpoint {soe_hash} referenced by snapshot is missing"
                    )));
                }
            }
        }
        let stored = StoredSnapshot::new(snapshot.clone(), caches);
        let key = snapshot.hash();
        let bytes = self
            .pools
            .run_bounded(move || canonical_bytes(&stored))
            .await?;
        self.write_with_retry(self.files.snapshots.clone(), key, bytes, BlobKind::Snapshot)
            .await
    }

    /// Persists the full recoverable state under the current snapshot's
    /// hash. Skipped while the ledger still sits on the zero snapshot.
    pub async fn write_snapshot_info_to_disk(&self) -> SnapshotResult<()> {
        let current = self.snapshot_storage.stored_snapshot();
        if current.snapshot.is_zero() {
            return Ok(());
        }
        let info = self.collect_snapshot_info();
        let key = current.snapshot.hash();
        let bytes = self.pools.run_bounded(move || canonical_bytes(&info)).await?;
        self.write_with_retry(self.files.snapshot_infos.clone(), key, bytes, BlobKind::Info)
            .await
    }

    /// Persists the reputation that went into the snapshot as the optional
    /// rewards blob.
    async fn write_rewards_to_disk(&self, snapshot: &Snapshot) -> SnapshotResult<()> {
        let rewards = StoredRewards {
            reputation: snapshot.public_reputation.clone(),
        };
        let key = snapshot.hash();
        let bytes = self
            .pools
            .run_bounded(move || canonical_bytes(&rewards))
            .await?;
        self.write_with_retry(self.files.rewards.clone(), key, bytes, BlobKind::Rewards)
            .await
    }

    async fn write_with_retry(
        &self,
        store: Arc<dyn BlobStorage>,
        key: String,
        bytes: Vec<u8>,
        kind: BlobKind,
    ) -> SnapshotResult<()> {
        let mut last_error: Option<ChainError> = None;
        for attempt in 1..=SNAPSHOT_WRITE_ATTEMPTS {
            if self.is_over_disk_capacity(store.as_ref(), bytes.len() as u64)? {
                self.metrics.incr_snapshot_write_failure();
                return Err(SnapshotError::NotEnoughSpace);
            }
            let store = store.clone();
            let key_for_task = key.clone();
            let bytes_for_task = bytes.clone();
            let outcome = self
                .pools
                .run_unbounded(move || store.write(&key_for_task, &bytes_for_task, true))
                .await?;
            match outcome {
                Ok(()) => {
                    self.metrics.incr_snapshot_write_success();
                    return Ok(());
                }
                Err(err) => {
                    warn!(%key, attempt, error = %err, "snapshot blob write attempt failed");
                    last_error = Some(err);
                }
            }
        }
        self.metrics.incr_snapshot_write_failure();
        let cause = last_error
            .unwrap_or_else(|| ChainError::Config("write retries exhausted".into()));
        Err(kind.wrap(cause))
    }

    /// Capacity gate for a pending write of `len` bytes. A zero disk limit
    /// disables the whole check.
    fn is_over_disk_capacity(
        &self,
        store: &dyn BlobStorage,
        len: u64,
    ) -> SnapshotResult<bool> {
        let limit = self.snapshot_config.snapshot_size_disk_limit;
        if limit == 0 {
            return Ok(false);
        }
        let occupied = store
            .occupied_space()
            .map_err(|err| SnapshotError::Unexpected(format!("disk usage probe failed: {err}")))?;
        let usable = store
            .usable_space()
            .map_err(|err| SnapshotError::Unexpected(format!("disk space probe failed: {err}")))?;
        Ok(occupied.saturating_add(len) > limit || usable < len)
    }

    /// Assembles the full recoverable state from the checkpoint, snapshot,
    /// and ledger stores.
    pub fn collect_snapshot_info(&self) -> SnapshotInfo {
        SnapshotInfo {
            snapshot: self.snapshot_storage.stored_snapshot(),
            last_snapshot_height: self.snapshot_storage.last_snapshot_height(),
            next_snapshot_hash: self.snapshot_storage.next_snapshot_hash(),
            checkpoints: self.checkpoint_storage.checkpoints(),
            waiting_for_acceptance: self.checkpoint_storage.waiting_for_acceptance(),
            accepted: self.checkpoint_storage.accepted(),
            awaiting: self.checkpoint_storage.awaiting(),
            in_snapshot: self.checkpoint_storage.in_snapshot(),
            address_cache: self.ledger.addresses.address_cache(),
            last_accepted_transaction_ref: self
                .ledger
                .transactions
                .last_accepted_transaction_ref(),
            tips: self.checkpoint_storage.tips(),
            usages: self.checkpoint_storage.usages(),
        }
    }

    /// Restore path after a redownload: repopulates the checkpoint and
    /// snapshot storages from `info`, pushes accepted blocks back into the
    /// downstream services, and refreshes the gauges. No disk writes.
    pub fn set_snapshot(&self, info: SnapshotInfo) {
        self.checkpoint_storage.set_checkpoints(info.checkpoints);
        self.checkpoint_storage
            .set_waiting_for_acceptance(info.waiting_for_acceptance);
        self.checkpoint_storage.set_accepted(info.accepted.clone());
        self.checkpoint_storage.set_awaiting(info.awaiting);
        self.checkpoint_storage.set_in_snapshot(info.in_snapshot);
        self.checkpoint_storage.set_tips(info.tips);
        self.checkpoint_storage.set_usages(info.usages);
        self.ledger.addresses.set_address_cache(info.address_cache);
        self.ledger
            .transactions
            .set_last_accepted(info.last_accepted_transaction_ref);
        for soe_hash in &info.accepted {
            if let Some(cache) = self.checkpoint_storage.get_checkpoint(soe_hash) {
                for transaction in &cache.checkpoint_block.transactions {
                    if !transaction.is_dummy {
                        self.ledger.transactions.note_accepted(transaction);
                    }
                }
                for observation in cache.checkpoint_block.observations {
                    self.ledger.observations.put(observation);
                }
            }
        }
        self.snapshot_storage
            .set_last_snapshot_height(info.last_snapshot_height);
        self.snapshot_storage
            .set_next_snapshot_hash(info.next_snapshot_hash);
        let hash = info.snapshot.snapshot.hash();
        self.metrics
            .set_last_snapshot(&hash, info.last_snapshot_height);
        self.snapshot_storage.set_stored_snapshot(info.snapshot);
        self.refresh_membership_metrics();
    }

    /// Restart recovery for the publish-before-apply window: when the next
    /// snapshot hash already points at the committed stored snapshot but its
    /// blob never reached disk, the persistence steps rerun idempotently.
    pub async fn resume_persistence(&self) -> SnapshotResult<bool> {
        let stored = self.snapshot_storage.stored_snapshot();
        if stored.snapshot.is_zero() {
            return Ok(false);
        }
        let hash = stored.snapshot.hash();
        if self.snapshot_storage.next_snapshot_hash() != hash
            || self.files.snapshots.exists(&hash)
        {
            return Ok(false);
        }
        info!(%hash, "re-persisting snapshot after interrupted commit");
        self.write_snapshot_to_disk(&stored.snapshot).await?;
        self.write_snapshot_info_to_disk().await?;
        self.write_rewards_to_disk(&stored.snapshot).await?;
        Ok(true)
    }

    /// Hashes of every snapshot blob on local disk; backs the peer-facing
    /// stored-snapshot listing.
    pub fn local_snapshot_hashes(&self) -> SnapshotResult<Vec<String>> {
        self.files.snapshots.list().map_err(SnapshotError::Io)
    }

    pub async fn read_snapshot(&self, hash: &str) -> SnapshotResult<StoredSnapshot> {
        let store = self.files.snapshots.clone();
        let key = hash.to_string();
        let bytes = self
            .pools
            .run_unbounded(move || store.read(&key))
            .await?
            .map_err(SnapshotError::Io)?;
        self.pools
            .run_bounded(move || decode_all::<StoredSnapshot>(&bytes))
            .await?
            .map_err(SnapshotError::Io)
    }

    pub async fn read_snapshot_info(&self, hash: &str) -> SnapshotResult<SnapshotInfo> {
        let store = self.files.snapshot_infos.clone();
        let key = hash.to_string();
        let bytes = self
            .pools
            .run_unbounded(move || store.read(&key))
            .await?
            .map_err(SnapshotError::InfoIo)?;
        self.pools
            .run_bounded(move || decode_all::<SnapshotInfo>(&bytes))
            .await?
            .map_err(SnapshotError::InfoIo)
    }

    fn refresh_membership_metrics(&self) {
        self.metrics.set_membership(
            self.checkpoint_storage.accepted_len() as u64,
            self.checkpoint_storage.awaiting().len() as u64,
            self.checkpoint_storage.waiting_for_acceptance().len() as u64,
        );
    }
}
