//! In-process counters and gauges for the snapshot pipeline. Export names
//! are the node's stable metric surface; sinks live outside this crate.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use parking_lot::RwLock;

#[derive(Default)]
pub struct NodeMetrics {
    snapshot_count: AtomicU64,
    snapshot_write_success: AtomicU64,
    snapshot_write_failure: AtomicU64,
    height_interval_condition_met: AtomicU64,
    height_interval_condition_not_met: AtomicU64,
    no_blocks_within_height_interval: AtomicU64,
    snapshot_invalid_data: AtomicU64,
    cb_accept_query_failed: AtomicU64,
    accepted: AtomicU64,
    awaiting: AtomicU64,
    waiting_for_acceptance: AtomicU64,
    last_snapshot_height: AtomicI64,
    next_snapshot_height: AtomicI64,
    min_tip_height: AtomicI64,
    min_waiting_height: AtomicI64,
    last_snapshot_hash: RwLock<String>,
}

impl NodeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr_snapshot_count(&self) {
        self.snapshot_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot_count(&self) -> u64 {
        self.snapshot_count.load(Ordering::Relaxed)
    }

    pub fn incr_snapshot_write_success(&self) {
        self.snapshot_write_success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_snapshot_write_failure(&self) {
        self.snapshot_write_failure.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_height_interval_condition_met(&self) {
        self.height_interval_condition_met
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_height_interval_condition_not_met(&self) {
        self.height_interval_condition_not_met
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_no_blocks_within_height_interval(&self) {
        self.no_blocks_within_height_interval
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_snapshot_invalid_data(&self) {
        self.snapshot_invalid_data.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot_invalid_data(&self) -> u64 {
        self.snapshot_invalid_data.load(Ordering::Relaxed)
    }

    pub fn incr_cb_accept_query_failed(&self) {
        self.cb_accept_query_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_membership(&self, accepted: u64, awaiting: u64, waiting_for_acceptance: u64) {
        self.accepted.store(accepted, Ordering::Relaxed);
        self.awaiting.store(awaiting, Ordering::Relaxed);
        self.waiting_for_acceptance
            .store(waiting_for_acceptance, Ordering::Relaxed);
    }

    pub fn set_last_snapshot(&self, hash: &str, height: i64) {
        *self.last_snapshot_hash.write() = hash.to_string();
        self.last_snapshot_height.store(height, Ordering::Relaxed);
    }

    pub fn last_snapshot_height(&self) -> i64 {
        self.last_snapshot_height.load(Ordering::Relaxed)
    }

    pub fn set_next_snapshot_height(&self, height: i64) {
        self.next_snapshot_height.store(height, Ordering::Relaxed);
    }

    pub fn set_min_tip_height(&self, height: i64) {
        self.min_tip_height.store(height, Ordering::Relaxed);
    }

    pub fn set_min_waiting_height(&self, height: i64) {
        self.min_waiting_height.store(height, Ordering::Relaxed);
    }

    /// Renders the full metric surface under its stable external names.
    pub fn export(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        let mut put_u64 = |name: &str, value: u64| {
            out.insert(name.to_string(), value.to_string());
        };
        put_u64("snapshotCount", self.snapshot_count.load(Ordering::Relaxed));
        put_u64(
            "snapshotWriteToDisk.success",
            self.snapshot_write_success.load(Ordering::Relaxed),
        );
        put_u64(
            "snapshotWriteToDisk.failure",
            self.snapshot_write_failure.load(Ordering::Relaxed),
        );
        put_u64(
            "snapshotHeightIntervalConditionMet",
            self.height_interval_condition_met.load(Ordering::Relaxed),
        );
        put_u64(
            "snapshotHeightIntervalConditionNotMet",
            self.height_interval_condition_not_met
                .load(Ordering::Relaxed),
        );
        put_u64(
            "snapshotNoBlocksWithinHeightInterval",
            self.no_blocks_within_height_interval
                .load(Ordering::Relaxed),
        );
        put_u64(
            "snapshotInvalidData",
            self.snapshot_invalid_data.load(Ordering::Relaxed),
        );
        put_u64(
            "snapshotCBAcceptQueryFailed",
            self.cb_accept_query_failed.load(Ordering::Relaxed),
        );
        put_u64("accepted", self.accepted.load(Ordering::Relaxed));
        put_u64("awaiting", self.awaiting.load(Ordering::Relaxed));
        put_u64(
            "waitingForAcceptance",
            self.waiting_for_acceptance.load(Ordering::Relaxed),
        );
        out.insert(
            "lastSnapshotHash".to_string(),
            self.last_snapshot_hash.read().clone(),
        );
        out.insert(
            "lastSnapshotHeight".to_string(),
            self.last_snapshot_height.load(Ordering::Relaxed).to_string(),
        );
        out.insert(
            "nextSnapshotHeight".to_string(),
            self.next_snapshot_height.load(Ordering::Relaxed).to_string(),
        );
        out.insert(
            "minTipHeight".to_string(),
            self.min_tip_height.load(Ordering::Relaxed).to_string(),
        );
        out.insert(
            "minWaitingHeight".to_string(),
            self.min_waiting_height.load(Ordering::Relaxed).to_string(),
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_carries_the_stable_names() {
        let metrics = NodeMetrics::new();
        metrics.incr_snapshot_count();
        metrics.set_last_snapshot("abc", 4);
        metrics.set_next_snapshot_height(6);

        let export = metrics.export();
        assert_eq!(export.get("snapshotCount").map(String::as_str), Some("1"));
        assert_eq!(export.get("lastSnapshotHash").map(String::as_str), Some("abc"));
        assert_eq!(export.get("lastSnapshotHeight").map(String::as_str), Some("4"));
        assert_eq!(export.get("nextSnapshotHeight").map(String::as_str), Some("6"));
        assert!(export.contains_key("snapshotWriteToDisk.success"));
        assert!(export.contains_key("minWaitingHeight"));
    }
}
