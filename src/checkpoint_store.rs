//! Authoritative catalog of checkpoint blocks and their lifecycle states.
//!
//! Blocks move `awaiting` → `waitingForAcceptance` → `accepted` →
//! `inSnapshot`. All partitions live under one lock so the
//! accepted-to-in-snapshot transition commits atomically with respect to
//! every other mutator.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;

use crate::types::{CheckpointCache, Height};

#[derive(Default)]
struct Catalog {
    checkpoints: HashMap<String, CheckpointCache>,
    awaiting: HashSet<String>,
    waiting_for_acceptance: HashSet<String>,
    accepted: HashSet<String>,
    in_snapshot: HashMap<String, i64>,
    tips: HashMap<String, Height>,
    usages: HashMap<String, HashSet<String>>,
}

#[derive(Default)]
pub struct CheckpointStorage {
    inner: RwLock<Catalog>,
}

impl CheckpointStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_checkpoint(&self, soe_hash: &str) -> Option<CheckpointCache> {
        self.inner.read().checkpoints.get(soe_hash).cloned()
    }

    pub fn checkpoints(&self) -> HashMap<String, CheckpointCache> {
        self.inner.read().checkpoints.clone()
    }

    /// Registers a gossip-delivered block as known but not yet validated.
    pub fn insert(&self, cache: CheckpointCache) {
        let mut catalog = self.inner.write();
        let soe_hash = cache.soe_hash();
        catalog.checkpoints.insert(soe_hash.clone(), cache);
        catalog.awaiting.insert(soe_hash);
    }

    pub fn mark_waiting_for_acceptance(&self, soe_hash: &str) {
        let mut catalog = self.inner.write();
        catalog.awaiting.remove(soe_hash);
        catalog.waiting_for_acceptance.insert(soe_hash.to_string());
    }

    pub fn mark_accepted(&self, soe_hash: &str) {
        let mut catalog = self.inner.write();
        catalog.awaiting.remove(soe_hash);
        catalog.waiting_for_acceptance.remove(soe_hash);
        catalog.accepted.insert(soe_hash.to_string());
    }

    /// Finalizes blocks under a snapshot: each hash leaves `accepted` and is
    /// recorded with the snapshot height it was condensed at. Atomic across
    /// the whole batch.
    pub fn mark_in_snapshot(&self, pairs: &[(String, i64)]) {
        let mut catalog = self.inner.write();
        for (soe_hash, height) in pairs {
            catalog.accepted.remove(soe_hash);
            catalog.in_snapshot.insert(soe_hash.clone(), *height);
        }
    }

    pub fn accepted(&self) -> HashSet<String> {
        self.inner.read().accepted.clone()
    }

    pub fn accepted_len(&self) -> usize {
        self.inner.read().accepted.len()
    }

    pub fn awaiting(&self) -> HashSet<String> {
        self.inner.read().awaiting.clone()
    }

    pub fn waiting_for_acceptance(&self) -> HashSet<String> {
        self.inner.read().waiting_for_acceptance.clone()
    }

    pub fn in_snapshot(&self) -> HashMap<String, i64> {
        self.inner.read().in_snapshot.clone()
    }

    pub fn tips(&self) -> HashMap<String, Height> {
        self.inner.read().tips.clone()
    }

    pub fn usages(&self) -> HashMap<String, HashSet<String>> {
        self.inner.read().usages.clone()
    }

    pub fn put_tip(&self, soe_hash: impl Into<String>, height: Height) {
        self.inner.write().tips.insert(soe_hash.into(), height);
    }

    pub fn remove_tip(&self, soe_hash: &str) {
        self.inner.write().tips.remove(soe_hash);
    }

    pub fn register_usage(&self, tip: &str, consumer: impl Into<String>) {
        self.inner
            .write()
            .usages
            .entry(tip.to_string())
            .or_default()
            .insert(consumer.into());
    }

    /// Smallest height among current tips; zero while the DAG has none.
    pub fn min_tip_height(&self) -> i64 {
        self.inner
            .read()
            .tips
            .values()
            .map(|height| height.min)
            .min()
            .unwrap_or(0)
    }

    pub fn min_waiting_height(&self) -> Option<i64> {
        let catalog = self.inner.read();
        catalog
            .waiting_for_acceptance
            .iter()
            .filter_map(|soe_hash| catalog.checkpoints.get(soe_hash))
            .map(|cache| cache.height.min)
            .min()
    }

    pub fn set_checkpoints(&self, checkpoints: HashMap<String, CheckpointCache>) {
        self.inner.write().checkpoints = checkpoints;
    }

    pub fn set_awaiting(&self, awaiting: HashSet<String>) {
        self.inner.write().awaiting = awaiting;
    }

    pub fn set_waiting_for_acceptance(&self, waiting: HashSet<String>) {
        self.inner.write().waiting_for_acceptance = waiting;
    }

    pub fn set_accepted(&self, accepted: HashSet<String>) {
        self.inner.write().accepted = accepted;
    }

    pub fn set_in_snapshot(&self, in_snapshot: HashMap<String, i64>) {
        self.inner.write().in_snapshot = in_snapshot;
    }

    pub fn set_tips(&self, tips: HashMap<String, Height>) {
        self.inner.write().tips = tips;
    }

    pub fn set_usages(&self, usages: HashMap<String, HashSet<String>>) {
        self.inner.write().usages = usages;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_keypair;
    use crate::types::CheckpointBlock;

    fn cache_at(height: i64) -> CheckpointCache {
        let keypair = generate_keypair();
        CheckpointCache::new(
            CheckpointBlock::new(Vec::new(), Vec::new(), &[], &keypair),
            Height::single(height),
        )
    }

    #[test]
    fn lifecycle_transitions_move_between_partitions() {
        let storage = CheckpointStorage::new();
        let cache = cache_at(1);
        let soe_hash = cache.soe_hash();

        storage.insert(cache);
        assert!(storage.awaiting().contains(&soe_hash));

        storage.mark_waiting_for_acceptance(&soe_hash);
        assert!(!storage.awaiting().contains(&soe_hash));
        assert!(storage.waiting_for_acceptance().contains(&soe_hash));

        storage.mark_accepted(&soe_hash);
        assert!(!storage.waiting_for_acceptance().contains(&soe_hash));
        assert!(storage.accepted().contains(&soe_hash));

        storage.mark_in_snapshot(&[(soe_hash.clone(), 2)]);
        assert!(!storage.accepted().contains(&soe_hash));
        assert_eq!(storage.in_snapshot().get(&soe_hash), Some(&2));
    }

    #[test]
    fn min_tip_height_defaults_to_zero() {
        let storage = CheckpointStorage::new();
        assert_eq!(storage.min_tip_height(), 0);

        storage.put_tip("a", Height::single(5));
        storage.put_tip("b", Height::single(3));
        assert_eq!(storage.min_tip_height(), 3);
    }

    #[test]
    fn min_waiting_height_reads_through_checkpoints() {
        let storage = CheckpointStorage::new();
        assert_eq!(storage.min_waiting_height(), None);

        let low = cache_at(2);
        let high = cache_at(9);
        let low_hash = low.soe_hash();
        let high_hash = high.soe_hash();
        storage.insert(low);
        storage.insert(high);
        storage.mark_waiting_for_acceptance(&low_hash);
        storage.mark_waiting_for_acceptance(&high_hash);
        assert_eq!(storage.min_waiting_height(), Some(2));
    }
}
