//! The canonical wire format is consensus-critical: logically equal values
//! must produce identical bytes regardless of in-memory layout or insertion
//! order.

mod common;

use std::collections::{BTreeMap, HashMap, HashSet};

use common::{accept_block, node_with, test_config, transfer};
use meridian::keys::generate_keypair;
use meridian::serialize::{canonical_bytes, decode_all, hash_of};
use meridian::types::{
    CheckpointBlock, CheckpointCache, Height, Id, LastTransactionRef, Snapshot, SnapshotInfo,
    StoredSnapshot,
};

#[tokio::test]
async fn snapshot_info_round_trips_losslessly() {
    let node = node_with(test_config(2, 0, 30));
    node.ledger.addresses.set_balance("alice", 42);
    accept_block(&node, 1, vec![transfer("alice", "bob", 2)]);
    node.checkpoints.put_tip("tip", Height::single(3));
    node.service.attempt_snapshot().await.unwrap();
    accept_block(&node, 3, vec![transfer("bob", "carol", 1)]);

    let info = node.service.collect_snapshot_info();
    let decoded: SnapshotInfo = decode_all(&canonical_bytes(&info)).unwrap();
    assert_eq!(decoded, info);
}

#[test]
fn map_insertion_order_does_not_change_the_bytes() {
    let keypair = generate_keypair();
    let block = CheckpointBlock::new(Vec::new(), Vec::new(), &[], &keypair);
    let cache = CheckpointCache::new(block, Height::single(1));
    let soe_hash = cache.soe_hash();

    let build = |reverse: bool| {
        let mut checkpoints = HashMap::new();
        checkpoints.insert(soe_hash.clone(), cache.clone());
        let keys = if reverse {
            vec!["zz", "aa", "mm"]
        } else {
            vec!["aa", "mm", "zz"]
        };
        let mut accepted = HashSet::new();
        let mut refs = HashMap::new();
        for key in keys {
            accepted.insert(key.to_string());
            refs.insert(key.to_string(), LastTransactionRef::empty());
        }
        SnapshotInfo {
            snapshot: StoredSnapshot::new(Snapshot::zero(), Vec::new()),
            last_snapshot_height: 0,
            next_snapshot_hash: Snapshot::zero().hash(),
            checkpoints,
            waiting_for_acceptance: HashSet::new(),
            accepted,
            awaiting: HashSet::new(),
            in_snapshot: HashMap::new(),
            address_cache: HashMap::new(),
            last_accepted_transaction_ref: refs,
            tips: HashMap::new(),
            usages: HashMap::new(),
        }
    };

    assert_eq!(canonical_bytes(&build(false)), canonical_bytes(&build(true)));
}

#[test]
fn reputation_hashing_is_deterministic_across_orderings() {
    let ids: Vec<Id> = (0u8..4).map(|byte| Id::from_bytes([byte; 32])).collect();
    let forward: BTreeMap<Id, f64> = ids
        .iter()
        .enumerate()
        .map(|(index, id)| (*id, index as f64 / 4.0))
        .collect();
    let backward: BTreeMap<Id, f64> = ids
        .iter()
        .enumerate()
        .rev()
        .map(|(index, id)| (*id, index as f64 / 4.0))
        .collect();

    let left = Snapshot::new("prev", vec!["a".into()], forward);
    let right = Snapshot::new("prev", vec!["a".into()], backward);
    assert_eq!(left.hash(), right.hash());
    assert_eq!(hash_of(&left), hash_of(&right));
}

#[test]
fn stored_snapshot_hash_is_content_addressed() {
    let keypair = generate_keypair();
    let block = CheckpointBlock::new(vec![], vec![], &[], &keypair);
    let cache = CheckpointCache::new(block, Height::new(1, 1));
    let snapshot = Snapshot::new(
        Snapshot::zero().hash(),
        vec![cache.soe_hash()],
        BTreeMap::new(),
    );
    let stored = StoredSnapshot::new(snapshot, vec![cache]);

    let bytes = canonical_bytes(&stored);
    let decoded: StoredSnapshot = decode_all(&bytes).unwrap();
    assert_eq!(canonical_bytes(&decoded), bytes);
    assert_eq!(decoded.snapshot.hash(), stored.snapshot.hash());
}
