use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::errors::{ChainError, ChainResult};
use crate::serialize::{
    self, CanonicalDecode, CanonicalEncode, Reader, Tag, put_f64, put_i64, put_seq, put_str,
    put_str_seq, put_tag, put_u32,
};
use crate::types::account::AddressCacheData;
use crate::types::checkpoint::{CheckpointCache, Height};
use crate::types::id::Id;
use crate::types::transaction::LastTransactionRef;

/// A point-in-time commitment to an ordered set of checkpoint hashes plus
/// per-peer reputation. The snapshot's own identity is its content hash.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub last_snapshot: String,
    pub checkpoint_blocks: Vec<String>,
    pub public_reputation: BTreeMap<Id, f64>,
}

impl Snapshot {
    pub fn new(
        last_snapshot: impl Into<String>,
        checkpoint_blocks: Vec<String>,
        public_reputation: BTreeMap<Id, f64>,
    ) -> Self {
        Self {
            last_snapshot: last_snapshot.into(),
            checkpoint_blocks,
            public_reputation,
        }
    }

    /// Genesis sentinel: no predecessor, no blocks.
    pub fn zero() -> Self {
        Self {
            last_snapshot: String::new(),
            checkpoint_blocks: Vec::new(),
            public_reputation: BTreeMap::new(),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.last_snapshot.is_empty()
            && self.checkpoint_blocks.is_empty()
            && self.public_reputation.is_empty()
    }

    pub fn hash(&self) -> String {
        serialize::hash_of(self)
    }
}

/// The on-disk snapshot payload: the snapshot plus the full caches of every
/// included block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredSnapshot {
    pub snapshot: Snapshot,
    pub checkpoint_cache: Vec<CheckpointCache>,
}

impl StoredSnapshot {
    pub fn new(snapshot: Snapshot, checkpoint_cache: Vec<CheckpointCache>) -> Self {
        Self {
            snapshot,
            checkpoint_cache,
        }
    }

    pub fn zero() -> Self {
        Self {
            snapshot: Snapshot::zero(),
            checkpoint_cache: Vec::new(),
        }
    }
}

/// Everything a node needs to resume from a downloaded snapshot: the stored
/// snapshot, the height bookkeeping, the full checkpoint catalog partition,
/// and the ledger-side caches.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    pub snapshot: StoredSnapshot,
    pub last_snapshot_height: i64,
    pub next_snapshot_hash: String,
    pub checkpoints: HashMap<String, CheckpointCache>,
    pub waiting_for_acceptance: HashSet<String>,
    pub accepted: HashSet<String>,
    pub awaiting: HashSet<String>,
    pub in_snapshot: HashMap<String, i64>,
    pub address_cache: HashMap<String, AddressCacheData>,
    pub last_accepted_transaction_ref: HashMap<String, LastTransactionRef>,
    pub tips: HashMap<String, Height>,
    pub usages: HashMap<String, HashSet<String>>,
}

/// Optional per-snapshot reward blob persisted beside the snapshot info.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredRewards {
    pub reputation: BTreeMap<Id, f64>,
}

fn put_reputation(out: &mut Vec<u8>, reputation: &BTreeMap<Id, f64>) {
    put_u32(out, reputation.len() as u32);
    for (id, score) in reputation {
        put_str(out, &id.hex());
        put_f64(out, *score);
    }
}

fn read_reputation(reader: &mut Reader<'_>) -> ChainResult<BTreeMap<Id, f64>> {
    let len = reader.u32()? as usize;
    let mut reputation = BTreeMap::new();
    for _ in 0..len {
        let id = Id::from_hex(&reader.str()?)
            .map_err(|err| ChainError::Serialization(format!("invalid peer id: {err}")))?;
        reputation.insert(id, reader.f64()?);
    }
    Ok(reputation)
}

fn sorted_keys<V>(map: &HashMap<String, V>) -> Vec<&String> {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    keys
}

fn put_str_set(out: &mut Vec<u8>, set: &HashSet<String>) {
    let mut items: Vec<String> = set.iter().cloned().collect();
    items.sort();
    put_str_seq(out, &items);
}

fn read_str_set(reader: &mut Reader<'_>) -> ChainResult<HashSet<String>> {
    Ok(reader.str_seq()?.into_iter().collect())
}

fn put_record_map<V: CanonicalEncode>(out: &mut Vec<u8>, map: &HashMap<String, V>) {
    put_u32(out, map.len() as u32);
    for key in sorted_keys(map) {
        put_str(out, key);
        map[key].encode(out);
    }
}

fn read_record_map<V: CanonicalDecode>(
    reader: &mut Reader<'_>,
) -> ChainResult<HashMap<String, V>> {
    let len = reader.u32()? as usize;
    let mut map = HashMap::with_capacity(len.min(1024));
    for _ in 0..len {
        let key = reader.str()?;
        map.insert(key, V::decode(reader)?);
    }
    Ok(map)
}

impl CanonicalEncode for Snapshot {
    fn encode(&self, out: &mut Vec<u8>) {
        put_tag(out, Tag::Snapshot);
        put_str(out, &self.last_snapshot);
        put_str_seq(out, &self.checkpoint_blocks);
        put_reputation(out, &self.public_reputation);
    }
}

impl CanonicalDecode for Snapshot {
    fn decode(reader: &mut Reader<'_>) -> ChainResult<Self> {
        reader.expect_tag(Tag::Snapshot)?;
        Ok(Self {
            last_snapshot: reader.str()?,
            checkpoint_blocks: reader.str_seq()?,
            public_reputation: read_reputation(reader)?,
        })
    }
}

impl CanonicalEncode for StoredSnapshot {
    fn encode(&self, out: &mut Vec<u8>) {
        put_tag(out, Tag::StoredSnapshot);
        self.snapshot.encode(out);
        put_seq(out, &self.checkpoint_cache);
    }
}

impl CanonicalDecode for StoredSnapshot {
    fn decode(reader: &mut Reader<'_>) -> ChainResult<Self> {
        reader.expect_tag(Tag::StoredSnapshot)?;
        Ok(Self {
            snapshot: Snapshot::decode(reader)?,
            checkpoint_cache: reader.seq()?,
        })
    }
}

impl CanonicalEncode for SnapshotInfo {
    fn encode(&self, out: &mut Vec<u8>) {
        put_tag(out, Tag::SnapshotInfo);
        self.snapshot.encode(out);
        put_i64(out, self.last_snapshot_height);
        put_str(out, &self.next_snapshot_hash);
        put_record_map(out, &self.checkpoints);
        put_str_set(out, &self.waiting_for_acceptance);
        put_str_set(out, &self.accepted);
        put_str_set(out, &self.awaiting);
        put_u32(out, self.in_snapshot.len() as u32);
        for key in sorted_keys(&self.in_snapshot) {
            put_str(out, key);
            put_i64(out, self.in_snapshot[key]);
        }
        put_record_map(out, &self.address_cache);
        put_record_map(out, &self.last_accepted_transaction_ref);
        put_record_map(out, &self.tips);
        put_u32(out, self.usages.len() as u32);
        for key in sorted_keys(&self.usages) {
            put_str(out, key);
            put_str_set(out, &self.usages[key]);
        }
    }
}

impl CanonicalDecode for SnapshotInfo {
    fn decode(reader: &mut Reader<'_>) -> ChainResult<Self> {
        reader.expect_tag(Tag::SnapshotInfo)?;
        let snapshot = StoredSnapshot::decode(reader)?;
        let last_snapshot_height = reader.i64()?;
        let next_snapshot_hash = reader.str()?;
        let checkpoints = read_record_map(reader)?;
        let waiting_for_acceptance = read_str_set(reader)?;
        let accepted = read_str_set(reader)?;
        let awaiting = read_str_set(reader)?;
        let in_snapshot_len = reader.u32()? as usize;
        let mut in_snapshot = HashMap::with_capacity(in_snapshot_len.min(1024));
        for _ in 0..in_snapshot_len {
            let key = reader.str()?;
            in_snapshot.insert(key, reader.i64()?);
        }
        let address_cache = read_record_map(reader)?;
        let last_accepted_transaction_ref = read_record_map(reader)?;
        let tips = read_record_map(reader)?;
        let usages_len = reader.u32()? as usize;
        let mut usages = HashMap::with_capacity(usages_len.min(1024));
        for _ in 0..usages_len {
            let key = reader.str()?;
            usages.insert(key, read_str_set(reader)?);
        }
        Ok(Self {
            snapshot,
            last_snapshot_height,
            next_snapshot_hash,
            checkpoints,
            waiting_for_acceptance,
            accepted,
            awaiting,
            in_snapshot,
            address_cache,
            last_accepted_transaction_ref,
            tips,
            usages,
        })
    }
}

impl CanonicalEncode for StoredRewards {
    fn encode(&self, out: &mut Vec<u8>) {
        put_tag(out, Tag::StoredRewards);
        put_reputation(out, &self.reputation);
    }
}

impl CanonicalDecode for StoredRewards {
    fn decode(reader: &mut Reader<'_>) -> ChainResult<Self> {
        reader.expect_tag(Tag::StoredRewards)?;
        Ok(Self {
            reputation: read_reputation(reader)?,
        })
    }
}
