use ed25519_dalek::Keypair;
use serde::{Deserialize, Serialize};

use crate::errors::ChainResult;
use crate::serialize::{
    self, CanonicalDecode, CanonicalEncode, Reader, Tag, put_i64, put_seq, put_str, put_str_seq,
    put_tag, put_u32,
};
use crate::types::edge::{
    Edge, EdgeHashKind, ObservationEdge, SignedObservationEdge, TypedEdgeHash,
};
use crate::types::id::Id;
use crate::types::transaction::Transaction;

/// A signed statement about a peer's behaviour, carried inside checkpoint
/// blocks and retired when the block is snapshotted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationData {
    pub observed: Id,
    pub event: String,
    pub time: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub data: ObservationData,
    pub signed_observation_edge: SignedObservationEdge,
}

impl Observation {
    pub fn sign(data: ObservationData, keypair: &Keypair) -> Self {
        let observation_edge = ObservationEdge::new(
            Vec::new(),
            TypedEdgeHash::transaction_data(serialize::hash_of(&data)),
        );
        Self {
            data,
            signed_observation_edge: SignedObservationEdge::sign(&observation_edge, keypair),
        }
    }

    /// Identity of the observation; distinct per observer since the
    /// signature participates in the hash.
    pub fn hash(&self) -> String {
        self.signed_observation_edge.hash()
    }
}

/// Commitment of a checkpoint block to its contents: the sorted hashes of
/// every transaction and observation it carries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointEdgeData {
    pub hashes: Vec<String>,
}

impl CheckpointEdgeData {
    pub fn new(mut hashes: Vec<String>) -> Self {
        hashes.sort();
        Self { hashes }
    }
}

/// One DAG vertex: a signed aggregation of transactions and observations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointBlock {
    pub transactions: Vec<Transaction>,
    pub observations: Vec<Observation>,
    pub edge: Edge<CheckpointEdgeData>,
}

impl CheckpointBlock {
    /// Assembles and signs a block on top of the given tip parents.
    pub fn new(
        transactions: Vec<Transaction>,
        observations: Vec<Observation>,
        tips: &[TypedEdgeHash],
        keypair: &Keypair,
    ) -> Self {
        let mut hashes: Vec<String> = transactions.iter().map(Transaction::hash).collect();
        hashes.extend(observations.iter().map(|observation| observation.hash()));
        let data = CheckpointEdgeData::new(hashes);
        let observation_edge = ObservationEdge::new(
            tips.to_vec(),
            TypedEdgeHash::transaction_data(serialize::hash_of(&data)),
        );
        let signed_observation_edge = SignedObservationEdge::sign(&observation_edge, keypair);
        Self {
            transactions,
            observations,
            edge: Edge::new(observation_edge, signed_observation_edge, data),
        }
    }

    /// Block identity: hash of the signed observation edge.
    pub fn soe_hash(&self) -> String {
        self.edge.signed_observation_edge.hash()
    }

    /// The block as a tip parent for a successor block.
    pub fn as_parent(&self) -> TypedEdgeHash {
        TypedEdgeHash::new(self.soe_hash(), EdgeHashKind::TransactionHash)
    }

    pub fn observation_hashes(&self) -> Vec<String> {
        self.observations
            .iter()
            .map(|observation| observation.hash())
            .collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Height {
    pub min: i64,
    pub max: i64,
}

impl Height {
    pub fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    pub fn single(height: i64) -> Self {
        Self {
            min: height,
            max: height,
        }
    }
}

/// What checkpoint storage hands out: the block plus its resolved height and
/// child count.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointCache {
    pub checkpoint_block: CheckpointBlock,
    pub height: Height,
    pub children: u32,
}

impl CheckpointCache {
    pub fn new(checkpoint_block: CheckpointBlock, height: Height) -> Self {
        Self {
            checkpoint_block,
            height,
            children: 0,
        }
    }

    pub fn soe_hash(&self) -> String {
        self.checkpoint_block.soe_hash()
    }
}

impl CanonicalEncode for ObservationData {
    fn encode(&self, out: &mut Vec<u8>) {
        put_tag(out, Tag::ObservationData);
        put_str(out, &self.observed.hex());
        put_str(out, &self.event);
        put_i64(out, self.time);
    }
}

impl CanonicalDecode for ObservationData {
    fn decode(reader: &mut Reader<'_>) -> ChainResult<Self> {
        reader.expect_tag(Tag::ObservationData)?;
        Ok(Self {
            observed: Id::from_hex(&reader.str()?).map_err(|err| {
                crate::errors::ChainError::Serialization(format!("invalid observed id: {err}"))
            })?,
            event: reader.str()?,
            time: reader.i64()?,
        })
    }
}

impl CanonicalEncode for Observation {
    fn encode(&self, out: &mut Vec<u8>) {
        put_tag(out, Tag::Observation);
        self.data.encode(out);
        self.signed_observation_edge.encode(out);
    }
}

impl CanonicalDecode for Observation {
    fn decode(reader: &mut Reader<'_>) -> ChainResult<Self> {
        reader.expect_tag(Tag::Observation)?;
        Ok(Self {
            data: ObservationData::decode(reader)?,
            signed_observation_edge: SignedObservationEdge::decode(reader)?,
        })
    }
}

impl CanonicalEncode for CheckpointEdgeData {
    fn encode(&self, out: &mut Vec<u8>) {
        put_tag(out, Tag::CheckpointEdgeData);
        put_str_seq(out, &self.hashes);
    }
}

impl CanonicalDecode for CheckpointEdgeData {
    fn decode(reader: &mut Reader<'_>) -> ChainResult<Self> {
        reader.expect_tag(Tag::CheckpointEdgeData)?;
        Ok(Self {
            hashes: reader.str_seq()?,
        })
    }
}

impl CanonicalEncode for CheckpointBlock {
    fn encode(&self, out: &mut Vec<u8>) {
        put_tag(out, Tag::CheckpointBlock);
        put_seq(out, &self.transactions);
        put_seq(out, &self.observations);
        self.edge.encode(out);
    }
}

impl CanonicalDecode for CheckpointBlock {
    fn decode(reader: &mut Reader<'_>) -> ChainResult<Self> {
        reader.expect_tag(Tag::CheckpointBlock)?;
        Ok(Self {
            transactions: reader.seq()?,
            observations: reader.seq()?,
            edge: Edge::decode(reader)?,
        })
    }
}

impl CanonicalEncode for Height {
    fn encode(&self, out: &mut Vec<u8>) {
        put_tag(out, Tag::Height);
        put_i64(out, self.min);
        put_i64(out, self.max);
    }
}

impl CanonicalDecode for Height {
    fn decode(reader: &mut Reader<'_>) -> ChainResult<Self> {
        reader.expect_tag(Tag::Height)?;
        Ok(Self {
            min: reader.i64()?,
            max: reader.i64()?,
        })
    }
}

impl CanonicalEncode for CheckpointCache {
    fn encode(&self, out: &mut Vec<u8>) {
        put_tag(out, Tag::CheckpointCache);
        self.checkpoint_block.encode(out);
        self.height.encode(out);
        put_u32(out, self.children);
    }
}

impl CanonicalDecode for CheckpointCache {
    fn decode(reader: &mut Reader<'_>) -> ChainResult<Self> {
        reader.expect_tag(Tag::CheckpointCache)?;
        Ok(Self {
            checkpoint_block: CheckpointBlock::decode(reader)?,
            height: Height::decode(reader)?,
            children: reader.u32()?,
        })
    }
}
