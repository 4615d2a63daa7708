use std::cmp::Ordering;

use ed25519_dalek::Keypair;
use serde::{Deserialize, Serialize};

use crate::errors::ChainResult;
use crate::keys::{self, signature_to_hex};
use crate::serialize::{
    self, CanonicalDecode, CanonicalEncode, Reader, Tag, put_opt_str, put_seq, put_str, put_tag,
    put_u8,
};
use crate::types::Id;

/// Semantic role of a referenced hash inside an observation edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeHashKind {
    AddressHash,
    TransactionDataHash,
    TransactionHash,
}

impl EdgeHashKind {
    fn as_byte(self) -> u8 {
        match self {
            EdgeHashKind::AddressHash => 1,
            EdgeHashKind::TransactionDataHash => 2,
            EdgeHashKind::TransactionHash => 3,
        }
    }

    fn from_byte(byte: u8) -> ChainResult<Self> {
        match byte {
            1 => Ok(EdgeHashKind::AddressHash),
            2 => Ok(EdgeHashKind::TransactionDataHash),
            3 => Ok(EdgeHashKind::TransactionHash),
            other => Err(crate::errors::ChainError::Serialization(format!(
                "unknown edge hash kind {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedEdgeHash {
    pub hash: String,
    pub kind: EdgeHashKind,
    pub base_hash: Option<String>,
}

impl TypedEdgeHash {
    pub fn new(hash: impl Into<String>, kind: EdgeHashKind) -> Self {
        Self {
            hash: hash.into(),
            kind,
            base_hash: None,
        }
    }

    /// An address parent; the referenced "hash" is the address itself.
    pub fn address(address: impl Into<String>) -> Self {
        Self::new(address, EdgeHashKind::AddressHash)
    }

    pub fn transaction_data(hash: impl Into<String>) -> Self {
        Self::new(hash, EdgeHashKind::TransactionDataHash)
    }
}

/// Parent order is semantically significant: for transactions the source
/// address precedes the destination.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationEdge {
    pub parents: Vec<TypedEdgeHash>,
    pub data: TypedEdgeHash,
}

impl ObservationEdge {
    pub fn new(parents: Vec<TypedEdgeHash>, data: TypedEdgeHash) -> Self {
        Self { parents, data }
    }

    pub fn hash(&self) -> String {
        serialize::hash_of(self)
    }
}

/// One signer's endorsement of a hash. Ordered by signature hex so batches
/// have a canonical layout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashSignature {
    pub signature: String,
    pub id: Id,
}

impl HashSignature {
    pub fn sign(hash: &str, keypair: &Keypair) -> Self {
        let signature = keys::sign_message(keypair, hash.as_bytes());
        Self {
            signature: signature_to_hex(&signature),
            id: Id::from_public_key(&keypair.public),
        }
    }

    /// Verifies the signer's key against the bytes of `hash`.
    pub fn valid(&self, hash: &str) -> bool {
        let Ok(public_key) = self.id.public_key() else {
            return false;
        };
        let Ok(signature) = keys::signature_from_hex(&self.signature) else {
            return false;
        };
        keys::verify_signature(&public_key, hash.as_bytes(), &signature).is_ok()
    }
}

impl Ord for HashSignature {
    fn cmp(&self, other: &Self) -> Ordering {
        self.signature
            .cmp(&other.signature)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for HashSignature {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Signatures over one observation hash. `combine` is commutative,
/// associative, and idempotent; the `hash` field never changes across merges
/// of the same logical observation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureBatch {
    pub hash: String,
    pub signatures: Vec<HashSignature>,
}

impl SignatureBatch {
    pub fn new(hash: impl Into<String>, signatures: Vec<HashSignature>) -> Self {
        let mut batch = Self {
            hash: hash.into(),
            signatures,
        };
        batch.normalize();
        batch
    }

    fn normalize(&mut self) {
        self.signatures.sort();
        self.signatures.dedup();
    }

    pub fn combine(&self, other: &SignatureBatch) -> SignatureBatch {
        let mut signatures = self.signatures.clone();
        signatures.extend(other.signatures.iter().cloned());
        SignatureBatch::new(self.hash.clone(), signatures)
    }

    pub fn plus(&self, other: &SignatureBatch) -> SignatureBatch {
        self.combine(other)
    }

    pub fn with_signature(&self, keypair: &Keypair) -> SignatureBatch {
        let mut signatures = self.signatures.clone();
        signatures.push(HashSignature::sign(&self.hash, keypair));
        SignatureBatch::new(self.hash.clone(), signatures)
    }

    /// True when every signature verifies against the batch hash.
    pub fn valid(&self) -> bool {
        !self.signatures.is_empty() && self.signatures.iter().all(|sig| sig.valid(&self.hash))
    }
}

/// Signature batch over an observation edge. Its own content hash is the
/// identity (`soeHash`) of the enclosing checkpoint block; `base_hash` stays
/// the observation-edge hash regardless of how many signatures accrue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedObservationEdge {
    pub signature_batch: SignatureBatch,
}

impl SignedObservationEdge {
    pub fn sign(observation_edge: &ObservationEdge, keypair: &Keypair) -> Self {
        let hash = observation_edge.hash();
        let signature = HashSignature::sign(&hash, keypair);
        Self {
            signature_batch: SignatureBatch::new(hash, vec![signature]),
        }
    }

    pub fn base_hash(&self) -> &str {
        &self.signature_batch.hash
    }

    pub fn hash(&self) -> String {
        serialize::hash_of(self)
    }
}

/// A signed observation edge together with the data it commits to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge<D> {
    pub observation_edge: ObservationEdge,
    pub signed_observation_edge: SignedObservationEdge,
    pub data: D,
}

impl<D> Edge<D> {
    pub fn new(
        observation_edge: ObservationEdge,
        signed_observation_edge: SignedObservationEdge,
        data: D,
    ) -> Self {
        Self {
            observation_edge,
            signed_observation_edge,
            data,
        }
    }

    pub fn base_hash(&self) -> &str {
        self.signed_observation_edge.base_hash()
    }

    pub fn parents(&self) -> &[TypedEdgeHash] {
        &self.observation_edge.parents
    }
}

impl CanonicalEncode for TypedEdgeHash {
    fn encode(&self, out: &mut Vec<u8>) {
        put_tag(out, Tag::TypedEdgeHash);
        put_str(out, &self.hash);
        put_u8(out, self.kind.as_byte());
        put_opt_str(out, self.base_hash.as_deref());
    }
}

impl CanonicalDecode for TypedEdgeHash {
    fn decode(reader: &mut Reader<'_>) -> ChainResult<Self> {
        reader.expect_tag(Tag::TypedEdgeHash)?;
        Ok(Self {
            hash: reader.str()?,
            kind: EdgeHashKind::from_byte(reader.u8()?)?,
            base_hash: reader.opt_str()?,
        })
    }
}

impl CanonicalEncode for ObservationEdge {
    fn encode(&self, out: &mut Vec<u8>) {
        put_tag(out, Tag::ObservationEdge);
        put_seq(out, &self.parents);
        self.data.encode(out);
    }
}

impl CanonicalDecode for ObservationEdge {
    fn decode(reader: &mut Reader<'_>) -> ChainResult<Self> {
        reader.expect_tag(Tag::ObservationEdge)?;
        Ok(Self {
            parents: reader.seq()?,
            data: TypedEdgeHash::decode(reader)?,
        })
    }
}

impl CanonicalEncode for HashSignature {
    fn encode(&self, out: &mut Vec<u8>) {
        put_tag(out, Tag::HashSignature);
        put_str(out, &self.signature);
        put_str(out, &self.id.hex());
    }
}

impl CanonicalDecode for HashSignature {
    fn decode(reader: &mut Reader<'_>) -> ChainResult<Self> {
        reader.expect_tag(Tag::HashSignature)?;
        Ok(Self {
            signature: reader.str()?,
            id: Id::from_hex(&reader.str()?).map_err(|err| {
                crate::errors::ChainError::Serialization(format!("invalid signer id: {err}"))
            })?,
        })
    }
}

impl CanonicalEncode for SignatureBatch {
    fn encode(&self, out: &mut Vec<u8>) {
        put_tag(out, Tag::SignatureBatch);
        put_str(out, &self.hash);
        // signatures are kept sorted by construction
        put_seq(out, &self.signatures);
    }
}

impl CanonicalDecode for SignatureBatch {
    fn decode(reader: &mut Reader<'_>) -> ChainResult<Self> {
        reader.expect_tag(Tag::SignatureBatch)?;
        let hash = reader.str()?;
        let signatures = reader.seq()?;
        Ok(SignatureBatch::new(hash, signatures))
    }
}

impl CanonicalEncode for SignedObservationEdge {
    fn encode(&self, out: &mut Vec<u8>) {
        put_tag(out, Tag::SignedObservationEdge);
        self.signature_batch.encode(out);
    }
}

impl CanonicalDecode for SignedObservationEdge {
    fn decode(reader: &mut Reader<'_>) -> ChainResult<Self> {
        reader.expect_tag(Tag::SignedObservationEdge)?;
        Ok(Self {
            signature_batch: SignatureBatch::decode(reader)?,
        })
    }
}

impl<D: CanonicalEncode> CanonicalEncode for Edge<D> {
    fn encode(&self, out: &mut Vec<u8>) {
        put_tag(out, Tag::Edge);
        self.observation_edge.encode(out);
        self.signed_observation_edge.encode(out);
        self.data.encode(out);
    }
}

impl<D: CanonicalDecode> CanonicalDecode for Edge<D> {
    fn decode(reader: &mut Reader<'_>) -> ChainResult<Self> {
        reader.expect_tag(Tag::Edge)?;
        Ok(Self {
            observation_edge: ObservationEdge::decode(reader)?,
            signed_observation_edge: SignedObservationEdge::decode(reader)?,
            data: D::decode(reader)?,
        })
    }
}
