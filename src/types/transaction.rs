use ed25519_dalek::Keypair;
use serde::{Deserialize, Serialize};

use crate::errors::ChainResult;
use crate::keys::address_from_public_key;
use crate::serialize::{
    self, CanonicalDecode, CanonicalEncode, Reader, Tag, put_bool, put_i64, put_opt_i64, put_str,
    put_tag, put_u64,
};
use crate::types::edge::{Edge, ObservationEdge, SignedObservationEdge, TypedEdgeHash};

/// Fixed-point scaling: one ledger coin in base units.
pub const BASE_UNITS_PER_COIN: i64 = 100_000_000;

/// Reference to the sender's previous transaction, used to chain spends per
/// address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastTransactionRef {
    pub prev_hash: String,
    pub ordinal: u64,
}

impl LastTransactionRef {
    pub fn empty() -> Self {
        Self {
            prev_hash: String::new(),
            ordinal: 0,
        }
    }
}

impl Default for LastTransactionRef {
    fn default() -> Self {
        Self::empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEdgeData {
    pub amount: i64,
    pub last_tx_ref: LastTransactionRef,
    pub fee: Option<i64>,
    pub salt: i64,
}

/// Builds a self-verifying transaction edge. With `normalized` the amount is
/// scaled to base units; the salt disambiguates otherwise identical
/// transfers.
pub fn new_transaction_edge(
    src: &str,
    dst: &str,
    last_tx_ref: LastTransactionRef,
    amount: i64,
    keypair: &Keypair,
    fee: Option<i64>,
    normalized: bool,
) -> Edge<TransactionEdgeData> {
    let amount = if normalized {
        amount.saturating_mul(BASE_UNITS_PER_COIN)
    } else {
        amount
    };
    let data = TransactionEdgeData {
        amount,
        last_tx_ref,
        fee,
        salt: rand::random::<i64>(),
    };
    let observation_edge = ObservationEdge::new(
        vec![TypedEdgeHash::address(src), TypedEdgeHash::address(dst)],
        TypedEdgeHash::transaction_data(serialize::hash_of(&data)),
    );
    let signed_observation_edge = SignedObservationEdge::sign(&observation_edge, keypair);
    Edge::new(observation_edge, signed_observation_edge, data)
}

/// A transfer between two addresses. Dummy transactions are zero self-sends
/// used as block filler; the snapshot-apply path skips them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub edge: Edge<TransactionEdgeData>,
    pub is_dummy: bool,
}

impl Transaction {
    pub fn new(edge: Edge<TransactionEdgeData>) -> Self {
        Self {
            edge,
            is_dummy: false,
        }
    }

    pub fn dummy(keypair: &Keypair) -> Self {
        let address = address_from_public_key(&keypair.public);
        let edge = new_transaction_edge(
            &address,
            &address,
            LastTransactionRef::empty(),
            0,
            keypair,
            None,
            false,
        );
        Self {
            edge,
            is_dummy: true,
        }
    }

    /// Transaction identity: hash of the signed observation edge.
    pub fn hash(&self) -> String {
        self.edge.signed_observation_edge.hash()
    }

    pub fn source(&self) -> &str {
        self.edge
            .parents()
            .first()
            .map(|parent| parent.hash.as_str())
            .unwrap_or_default()
    }

    pub fn destination(&self) -> &str {
        self.edge
            .parents()
            .get(1)
            .map(|parent| parent.hash.as_str())
            .unwrap_or_default()
    }

    pub fn amount(&self) -> i64 {
        self.edge.data.amount
    }

    pub fn fee(&self) -> Option<i64> {
        self.edge.data.fee
    }

    pub fn last_tx_ref(&self) -> &LastTransactionRef {
        &self.edge.data.last_tx_ref
    }

    /// Ordinal this transaction occupies in its sender's chain.
    pub fn ordinal(&self) -> u64 {
        self.edge.data.last_tx_ref.ordinal + 1
    }

    /// Verifies every signature in the batch against the observation-edge
    /// hash and checks the data commitment.
    pub fn valid(&self) -> bool {
        let batch = &self.edge.signed_observation_edge.signature_batch;
        batch.hash == self.edge.observation_edge.hash()
            && batch.valid()
            && self.edge.observation_edge.data.hash == serialize::hash_of(&self.edge.data)
    }
}

impl CanonicalEncode for LastTransactionRef {
    fn encode(&self, out: &mut Vec<u8>) {
        put_tag(out, Tag::LastTransactionRef);
        put_str(out, &self.prev_hash);
        put_u64(out, self.ordinal);
    }
}

impl CanonicalDecode for LastTransactionRef {
    fn decode(reader: &mut Reader<'_>) -> ChainResult<Self> {
        reader.expect_tag(Tag::LastTransactionRef)?;
        Ok(Self {
            prev_hash: reader.str()?,
            ordinal: reader.u64()?,
        })
    }
}

impl CanonicalEncode for TransactionEdgeData {
    fn encode(&self, out: &mut Vec<u8>) {
        put_tag(out, Tag::TransactionEdgeData);
        put_i64(out, self.amount);
        self.last_tx_ref.encode(out);
        put_opt_i64(out, self.fee);
        put_i64(out, self.salt);
    }
}

impl CanonicalDecode for TransactionEdgeData {
    fn decode(reader: &mut Reader<'_>) -> ChainResult<Self> {
        reader.expect_tag(Tag::TransactionEdgeData)?;
        Ok(Self {
            amount: reader.i64()?,
            last_tx_ref: LastTransactionRef::decode(reader)?,
            fee: reader.opt_i64()?,
            salt: reader.i64()?,
        })
    }
}

impl CanonicalEncode for Transaction {
    fn encode(&self, out: &mut Vec<u8>) {
        put_tag(out, Tag::Transaction);
        self.edge.encode(out);
        put_bool(out, self.is_dummy);
    }
}

impl CanonicalDecode for Transaction {
    fn decode(reader: &mut Reader<'_>) -> ChainResult<Self> {
        reader.expect_tag(Tag::Transaction)?;
        Ok(Self {
            edge: Edge::decode(reader)?,
            is_dummy: reader.bool()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_keypair;
    use crate::serialize::{canonical_bytes, decode_all, hash_of};
    use crate::types::edge::EdgeHashKind;

    fn transfer(amount: i64, normalized: bool) -> Transaction {
        let keypair = generate_keypair();
        Transaction::new(new_transaction_edge(
            "src-address",
            "dst-address",
            LastTransactionRef::empty(),
            amount,
            &keypair,
            Some(1),
            normalized,
        ))
    }

    #[test]
    fn normalized_amount_is_scaled_to_base_units() {
        assert_eq!(transfer(3, true).amount(), 3 * BASE_UNITS_PER_COIN);
        assert_eq!(transfer(3, false).amount(), 3);
    }

    #[test]
    fn parents_carry_source_then_destination() {
        let tx = transfer(1, true);
        assert_eq!(tx.source(), "src-address");
        assert_eq!(tx.destination(), "dst-address");
        assert!(
            tx.edge
                .parents()
                .iter()
                .all(|parent| parent.kind == EdgeHashKind::AddressHash)
        );
        assert_eq!(
            tx.edge.observation_edge.data.kind,
            EdgeHashKind::TransactionDataHash
        );
    }

    #[test]
    fn edge_is_self_verifying() {
        let tx = transfer(5, true);
        let batch = &tx.edge.signed_observation_edge.signature_batch;
        assert_eq!(batch.hash, tx.edge.observation_edge.hash());
        assert!(tx.valid());
    }

    #[test]
    fn salt_disambiguates_identical_transfers() {
        let keypair = generate_keypair();
        let build = || {
            new_transaction_edge(
                "src-address",
                "dst-address",
                LastTransactionRef::empty(),
                7,
                &keypair,
                None,
                true,
            )
        };
        assert_ne!(hash_of(&build().data), hash_of(&build().data));
    }

    #[test]
    fn dummy_transactions_are_zero_self_sends() {
        let tx = Transaction::dummy(&generate_keypair());
        assert!(tx.is_dummy);
        assert_eq!(tx.amount(), 0);
        assert_eq!(tx.source(), tx.destination());
    }

    #[test]
    fn transaction_round_trips() {
        let tx = transfer(11, true);
        let decoded: Transaction = decode_all(&canonical_bytes(&tx)).unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(decoded.hash(), tx.hash());
    }
}
