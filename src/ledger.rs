//! Downstream services that absorb a snapshot's effects: address balances,
//! accepted-transaction bookkeeping, and observation retirement.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::errors::{ChainError, ChainResult};
use crate::types::{AddressCacheData, CheckpointBlock, LastTransactionRef, Transaction};

/// The services a snapshot's effects flow into, bundled for wiring.
#[derive(Clone, Default)]
pub struct LedgerServices {
    pub addresses: Arc<AddressService>,
    pub transactions: Arc<TransactionService>,
    pub observations: Arc<ObservationService>,
}

impl LedgerServices {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Per-address balance ledger. Amounts are base units; the debit side also
/// carries the fee.
#[derive(Default)]
pub struct AddressService {
    cache: RwLock<HashMap<String, AddressCacheData>>,
}

impl AddressService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self, address: &str) -> i64 {
        self.cache
            .read()
            .get(address)
            .map(|data| data.balance)
            .unwrap_or(0)
    }

    pub fn set_balance(&self, address: impl Into<String>, balance: i64) {
        self.cache
            .write()
            .insert(address.into(), AddressCacheData::new(balance));
    }

    /// Applies one snapshotted transfer to the ledger.
    pub fn transfer_snapshot_transaction(&self, transaction: &Transaction) -> ChainResult<()> {
        if transaction.is_dummy {
            return Err(ChainError::Transaction(
                "dummy transactions carry no ledger effect".into(),
            ));
        }
        let amount = transaction.amount();
        let debit = amount.saturating_add(transaction.fee().unwrap_or(0));
        let mut cache = self.cache.write();
        let source = cache
            .entry(transaction.source().to_string())
            .or_default();
        source.balance = source.balance.saturating_sub(debit);
        let destination = cache
            .entry(transaction.destination().to_string())
            .or_default();
        destination.balance = destination.balance.saturating_add(amount);
        Ok(())
    }

    pub fn address_cache(&self) -> HashMap<String, AddressCacheData> {
        self.cache.read().clone()
    }

    pub fn set_address_cache(&self, cache: HashMap<String, AddressCacheData>) {
        *self.cache.write() = cache;
    }
}

/// Registry of snapshotted transactions, the per-address last-accepted
/// reference chain, and the per-source rate counters the accepting pipeline
/// throttles on.
#[derive(Default)]
pub struct TransactionService {
    accepted: RwLock<HashMap<String, Transaction>>,
    last_accepted: RwLock<HashMap<String, LastTransactionRef>>,
    rate_counters: RwLock<HashMap<String, u32>>,
}

impl TransactionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records transactions finalized under a snapshot and advances each
    /// source's last-accepted reference; the highest ordinal wins.
    pub fn apply_snapshot_direct(&self, transactions: &[Transaction]) {
        let mut accepted = self.accepted.write();
        let mut last_accepted = self.last_accepted.write();
        for transaction in transactions {
            accepted.insert(transaction.hash(), transaction.clone());
            let source = transaction.source().to_string();
            let ordinal = transaction.ordinal();
            let advance = last_accepted
                .get(&source)
                .map(|current| ordinal > current.ordinal)
                .unwrap_or(true);
            if advance {
                last_accepted.insert(
                    source,
                    LastTransactionRef {
                        prev_hash: transaction.hash(),
                        ordinal,
                    },
                );
            }
        }
    }

    /// Counts a transaction against its source; the acceptance pipeline
    /// rejects sources past their window.
    pub fn note_accepted(&self, transaction: &Transaction) {
        *self
            .rate_counters
            .write()
            .entry(transaction.source().to_string())
            .or_insert(0) += 1;
    }

    pub fn rate_count(&self, address: &str) -> u32 {
        self.rate_counters.read().get(address).copied().unwrap_or(0)
    }

    /// Clears rate counters for every source finalized in the given blocks.
    pub fn reset_rate_limits<'a>(&self, blocks: impl IntoIterator<Item = &'a CheckpointBlock>) {
        let sources: HashSet<String> = blocks
            .into_iter()
            .flat_map(|block| block.transactions.iter())
            .filter(|transaction| !transaction.is_dummy)
            .map(|transaction| transaction.source().to_string())
            .collect();
        let mut counters = self.rate_counters.write();
        for source in sources {
            counters.remove(&source);
        }
    }

    pub fn is_snapshotted(&self, hash: &str) -> bool {
        self.accepted.read().contains_key(hash)
    }

    pub fn last_accepted_transaction_ref(&self) -> HashMap<String, LastTransactionRef> {
        self.last_accepted.read().clone()
    }

    pub fn set_last_accepted(&self, refs: HashMap<String, LastTransactionRef>) {
        *self.last_accepted.write() = refs;
    }
}

/// Holds live observations until the block carrying them is snapshotted.
#[derive(Default)]
pub struct ObservationService {
    observations: RwLock<HashMap<String, crate::types::Observation>>,
}

impl ObservationService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, observation: crate::types::Observation) {
        self.observations
            .write()
            .insert(observation.hash(), observation);
    }

    pub fn remove(&self, hash: &str) -> Option<crate::types::Observation> {
        self.observations.write().remove(hash)
    }

    pub fn remove_all<I: IntoIterator<Item = String>>(&self, hashes: I) {
        let mut observations = self.observations.write();
        for hash in hashes {
            observations.remove(&hash);
        }
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.observations.read().contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.observations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.read().is_empty()
    }
}
