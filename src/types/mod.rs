mod account;
mod checkpoint;
mod edge;
mod id;
mod snapshot;
mod transaction;

pub use account::AddressCacheData;
pub use checkpoint::{
    CheckpointBlock, CheckpointCache, CheckpointEdgeData, Height, Observation, ObservationData,
};
pub use edge::{
    Edge, EdgeHashKind, HashSignature, ObservationEdge, SignatureBatch, SignedObservationEdge,
    TypedEdgeHash,
};
pub use id::Id;
pub use snapshot::{Snapshot, SnapshotInfo, StoredRewards, StoredSnapshot};
pub use transaction::{
    BASE_UNITS_PER_COIN, LastTransactionRef, Transaction, TransactionEdgeData,
    new_transaction_edge,
};

pub type Address = String;
