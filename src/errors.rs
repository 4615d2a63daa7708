use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("cryptography error: {0}")]
    Crypto(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("transaction rejected: {0}")]
    Transaction(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub type ChainResult<T> = Result<T, ChainError>;

/// Failure taxonomy of the snapshot pipeline. `attempt_snapshot` short-circuits
/// on the first error; callers pick the backoff policy per variant.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("not enough disk space to create a snapshot")]
    NotEnoughSpace,
    #[error("no accepted checkpoint blocks since the last snapshot")]
    NoAcceptedCbsSinceSnapshot,
    #[error("no accepted checkpoint blocks within the next height interval")]
    NoBlocksWithinHeightInterval,
    #[error("height interval condition not met")]
    HeightIntervalConditionNotMet,
    #[error("too many accepted checkpoint hashes held in memory")]
    MaxCbHashesInMemory,
    #[error("node is not ready to create snapshots")]
    NodeNotReadyForSnapshots,
    #[error("snapshot illegal state: {0}")]
    IllegalState(String),
    #[error("snapshot write failed: {0}")]
    Io(ChainError),
    #[error("snapshot info write failed: {0}")]
    InfoIo(ChainError),
    #[error("rewards write failed: {0}")]
    RewardsIo(ChainError),
    #[error("unexpected snapshot failure: {0}")]
    Unexpected(String),
}

impl SnapshotError {
    /// Expected quiet-node outcomes: logged at debug, retried next tick.
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            SnapshotError::NoAcceptedCbsSinceSnapshot
                | SnapshotError::NoBlocksWithinHeightInterval
                | SnapshotError::HeightIntervalConditionNotMet
                | SnapshotError::MaxCbHashesInMemory
                | SnapshotError::NodeNotReadyForSnapshots
        )
    }
}

pub type SnapshotResult<T> = Result<T, SnapshotError>;
