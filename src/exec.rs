//! The node's two execution pools: a pinned-size pool for CPU-bound work
//! (serialization, ledger application) and an elastic pool for file and
//! network I/O. Both are handed in as explicit runtime handles so callers
//! control sizing; the snapshot pipeline hops between them at its suspension
//! points.

use tokio::runtime::Handle;

use crate::errors::SnapshotError;

#[derive(Clone)]
pub struct ExecutionPools {
    bounded: Handle,
    unbounded: Handle,
}

impl ExecutionPools {
    pub fn new(bounded: Handle, unbounded: Handle) -> Self {
        Self { bounded, unbounded }
    }

    /// Both pools backed by the ambient runtime; suits tests and
    /// single-runtime deployments.
    pub fn current() -> Self {
        let handle = Handle::current();
        Self {
            bounded: handle.clone(),
            unbounded: handle,
        }
    }

    pub async fn run_bounded<T, F>(&self, task: F) -> Result<T, SnapshotError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        self.bounded
            .spawn_blocking(task)
            .await
            .map_err(|err| SnapshotError::Unexpected(format!("bounded pool task failed: {err}")))
    }

    pub async fn run_unbounded<T, F>(&self, task: F) -> Result<T, SnapshotError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        self.unbounded
            .spawn_blocking(task)
            .await
            .map_err(|err| SnapshotError::Unexpected(format!("unbounded pool task failed: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tasks_run_to_completion_on_both_pools() {
        let pools = ExecutionPools::current();
        assert_eq!(pools.run_bounded(|| 2 + 2).await.unwrap(), 4);
        assert_eq!(pools.run_unbounded(|| "io").await.unwrap(), "io");
    }
}
