//! Core crate of a DAG checkpoint ledger node with periodic snapshot
//! consensus.
//!
//! Gossip delivers signed checkpoint blocks into [`checkpoint_store`]; the
//! [`snapshot::SnapshotService`] periodically condenses accepted history into
//! content-addressed snapshots, persisting them through [`file_store`] and
//! applying their effects to the [`ledger`] services. Identity, signing, and
//! the consensus-critical wire format live in [`keys`], [`types`], and
//! [`serialize`].
//!
//! Applications typically build a [`config::NodeConfig`], wire the storages
//! and services together, and drive [`snapshot::SnapshotService::attempt_snapshot`]
//! from a timer with caller-enforced mutual exclusion.

pub mod checkpoint_store;
pub mod config;
pub mod errors;
pub mod exec;
pub mod file_store;
pub mod keys;
pub mod ledger;
pub mod redownload;
pub mod serialize;
pub mod snapshot;
pub mod snapshot_store;
pub mod telemetry;
pub mod trust;
pub mod types;
