//! Durable key→bytes storage for serialized snapshot blobs.
//!
//! Keys are snapshot hashes, values are opaque canonical-format blobs. The
//! production backend keeps one file per key under a root directory and
//! reaches durability through write-temp → fsync → rename. The trait seam
//! lets the snapshot service run against an in-memory backend in tests.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::NodeConfig;
use crate::errors::{ChainError, ChainResult};

pub trait BlobStorage: Send + Sync {
    /// Persists `bytes` under `key`, durable on return. Overwriting an
    /// existing key is an error unless `replace` is set.
    fn write(&self, key: &str, bytes: &[u8], replace: bool) -> ChainResult<()>;
    fn read(&self, key: &str) -> ChainResult<Vec<u8>>;
    fn exists(&self, key: &str) -> bool;
    fn delete(&self, key: &str) -> ChainResult<()>;
    fn list(&self) -> ChainResult<Vec<String>>;
    fn usable_space(&self) -> ChainResult<u64>;
    fn occupied_space(&self) -> ChainResult<u64>;
}

pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    pub fn open(root: impl Into<PathBuf>) -> ChainResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> ChainResult<PathBuf> {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ChainError::Config(format!("invalid storage key {key:?}")));
        }
        Ok(self.root.join(key))
    }
}

impl BlobStorage for LocalFileStorage {
    fn write(&self, key: &str, bytes: &[u8], replace: bool) -> ChainResult<()> {
        let path = self.path_for(key)?;
        if !replace && path.exists() {
            return Err(ChainError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("key {key} already stored"),
            )));
        }
        let tmp_path = self.root.join(format!("{key}.tmp"));
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    fn read(&self, key: &str) -> ChainResult<Vec<u8>> {
        Ok(fs::read(self.path_for(key)?)?)
    }

    fn exists(&self, key: &str) -> bool {
        self.path_for(key)
            .map(|path| path.exists())
            .unwrap_or(false)
    }

    fn delete(&self, key: &str) -> ChainResult<()> {
        fs::remove_file(self.path_for(key)?)?;
        Ok(())
    }

    fn list(&self) -> ChainResult<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.ends_with(".tmp") {
                    keys.push(name.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn usable_space(&self) -> ChainResult<u64> {
        Ok(fs2::available_space(&self.root)?)
    }

    fn occupied_space(&self) -> ChainResult<u64> {
        let mut total = 0;
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                total += entry.metadata()?.len();
            }
        }
        Ok(total)
    }
}

/// The three durable blob roots a node keeps under its data directory.
#[derive(Clone)]
pub struct SnapshotFileStores {
    pub snapshots: Arc<dyn BlobStorage>,
    pub snapshot_infos: Arc<dyn BlobStorage>,
    pub rewards: Arc<dyn BlobStorage>,
}

impl SnapshotFileStores {
    pub fn open(config: &NodeConfig) -> ChainResult<Self> {
        Ok(Self {
            snapshots: Arc::new(LocalFileStorage::open(config.snapshot_storage_dir())?),
            snapshot_infos: Arc::new(LocalFileStorage::open(config.snapshot_info_storage_dir())?),
            rewards: Arc::new(LocalFileStorage::open(config.eigen_trust_storage_dir())?),
        })
    }
}
