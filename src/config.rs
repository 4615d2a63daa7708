use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{ChainError, ChainResult};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    pub data_dir: PathBuf,
    pub key_path: PathBuf,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
}

impl NodeConfig {
    pub fn load(path: &Path) -> ChainResult<Self> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|err| ChainError::Config(format!("unable to parse config: {err}")))
    }

    pub fn save(&self, path: &Path) -> ChainResult<()> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;
        let encoded = toml::to_string_pretty(self)
            .map_err(|err| ChainError::Config(format!("unable to encode config: {err}")))?;
        fs::write(path, encoded)?;
        Ok(())
    }

    pub fn ensure_directories(&self) -> ChainResult<()> {
        fs::create_dir_all(&self.data_dir)?;
        if let Some(parent) = self.key_path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    pub fn snapshot_storage_dir(&self) -> PathBuf {
        self.data_dir.join("snapshotStorage")
    }

    pub fn snapshot_info_storage_dir(&self) -> PathBuf {
        self.data_dir.join("snapshotInfoStorage")
    }

    pub fn eigen_trust_storage_dir(&self) -> PathBuf {
        self.data_dir.join("eigenTrustStorage")
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            key_path: PathBuf::from("./keys/node.toml"),
            snapshot: SnapshotConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

/// Snapshot pipeline options. The external key names are part of the
/// operator contract, hence the camelCase renames.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotConfig {
    #[serde(default = "default_snapshot_height_interval")]
    pub snapshot_height_interval: i64,
    #[serde(default = "default_snapshot_height_delay_interval")]
    pub snapshot_height_delay_interval: i64,
    #[serde(default = "default_distance_from_majority")]
    pub distance_from_majority: i64,
    /// Bytes the snapshot directory may occupy; 0 disables the check.
    #[serde(default = "default_snapshot_size_disk_limit")]
    pub snapshot_size_disk_limit: u64,
}

fn default_snapshot_height_interval() -> i64 {
    2
}

fn default_snapshot_height_delay_interval() -> i64 {
    4
}

fn default_distance_from_majority() -> i64 {
    30
}

fn default_snapshot_size_disk_limit() -> u64 {
    1_100_000_000
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            snapshot_height_interval: default_snapshot_height_interval(),
            snapshot_height_delay_interval: default_snapshot_height_delay_interval(),
            distance_from_majority: default_distance_from_majority(),
            snapshot_size_disk_limit: default_snapshot_size_disk_limit(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Backpressure ceiling on accepted checkpoint hashes held in memory;
    /// 0 disables the pre-check.
    #[serde(rename = "maxAcceptedCBHashesInMemory", default)]
    pub max_accepted_cb_hashes_in_memory: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_accepted_cb_hashes_in_memory: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn external_key_names_parse() {
        let raw = r#"
            data_dir = "./node-data"
            key_path = "./keys/node.toml"

            [snapshot]
            snapshotHeightInterval = 4
            snapshotHeightDelayInterval = 10
            distanceFromMajority = 12
            snapshotSizeDiskLimit = 0

            [processing]
            maxAcceptedCBHashesInMemory = 5000
        "#;
        let config: NodeConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.snapshot.snapshot_height_interval, 4);
        assert_eq!(config.snapshot.snapshot_height_delay_interval, 10);
        assert_eq!(config.snapshot.distance_from_majority, 12);
        assert_eq!(config.snapshot.snapshot_size_disk_limit, 0);
        assert_eq!(config.processing.max_accepted_cb_hashes_in_memory, 5000);
    }

    #[test]
    fn missing_sections_take_defaults() {
        let raw = r#"
            data_dir = "./node-data"
            key_path = "./keys/node.toml"
        "#;
        let config: NodeConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.snapshot.snapshot_height_interval, 2);
        assert_eq!(config.snapshot.distance_from_majority, 30);
        assert_eq!(config.processing.max_accepted_cb_hashes_in_memory, 0);
    }

    #[test]
    fn config_round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config/node.toml");
        let config = NodeConfig::default();
        config.save(&path).unwrap();
        let reloaded = NodeConfig::load(&path).unwrap();
        assert_eq!(
            reloaded.snapshot.snapshot_height_interval,
            config.snapshot.snapshot_height_interval
        );
    }
}
