//! View of the latest height a quorum of peers agrees on. Updated by the
//! redownload machinery outside this core; the snapshot service only reads
//! it for the majority-distance gate.

use parking_lot::RwLock;

#[derive(Default)]
pub struct RedownloadStorage {
    latest_majority_height: RwLock<i64>,
}

impl RedownloadStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest_majority_height(&self) -> i64 {
        *self.latest_majority_height.read()
    }

    pub fn set_latest_majority_height(&self, height: i64) {
        *self.latest_majority_height.write() = height;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn height_starts_at_zero_and_updates() {
        let storage = RedownloadStorage::new();
        assert_eq!(storage.latest_majority_height(), 0);
        storage.set_latest_majority_height(42);
        assert_eq!(storage.latest_majority_height(), 42);
    }
}
