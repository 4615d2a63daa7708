//! Predicted per-peer reputation, fed by gossip-driven trust scoring and
//! read at snapshot time so every node commits the same sorted view.

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;

use crate::types::Id;

#[derive(Default)]
pub struct TrustManager {
    predicted: RwLock<HashMap<Id, f64>>,
}

impl TrustManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorted-by-id view of the predicted reputation map; scores clamp to
    /// `[0, 1]` so a misbehaving scorer cannot skew a snapshot.
    pub fn predicted_reputation(&self) -> BTreeMap<Id, f64> {
        self.predicted
            .read()
            .iter()
            .map(|(id, score)| (*id, score.clamp(0.0, 1.0)))
            .collect()
    }

    pub fn update_peer(&self, id: Id, score: f64) {
        self.predicted.write().insert(id, score.clamp(0.0, 1.0));
    }

    pub fn remove_peer(&self, id: &Id) {
        self.predicted.write().remove(id);
    }

    pub fn set_predicted(&self, predicted: HashMap<Id, f64>) {
        *self.predicted.write() = predicted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_keypair;

    #[test]
    fn scores_are_clamped_and_sorted() {
        let manager = TrustManager::new();
        let a = Id::from_bytes([1u8; 32]);
        let b = Id::from_bytes([0u8; 32]);
        manager.update_peer(a, 1.7);
        manager.update_peer(b, -0.5);

        let view = manager.predicted_reputation();
        assert_eq!(view.get(&a), Some(&1.0));
        assert_eq!(view.get(&b), Some(&0.0));
        assert_eq!(view.keys().next(), Some(&b));
    }

    #[test]
    fn removed_peers_disappear_from_the_view() {
        let manager = TrustManager::new();
        let id = Id::from_public_key(&generate_keypair().public);
        manager.update_peer(id, 0.4);
        manager.remove_peer(&id);
        assert!(manager.predicted_reputation().is_empty());
    }
}
