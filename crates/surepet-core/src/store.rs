// ── Entity store ──
//
// Concurrent id -> entity map with a version counter that bumps on every
// mutation. Full refreshes upsert first and prune afterwards, so readers
// never observe a half-empty store.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;
use tracing::debug;

use crate::model::Entity;

pub struct EntityStore {
    entities: DashMap<i64, Arc<Entity>>,
    version: watch::Sender<u64>,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        Self {
            entities: DashMap::new(),
            version,
        }
    }

    /// Replace the contents with a freshly materialized set.
    ///
    /// Ids missing from `fresh` are dropped.
    pub fn replace_all(&self, fresh: BTreeMap<i64, Entity>) {
        let keep: Vec<i64> = fresh.keys().copied().collect();
        for (id, entity) in fresh {
            self.entities.insert(id, Arc::new(entity));
        }

        let before = self.entities.len();
        self.entities.retain(|id, _| keep.binary_search(id).is_ok());
        let pruned = before - self.entities.len();
        if pruned > 0 {
            debug!(pruned, "pruned entities absent from refresh");
        }

        self.bump_version();
    }

    pub fn get(&self, id: i64) -> Option<Arc<Entity>> {
        self.entities.get(&id).map(|r| Arc::clone(r.value()))
    }

    /// Apply `update` to a copy of entity `id` and store the result.
    ///
    /// Returns `false` if no such entity exists.
    pub fn update(&self, id: i64, update: impl FnOnce(&mut Entity)) -> bool {
        let Some(mut slot) = self.entities.get_mut(&id) else {
            return false;
        };
        update(Arc::make_mut(slot.value_mut()));
        drop(slot);
        self.bump_version();
        true
    }

    /// All entities ordered by id.
    pub fn snapshot(&self) -> Vec<Arc<Entity>> {
        let mut all: Vec<Arc<Entity>> = self
            .entities
            .iter()
            .map(|r| Arc::clone(r.value()))
            .collect();
        all.sort_by_key(|entity| entity.id());
        all
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    /// Subscribe to version bumps.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    fn bump_version(&self) {
        // `send_modify` updates unconditionally, even with zero receivers.
        self.version.send_modify(|v| *v += 1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::convert::materialize_one;
    use crate::model::BatteryProfile;

    fn entity(id: i64, product: i64) -> (i64, Entity) {
        let raw = json!({ "id": id, "household_id": 7, "product_id": product });
        (id, materialize_one(&raw, BatteryProfile::default()).unwrap())
    }

    #[test]
    fn replace_all_prunes_missing_ids() {
        let store = EntityStore::new();
        store.replace_all([entity(1, 1), entity(2, 6), entity(3, 0)].into_iter().collect());
        assert_eq!(store.len(), 3);

        store.replace_all([entity(2, 6), entity(4, 4)].into_iter().collect());
        let ids: Vec<i64> = store.snapshot().iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec![2, 4]);
        assert!(store.get(1).is_none());
    }

    #[test]
    fn version_bumps_on_mutation() {
        let store = EntityStore::new();
        let rx = store.subscribe();
        assert_eq!(store.version(), 0);

        store.replace_all([entity(1, 6)].into_iter().collect());
        assert_eq!(*rx.borrow(), 1);

        assert!(store.update(1, |e| e.splice("move", json!({ "n": 1 }))));
        assert_eq!(store.version(), 2);
        assert!(!store.update(99, |_| {}));
        assert_eq!(store.version(), 2);
    }

    #[test]
    fn update_does_not_touch_handed_out_snapshots() {
        let store = EntityStore::new();
        store.replace_all([entity(1, 6)].into_iter().collect());
        let before = store.get(1).unwrap();

        store.update(1, |e| e.splice("move", json!({ "n": 1 })));

        assert!(before.raw().get("move").is_none());
        assert_eq!(store.get(1).unwrap().raw()["move"]["n"], 1);
    }
}
