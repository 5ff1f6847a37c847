//! Thread-safe registry of resolved entities, shared by every scheduler
//! worker (`spec.md` §4.C). Backs [`reconciler_types::EntityLookup`] so
//! parameter resolution can read properties of configs deployed earlier in
//! the same run without a second deployment pass.

use std::collections::BTreeMap;
use std::sync::RwLock;

use reconciler_types::{Coordinate, EntityLookup, ResolvedEntity};
use serde_json::Value;

#[derive(Default)]
pub struct EntityMap {
    entities: RwLock<BTreeMap<Coordinate, ResolvedEntity>>,
}

impl EntityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or idempotently re-record) a resolved entity. Re-inserting an
    /// entity with the same properties is a no-op from the caller's
    /// perspective; a changed value simply overwrites the prior one, since
    /// nothing in the scheduler relies on a single-writer invariant.
    pub fn put(&self, entity: ResolvedEntity) {
        let mut entities = self.entities.write().expect("entity map lock poisoned");
        entities.insert(entity.coordinate.clone(), entity);
    }

    pub fn get(&self, coordinate: &Coordinate) -> Option<ResolvedEntity> {
        let entities = self.entities.read().expect("entity map lock poisoned");
        entities.get(coordinate).cloned()
    }

    pub fn snapshot(&self) -> BTreeMap<Coordinate, ResolvedEntity> {
        self.entities.read().expect("entity map lock poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.entities.read().expect("entity map lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EntityLookup for EntityMap {
    fn get_property(&self, coordinate: &Coordinate, property: &str) -> Option<Value> {
        let entities = self.entities.read().expect("entity map lock poisoned");
        entities.get(coordinate)?.properties.get(property).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(id: &str) -> Coordinate {
        Coordinate::new("proj", "dashboard-v2", id)
    }

    #[test]
    fn empty_map_has_no_entries() {
        let map = EntityMap::new();
        assert!(map.is_empty());
        assert!(map.get(&coord("d1")).is_none());
    }

    #[test]
    fn put_then_get_round_trips() {
        let map = EntityMap::new();
        map.put(ResolvedEntity::deployed(coord("d1"), "remote-id-1"));
        let entity = map.get(&coord("d1")).expect("entity present");
        assert_eq!(entity.id(), Some("remote-id-1"));
    }

    #[test]
    fn get_property_reads_through_entity_lookup_trait() {
        let map = EntityMap::new();
        map.put(ResolvedEntity::deployed(coord("d1"), "remote-id-1").with_property("name", Value::from("dash")));
        let lookup: &dyn EntityLookup = &map;
        assert_eq!(lookup.get_property(&coord("d1"), "id"), Some(Value::from("remote-id-1")));
        assert_eq!(lookup.get_property(&coord("d1"), "name"), Some(Value::from("dash")));
        assert_eq!(lookup.get_property(&coord("d1"), "missing"), None);
    }

    #[test]
    fn put_overwrites_prior_entity_for_same_coordinate() {
        let map = EntityMap::new();
        map.put(ResolvedEntity::deployed(coord("d1"), "v1"));
        map.put(ResolvedEntity::deployed(coord("d1"), "v2"));
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&coord("d1")).unwrap().id(), Some("v2"));
    }

    #[test]
    fn snapshot_is_independent_of_later_mutation() {
        let map = EntityMap::new();
        map.put(ResolvedEntity::deployed(coord("d1"), "v1"));
        let snapshot = map.snapshot();
        map.put(ResolvedEntity::deployed(coord("d2"), "v2"));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(map.len(), 2);
    }
}
