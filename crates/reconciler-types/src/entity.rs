use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::coordinate::Coordinate;

/// The record placed in the entity map after a config has been processed
/// (`spec.md` §3 "ResolvedEntity"). `properties["id"]` is mandatory whenever
/// `skip` is false, so that `Reference(coord, "id")` resolves for dependents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedEntity {
    pub coordinate: Coordinate,
    pub properties: BTreeMap<String, Value>,
    pub skip: bool,
}

impl ResolvedEntity {
    pub fn deployed(coordinate: Coordinate, id: impl Into<String>) -> Self {
        let mut properties = BTreeMap::new();
        properties.insert("id".to_string(), Value::String(id.into()));
        Self {
            coordinate,
            properties,
            skip: false,
        }
    }

    pub fn skipped(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            properties: BTreeMap::new(),
            skip: true,
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: Value) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.properties.get("id").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deployed_entity_carries_mandatory_id() {
        let entity = ResolvedEntity::deployed(Coordinate::new("p", "k", "c"), "abc-123");
        assert_eq!(entity.id(), Some("abc-123"));
        assert!(!entity.skip);
    }

    #[test]
    fn skipped_entity_has_no_properties() {
        let entity = ResolvedEntity::skipped(Coordinate::new("p", "k", "c"));
        assert!(entity.skip);
        assert!(entity.id().is_none());
    }
}
