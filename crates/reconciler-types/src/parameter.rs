//! Typed, polymorphic config parameters (`spec.md` §3 "Parameter", §4.D).
//!
//! Every variant exposes the same two contracts: [`Parameter::dependencies`]
//! (the set of cross-config [`Reference`]s it needs resolved first) and
//! [`Parameter::resolve`] (produce a [`serde_json::Value`] given a lookup).
//! Resolution order across a config's own parameters is computed separately by
//! the caller (an intra-config topological sort — see `reconciler-core::params`);
//! this module only describes a single parameter's resolution rule.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::coordinate::Coordinate;
use crate::template;

/// A `(Coordinate, propertyName)` pair: resolves to a property of a previously
/// deployed config.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub coordinate: Coordinate,
    pub property: String,
}

impl Reference {
    pub fn new(coordinate: Coordinate, property: impl Into<String>) -> Self {
        Self {
            coordinate,
            property: property.into(),
        }
    }
}

/// Lookup surface a [`Parameter`] needs during resolution. Implemented by the
/// entity map in `reconciler-core`; kept as a trait here so this crate never
/// depends on the concurrency/locking primitives that back the real map.
pub trait EntityLookup {
    /// Returns `Some(value)` only if the coordinate exists in the map **and**
    /// was not recorded with its skip flag set.
    fn get_property(&self, coordinate: &Coordinate, property: &str) -> Option<Value>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveError {
    pub message: String,
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ResolveError {}

impl ResolveError {
    fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// A polymorphic parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Parameter {
    /// A scalar, mapping or list value, taken as-is.
    Literal { value: Value },
    /// Resolves from a named environment variable; may carry a default used when
    /// the variable is unset.
    Environment {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<Value>,
    },
    /// Resolves to a property of a previously deployed config.
    Reference(Reference),
    /// A text template referencing other **named** parameters of the same config.
    Compound { template: String },
    /// An ordered collection of parameters.
    List { items: Vec<Parameter> },
}

impl Parameter {
    pub fn literal(value: impl Into<Value>) -> Self {
        Parameter::Literal { value: value.into() }
    }

    pub fn environment(name: impl Into<String>) -> Self {
        Parameter::Environment {
            name: name.into(),
            default: None,
        }
    }

    pub fn reference(coordinate: Coordinate, property: impl Into<String>) -> Self {
        Parameter::Reference(Reference::new(coordinate, property))
    }

    /// Cross-config references this parameter needs resolved before it can
    /// resolve itself. Compound parameters reference sibling parameters by name,
    /// not by [`Reference`], so they contribute no entries here; their
    /// dependency on sibling resolution order is handled by the intra-config
    /// sort, not this set.
    pub fn dependencies(&self) -> BTreeSet<Reference> {
        match self {
            Parameter::Literal { .. } | Parameter::Environment { .. } | Parameter::Compound { .. } => {
                BTreeSet::new()
            }
            Parameter::Reference(r) => BTreeSet::from([r.clone()]),
            Parameter::List { items } => items.iter().flat_map(Parameter::dependencies).collect(),
        }
    }

    /// The sibling parameter names a [`Parameter::Compound`] template reads. Used
    /// by the intra-config dependency graph (`spec.md` §4.D step 1) to order
    /// resolution within one config; empty for every other variant.
    pub fn sibling_names(&self) -> BTreeSet<String> {
        match self {
            Parameter::Compound { template } => extract_placeholder_names(template),
            _ => BTreeSet::new(),
        }
    }

    /// Resolve this parameter to a concrete value.
    ///
    /// `lookup` answers cross-config [`Reference`]s; `already_resolved` carries
    /// this config's own parameters that have already been resolved in
    /// topological order, for [`Parameter::Compound`].
    pub fn resolve(
        &self,
        lookup: &dyn EntityLookup,
        already_resolved: &BTreeMap<String, Value>,
    ) -> Result<Value, ResolveError> {
        match self {
            Parameter::Literal { value } => Ok(value.clone()),
            Parameter::Environment { name, default } => match std::env::var(name) {
                Ok(v) => Ok(Value::String(v)),
                Err(_) => default
                    .clone()
                    .ok_or_else(|| ResolveError::new(format!("environment variable {name} is unset and has no default"))),
            },
            Parameter::Reference(r) => lookup
                .get_property(&r.coordinate, &r.property)
                .ok_or_else(|| ResolveError::new(format!("reference {} is unresolved or skipped", r.coordinate))),
            Parameter::Compound { template: body } => {
                let rendered = template::render(body, already_resolved)
                    .map_err(|e| ResolveError::new(format!("compound parameter: {e}")))?;
                Ok(Value::String(rendered))
            }
            Parameter::List { items } => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(item.resolve(lookup, already_resolved)?);
                }
                Ok(Value::Array(values))
            }
        }
    }
}

fn extract_placeholder_names(body: &str) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    let mut rest = body;
    while let Some(start) = rest.find("{{.") {
        let after = &rest[start + 3..];
        if let Some(end) = after.find("}}") {
            names.insert(after[..end].to_string());
            rest = &after[end + 2..];
        } else {
            break;
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    struct FakeLookup {
        values: RefCell<HashMap<(Coordinate, String), Value>>,
    }

    impl FakeLookup {
        fn new() -> Self {
            Self {
                values: RefCell::new(HashMap::new()),
            }
        }

        fn with(self, coord: Coordinate, prop: &str, value: Value) -> Self {
            self.values.borrow_mut().insert((coord, prop.to_string()), value);
            self
        }
    }

    impl EntityLookup for FakeLookup {
        fn get_property(&self, coordinate: &Coordinate, property: &str) -> Option<Value> {
            self.values.borrow().get(&(coordinate.clone(), property.to_string())).cloned()
        }
    }

    #[test]
    fn literal_resolves_to_its_value() {
        let lookup = FakeLookup::new();
        let param = Parameter::literal(Value::String("hi".into()));
        assert_eq!(param.resolve(&lookup, &BTreeMap::new()).unwrap(), Value::String("hi".into()));
    }

    #[test]
    fn environment_resolves_from_var_or_falls_back_to_default() {
        let lookup = FakeLookup::new();
        let name = "RECONCILER_TEST_PARAM_VAR";
        unsafe {
            std::env::set_var(name, "from-env");
        }
        let param = Parameter::environment(name);
        assert_eq!(param.resolve(&lookup, &BTreeMap::new()).unwrap(), Value::String("from-env".into()));
        unsafe {
            std::env::remove_var(name);
        }

        let with_default = Parameter::Environment {
            name: name.to_string(),
            default: Some(Value::String("fallback".into())),
        };
        assert_eq!(
            with_default.resolve(&lookup, &BTreeMap::new()).unwrap(),
            Value::String("fallback".into())
        );
    }

    #[test]
    fn environment_without_default_is_fatal_when_unset() {
        let lookup = FakeLookup::new();
        let param = Parameter::environment("RECONCILER_TEST_DEFINITELY_UNSET_VAR");
        assert!(param.resolve(&lookup, &BTreeMap::new()).is_err());
    }

    #[test]
    fn reference_resolves_through_lookup() {
        let coord = Coordinate::new("p", "autotag", "t1");
        let lookup = FakeLookup::new().with(coord.clone(), "id", Value::String("abc-123".into()));
        let param = Parameter::reference(coord, "id");
        assert_eq!(param.resolve(&lookup, &BTreeMap::new()).unwrap(), Value::String("abc-123".into()));
    }

    #[test]
    fn reference_resolution_fails_when_absent() {
        let lookup = FakeLookup::new();
        let param = Parameter::reference(Coordinate::new("p", "k", "missing"), "id");
        assert!(param.resolve(&lookup, &BTreeMap::new()).is_err());
    }

    #[test]
    fn compound_renders_against_already_resolved_siblings() {
        let lookup = FakeLookup::new();
        let mut resolved = BTreeMap::new();
        resolved.insert("name".to_string(), Value::String("dash".to_string()));
        let param = Parameter::Compound {
            template: "{{.name}}-suffix".to_string(),
        };
        assert_eq!(
            param.resolve(&lookup, &resolved).unwrap(),
            Value::String("dash-suffix".to_string())
        );
    }

    #[test]
    fn compound_sibling_names_are_extracted() {
        let param = Parameter::Compound {
            template: "{{.a}}/{{.b}}".to_string(),
        };
        assert_eq!(
            param.sibling_names(),
            BTreeSet::from(["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn list_resolves_each_item_in_order() {
        let lookup = FakeLookup::new();
        let param = Parameter::List {
            items: vec![Parameter::literal(1), Parameter::literal(2)],
        };
        assert_eq!(
            param.resolve(&lookup, &BTreeMap::new()).unwrap(),
            serde_json::json!([1, 2])
        );
    }

    #[test]
    fn dependencies_collect_references_recursively() {
        let coord = Coordinate::new("p", "k", "c1");
        let param = Parameter::List {
            items: vec![Parameter::reference(coord.clone(), "id"), Parameter::literal(1)],
        };
        assert_eq!(param.dependencies(), BTreeSet::from([Reference::new(coord, "id")]));
    }
}
