//! Per-config parameter resolution (`spec.md` §4.D).
//!
//! Resolving a config's parameters happens after all of its cross-config
//! dependencies have been deployed (the scheduler guarantees that ordering —
//! see [`crate::scheduler`]). What's left here is purely intra-config: some
//! parameters (`Compound`) read sibling parameters by name, so those siblings
//! must resolve first.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use reconciler_types::{EntityLookup, Parameter};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamResolveError {
    pub message: String,
}

impl std::fmt::Display for ParamResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParamResolveError {}

/// Resolve every parameter in `parameters`, honouring intra-config ordering:
/// a `Compound` parameter is resolved only after every sibling its template
/// names has itself resolved. A cycle among sibling references is a fatal
/// per-config error (`spec.md` §4.D step 2).
pub fn resolve_all(
    parameters: &BTreeMap<String, Parameter>,
    lookup: &dyn EntityLookup,
) -> Result<BTreeMap<String, Value>, ParamResolveError> {
    let order = topo_sort_by_sibling_names(parameters)?;

    let mut resolved = BTreeMap::new();
    for name in order {
        let parameter = &parameters[&name];
        let value = parameter
            .resolve(lookup, &resolved)
            .map_err(|e| ParamResolveError {
                message: format!("parameter {name}: {e}"),
            })?;
        resolved.insert(name, value);
    }
    Ok(resolved)
}

/// Kahn's algorithm over the "reads sibling by name" relation, with a
/// deterministic tie-break (`BTreeMap`/`BTreeSet` iteration order) so two runs
/// over the same config always resolve parameters in the same order.
fn topo_sort_by_sibling_names(parameters: &BTreeMap<String, Parameter>) -> Result<Vec<String>, ParamResolveError> {
    let mut in_degree: BTreeMap<&String, usize> = parameters.keys().map(|name| (name, 0)).collect();
    let mut children: BTreeMap<&String, BTreeSet<&String>> = parameters.keys().map(|name| (name, BTreeSet::new())).collect();

    for (name, parameter) in parameters {
        for sibling in parameter.sibling_names() {
            let Some(sibling_key) = parameters.get_key_value(&sibling).map(|(k, _)| k) else {
                continue;
            };
            if children.get_mut(sibling_key).unwrap().insert(name) {
                *in_degree.get_mut(name).unwrap() += 1;
            }
        }
    }

    let mut queue: VecDeque<&String> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(name, _)| *name)
        .collect();
    let mut order = Vec::with_capacity(parameters.len());

    while let Some(name) = queue.pop_front() {
        order.push(name.clone());
        for child in &children[name] {
            let degree = in_degree.get_mut(child).unwrap();
            *degree -= 1;
            if *degree == 0 {
                queue.push_back(child);
            }
        }
    }

    if order.len() != parameters.len() {
        let cyclic: Vec<String> = in_degree
            .into_iter()
            .filter(|(_, degree)| *degree > 0)
            .map(|(name, _)| name.clone())
            .collect();
        return Err(ParamResolveError {
            message: format!("cyclic parameter references among: {}", cyclic.join(", ")),
        });
    }

    Ok(order)
}
