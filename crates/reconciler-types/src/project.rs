use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::config::Config;

/// A loaded project: its configs grouped by environment and kind, plus computed
/// (not authored) inter-project dependencies (`spec.md` §3 "Project").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    /// environment -> kind short name -> configs.
    pub configs_by_type_by_environment: BTreeMap<String, BTreeMap<String, Vec<Config>>>,
    /// environment -> set of project ids this project depends on in that
    /// environment, i.e. some config of this project references a config of
    /// that other project.
    pub dependencies: BTreeMap<String, BTreeSet<String>>,
}

impl Project {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            group_id: None,
            configs_by_type_by_environment: BTreeMap::new(),
            dependencies: BTreeMap::new(),
        }
    }

    pub fn add_config(&mut self, environment: impl Into<String>, config: Config) {
        self.configs_by_type_by_environment
            .entry(environment.into())
            .or_default()
            .entry(config.kind.short_name().to_string())
            .or_default()
            .push(config);
    }

    /// All configs across every kind for one environment.
    pub fn configs_for_environment(&self, environment: &str) -> Vec<&Config> {
        self.configs_by_type_by_environment
            .get(environment)
            .map(|by_kind| by_kind.values().flatten().collect())
            .unwrap_or_default()
    }

    /// All environments this project has any configs for.
    pub fn environments(&self) -> BTreeSet<&str> {
        self.configs_by_type_by_environment.keys().map(String::as_str).collect()
    }
}
