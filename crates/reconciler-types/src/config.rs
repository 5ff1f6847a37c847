use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::coordinate::Coordinate;
use crate::kind::Kind;
use crate::parameter::Parameter;
use crate::template::Template;

/// A single deployable unit (`spec.md` §3 "Config").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub coordinate: Coordinate,
    pub environment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub kind: Kind,
    /// Name -> parameter. Kind-specific required names (`name`, `scope`) are
    /// checked by the validators, not enforced by this type.
    pub parameters: BTreeMap<String, Parameter>,
    pub template: Template,
    /// If true, deployment yields a skip result; dependents transitively skip.
    #[serde(default)]
    pub skip: bool,
    /// The remote primary key to use for update, when known up front (as
    /// opposed to discovered by list-then-match).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_object_id: Option<String>,
}

impl Config {
    pub fn new(coordinate: Coordinate, environment: impl Into<String>, kind: Kind, template: Template) -> Self {
        Self {
            coordinate,
            environment: environment.into(),
            group: None,
            kind,
            parameters: BTreeMap::new(),
            template,
            skip: false,
            origin_object_id: None,
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, parameter: Parameter) -> Self {
        self.parameters.insert(name.into(), parameter);
        self
    }

    pub fn with_skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    /// The `name` parameter, required for non-single-configuration classic APIs.
    pub fn name_parameter(&self) -> Option<&Parameter> {
        self.parameters.get("name")
    }

    /// The `scope` parameter, required for settings and sub-path-scoped classic
    /// APIs.
    pub fn scope_parameter(&self) -> Option<&Parameter> {
        self.parameters.get("scope")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::ClassicApiKind;

    #[test]
    fn builder_methods_set_expected_fields() {
        let coord = Coordinate::new("p", "dashboard-v2", "d1");
        let config = Config::new(
            coord.clone(),
            "prod",
            Kind::ClassicApi(ClassicApiKind::new("dashboard-v2")),
            Template::new("dashboard", "{}"),
        )
        .with_parameter("name", Parameter::literal("my-dash"))
        .with_skip(true);

        assert_eq!(config.coordinate, coord);
        assert!(config.skip);
        assert!(config.name_parameter().is_some());
        assert!(config.scope_parameter().is_none());
    }
}
