use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a config within a single load: `(project, kind, configId)`.
///
/// Two configs with equal coordinates are forbidden within one project load
/// (see [`crate::errors::ValidationError::DuplicateCoordinate`]). Coordinates are the
/// vertices of the dependency graph and the keys of the entity map.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    pub project: String,
    /// Short name of the config's kind, e.g. `"dashboard-v2"`, `"settings"`,
    /// `"workflow"`, `"bucket"` — used for display and for the duplicate-identity
    /// check, not for dispatch (dispatch switches on [`crate::kind::Kind`] itself).
    pub kind: String,
    pub config_id: String,
}

impl Coordinate {
    pub fn new(project: impl Into<String>, kind: impl Into<String>, config_id: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            kind: kind.into(),
            config_id: config_id.into(),
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.project, self.kind, self.config_id)
    }
}
