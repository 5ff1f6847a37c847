use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coordinate::Coordinate;

/// A failed HTTP response, carrying enough context to build a report entry and
/// to drive retry classification without re-parsing the transport's error type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RespError {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub request_info: String,
}

impl std::fmt::Display for RespError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.status, self.request_info, truncate(&self.body, 200))
    }
}

impl std::error::Error for RespError {}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Pre-deployment static check failures (`spec.md` §4.H).
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("duplicate coordinate {0} within project load")]
    DuplicateCoordinate(Coordinate),

    #[error("config id {config_id} in project {project} clashes with a group id in the same project")]
    ConfigIdClashesWithGroup { project: String, config_id: String },

    #[error("{coordinate} has a platform-only kind but targets environment {environment} which authenticates with a classic token only")]
    PlatformOnlyKindOnClassicEnvironment { coordinate: Coordinate, environment: String },

    #[error("{coordinate} is missing required parameter {parameter}")]
    MissingRequiredParameter { coordinate: Coordinate, parameter: String },
}

/// Top-level error taxonomy surfaced by the engine (`spec.md` §4.I).
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum DeployError {
    #[error("failed to resolve config {coordinate}: {message}")]
    ConfigResolve { coordinate: Coordinate, message: String },

    #[error("failed to upsert config {coordinate}: {source}")]
    ConfigUpsert { coordinate: Coordinate, source: RespError },

    #[error("{coordinate} skipped because its dependency {parent} failed or was skipped")]
    Dependency { coordinate: Coordinate, parent: Coordinate },

    #[error("cyclic dependency detected: {} cycle(s)", cycles.len())]
    CyclicDependency { cycles: Vec<Vec<Coordinate>> },

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("I/O error: {0}")]
    Io(String),
}

impl DeployError {
    pub fn coordinate(&self) -> Option<&Coordinate> {
        match self {
            DeployError::ConfigResolve { coordinate, .. } => Some(coordinate),
            DeployError::ConfigUpsert { coordinate, .. } => Some(coordinate),
            DeployError::Dependency { coordinate, .. } => Some(coordinate),
            DeployError::CyclicDependency { .. } => None,
            DeployError::Validation(ValidationError::DuplicateCoordinate(c)) => Some(c),
            DeployError::Validation(ValidationError::PlatformOnlyKindOnClassicEnvironment { coordinate, .. }) => {
                Some(coordinate)
            }
            DeployError::Validation(ValidationError::MissingRequiredParameter { coordinate, .. }) => Some(coordinate),
            DeployError::Validation(ValidationError::ConfigIdClashesWithGroup { .. }) => None,
            DeployError::Io(_) => None,
        }
    }
}

/// Aggregated errors for a single environment's deployment run. Its presence
/// signals non-success for that environment (`spec.md` §4.F point 7).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentDeploymentErrors {
    pub environment: String,
    pub errors: Vec<DeployError>,
}

impl EnvironmentDeploymentErrors {
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            errors: Vec::new(),
        }
    }

    pub fn push(&mut self, error: DeployError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resp_error_display_truncates_long_bodies() {
        let err = RespError {
            status: 500,
            headers: BTreeMap::new(),
            body: "x".repeat(500),
            request_info: "PUT /api/v2/dashboards/d1".into(),
        };
        let text = err.to_string();
        assert!(text.len() < 500);
        assert!(text.starts_with("500 (PUT /api/v2/dashboards/d1):"));
    }

    #[test]
    fn deploy_error_coordinate_extraction() {
        let coord = Coordinate::new("p", "k", "c");
        let err = DeployError::ConfigResolve {
            coordinate: coord.clone(),
            message: "bad template".into(),
        };
        assert_eq!(err.coordinate(), Some(&coord));

        let cyclic = DeployError::CyclicDependency { cycles: vec![] };
        assert_eq!(cyclic.coordinate(), None);
    }

    #[test]
    fn environment_errors_track_emptiness() {
        let mut errs = EnvironmentDeploymentErrors::new("prod");
        assert!(errs.is_empty());
        errs.push(DeployError::Io("disk full".into()));
        assert!(!errs.is_empty());
    }

    #[test]
    fn deploy_error_serializes_and_round_trips() {
        let err = DeployError::Dependency {
            coordinate: Coordinate::new("p", "k", "c1"),
            parent: Coordinate::new("p", "k", "c0"),
        };
        let json = serde_json::to_string(&err).unwrap();
        let back: DeployError = serde_json::from_str(&json).unwrap();
        assert_eq!(err.to_string(), back.to_string());
    }
}
