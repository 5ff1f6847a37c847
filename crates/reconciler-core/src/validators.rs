//! Pre-deployment static checks, run once per load before any scheduling
//! begins (`spec.md` §4.H).

use std::collections::{BTreeMap, BTreeSet};

use reconciler_types::{Auth, Config, Coordinate, ValidationError};

/// Validate one project's configs against one environment's auth, plus the
/// whole-load identity constraints. Collects every violation rather than
/// failing fast, so a single run surfaces every fixable problem at once.
pub fn validate(
    configs: &[&Config],
    group_ids: &BTreeSet<String>,
    environment_auth: &BTreeMap<String, Auth>,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    errors.extend(check_duplicate_identity(configs));
    errors.extend(check_config_id_does_not_clash_with_group(configs, group_ids));
    errors.extend(check_platform_only_kinds(configs, environment_auth));
    errors.extend(check_required_parameters(configs));
    errors
}

fn check_duplicate_identity(configs: &[&Config]) -> Vec<ValidationError> {
    let mut seen: BTreeSet<Coordinate> = BTreeSet::new();
    let mut errors = Vec::new();
    for config in configs {
        if !seen.insert(config.coordinate.clone()) {
            errors.push(ValidationError::DuplicateCoordinate(config.coordinate.clone()));
        }
    }
    errors
}

fn check_config_id_does_not_clash_with_group(configs: &[&Config], group_ids: &BTreeSet<String>) -> Vec<ValidationError> {
    configs
        .iter()
        .filter(|c| group_ids.contains(&c.coordinate.config_id))
        .map(|c| ValidationError::ConfigIdClashesWithGroup {
            project: c.coordinate.project.clone(),
            config_id: c.coordinate.config_id.clone(),
        })
        .collect()
}

fn check_platform_only_kinds(configs: &[&Config], environment_auth: &BTreeMap<String, Auth>) -> Vec<ValidationError> {
    configs
        .iter()
        .filter(|c| c.kind.is_platform_only())
        .filter_map(|c| {
            let auth = environment_auth.get(&c.environment)?;
            auth.is_classic_token_only().then(|| ValidationError::PlatformOnlyKindOnClassicEnvironment {
                coordinate: c.coordinate.clone(),
                environment: c.environment.clone(),
            })
        })
        .collect()
}

fn check_required_parameters(configs: &[&Config]) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for config in configs {
        if config.kind.requires_name_parameter() && config.name_parameter().is_none() {
            errors.push(ValidationError::MissingRequiredParameter {
                coordinate: config.coordinate.clone(),
                parameter: "name".to_string(),
            });
        }
        if config.kind.requires_scope_parameter() && config.scope_parameter().is_none() {
            errors.push(ValidationError::MissingRequiredParameter {
                coordinate: config.coordinate.clone(),
                parameter: "scope".to_string(),
            });
        }
    }
    errors
}
