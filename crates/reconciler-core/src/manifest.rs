//! Thin manifest and per-project config-file loader (`spec.md` §4.K). Parses
//! the YAML wire shapes declared in `reconciler_types::manifest` and resolves
//! them into the domain types the engine operates on. Directory-walking
//! conventions beyond "one config file per project, one template file per
//! config" and deep structural validation are left to the validators and to
//! operational convention, not enforced here.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use reconciler_types::{Config, ConfigFileDocument, Coordinate, Environment, ManifestDocument, Template};

pub fn load_manifest(path: &Path) -> Result<ManifestDocument> {
    let raw = fs::read_to_string(path).with_context(|| format!("failed to read manifest {}", path.display()))?;
    serde_yaml::from_str(&raw).with_context(|| format!("failed to parse manifest {}", path.display()))
}

/// Flatten every environment-group entry into a standalone [`Environment`],
/// resolving its auth spec. Fails fast on the first malformed auth spec.
pub fn resolve_environments(manifest: &ManifestDocument) -> Result<Vec<Environment>> {
    let mut environments = Vec::new();
    for group in &manifest.environment_groups {
        for entry in &group.environments {
            let auth = entry
                .auth
                .clone()
                .into_auth()
                .with_context(|| format!("environment {} has an invalid auth spec", entry.name))?;
            environments.push(Environment {
                name: entry.name.clone(),
                group: Some(group.name.clone()),
                url: entry.url.clone(),
                auth,
            });
        }
    }
    Ok(environments)
}

pub fn load_config_file(path: &Path) -> Result<ConfigFileDocument> {
    let raw = fs::read_to_string(path).with_context(|| format!("failed to read config file {}", path.display()))?;
    serde_yaml::from_str(&raw).with_context(|| format!("failed to parse config file {}", path.display()))
}

/// Load one project's configs for `environment`, reading each entry's
/// template body from `templates_dir/<entry.template>`.
pub fn load_project_configs(
    project_id: &str,
    environment: &str,
    config_file: &ConfigFileDocument,
    templates_dir: &Path,
) -> Result<Vec<Config>> {
    let mut configs = Vec::with_capacity(config_file.configs.len());
    for entry in &config_file.configs {
        let template_path = templates_dir.join(&entry.template);
        let template_body = fs::read_to_string(&template_path)
            .with_context(|| format!("failed to read template {}", template_path.display()))?;
        let kind = entry.config_type.clone().into_kind();
        let coordinate = Coordinate::new(project_id, kind.short_name(), &entry.id);

        let mut config = Config::new(coordinate, environment, kind, Template::new(&entry.template, template_body));
        config.parameters = entry.parameters.clone();
        config.skip = entry.skip;
        config.origin_object_id = entry.origin_object_id.clone();
        configs.push(config);
    }
    Ok(configs)
}

/// Directory layout convention: `<root>/<project.path>/configs.yaml` and
/// `<root>/<project.path>/templates/`.
pub fn project_config_file_path(root: &Path, project_path: &str) -> PathBuf {
    Path::new(root).join(project_path).join("configs.yaml")
}

pub fn project_templates_dir(root: &Path, project_path: &str) -> PathBuf {
    Path::new(root).join(project_path).join("templates")
}

/// Convenience used by the CLI: load every project's configs for one
/// environment in one call.
pub fn load_all_configs(root: &Path, manifest: &ManifestDocument, environment: &str) -> Result<BTreeMap<String, Vec<Config>>> {
    let mut by_project = BTreeMap::new();
    for project in &manifest.projects {
        let config_file_path = project_config_file_path(root, &project.path);
        if !config_file_path.exists() {
            continue;
        }
        let config_file = load_config_file(&config_file_path)?;
        let templates_dir = project_templates_dir(root, &project.path);
        let configs = load_project_configs(&project.name, environment, &config_file, &templates_dir)?;
        by_project.insert(project.name.clone(), configs);
    }
    Ok(by_project)
}
