//! # reconciler
//!
//! A deployment reconciliation engine: takes configuration-as-code describing
//! dashboards, settings objects, automations and storage buckets across a set
//! of environments, and reconciles each environment's remote state to match —
//! creating or updating whatever differs, skipping what's marked `skip`, and
//! propagating failures to dependents rather than guessing.
//!
//! ## Pipeline
//!
//! 1. [`manifest::load_manifest`] + [`manifest::load_all_configs`] read the
//!    manifest and every project's config files for one environment.
//! 2. [`validators::validate`] runs the static checks in `spec.md` §4.H
//!    before anything is scheduled.
//! 3. [`graph::DependencyGraph`] orders configs within each environment by
//!    their parameter references, split into independent components.
//! 4. [`scheduler::deploy_environment`] runs each component in parallel,
//!    deploying nodes in topological order and propagating failure/skip to
//!    descendants.
//! 5. Each node's [`params::resolve_all`] + [`dispatcher::Dispatcher`] render
//!    its template and upsert it through the kind-appropriate
//!    [`clients`] client over [`transport::Transport`].
//! 6. [`reconciler_events::ReportBus`] fans every transition out to an
//!    append-only JSONL report file.
//!
//! ## Modules
//!
//! - [`manifest`] — manifest/config-file loading (`spec.md` §4.K)
//! - [`transport`] — authenticated, rate-limited, retrying HTTP (`spec.md` §4.A)
//! - [`clients`] — the four kind-shaped resource clients (`spec.md` §4.B)
//! - [`entity_map`] — concurrent coordinate -> entity registry (`spec.md` §4.C)
//! - [`params`] — intra-config parameter resolution ordering (`spec.md` §4.D)
//! - [`graph`] — per-environment dependency graph (`spec.md` §4.E)
//! - [`scheduler`] — parallel deployment scheduler (`spec.md` §4.F)
//! - [`dispatcher`] — kind dispatch to the right client (`spec.md` §4.G)
//! - [`validators`] — pre-deployment static checks (`spec.md` §4.H)
//! - [`reporter`] — human-facing progress output (`spec.md` §4.L)
//! - [`concurrency`] — bounded-parallelism primitive (`spec.md` §4.J)

pub mod clients;
pub mod concurrency;
pub mod dispatcher;
pub mod entity_map;
pub mod graph;
pub mod manifest;
pub mod params;
pub mod reporter;
pub mod scheduler;
pub mod transport;
pub mod validators;

pub use reconciler_events as events;
pub use reconciler_retry as retry;
pub use reconciler_types as types;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use reconciler_events::{report_path, ReportBus, SharedReportSink};
use reconciler_types::{Auth, Config, Coordinate, DeployError, EnvironmentDeploymentErrors};
use std::sync::Arc;

use crate::dispatcher::Dispatcher;
use crate::entity_map::EntityMap;
use crate::graph::DependencyGraph;
use crate::params::resolve_all;
use crate::reporter::Reporter;
use crate::scheduler::{deploy_environment, NodeDeployer, SchedulerOptions};
use crate::transport::Transport;

pub const DEFAULT_MANIFEST_FILENAME: &str = "manifest.yaml";

/// Runtime knobs for a `deploy` run (`spec.md` §4.M surfaces these as CLI flags).
pub struct EngineOptions {
    /// `<= 0` means unbounded, matching [`concurrency::Limiter::new`].
    pub concurrent_requests: i64,
    pub continue_on_error: bool,
    pub report_path: Option<PathBuf>,
    /// Empty means "every environment in the manifest".
    pub environments: Vec<String>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            concurrent_requests: 8,
            continue_on_error: true,
            report_path: None,
            environments: Vec::new(),
        }
    }
}

/// Run the full reconciliation pipeline against every selected environment in
/// the manifest rooted at `root`. Returns one [`EnvironmentDeploymentErrors`]
/// per environment that was attempted; an empty value for a given environment
/// means that environment deployed cleanly.
pub fn deploy(root: &Path, options: &EngineOptions, reporter: &dyn Reporter) -> Result<BTreeMap<String, EnvironmentDeploymentErrors>> {
    let manifest_path = root.join(DEFAULT_MANIFEST_FILENAME);
    let manifest = manifest::load_manifest(&manifest_path)?;
    let environments = manifest::resolve_environments(&manifest)?;

    let selected: Vec<_> = if options.environments.is_empty() {
        environments.iter().collect()
    } else {
        environments.iter().filter(|e| options.environments.contains(&e.name)).collect()
    };

    let mut results = BTreeMap::new();
    for environment in selected {
        reporter.info(&format!("deploying environment {}", environment.name));
        let errors = deploy_one_environment(root, &manifest, environment, options, reporter)
            .with_context(|| format!("failed to deploy environment {}", environment.name))?;
        if errors.is_empty() {
            reporter.info(&format!("environment {} deployed successfully", environment.name));
        } else {
            reporter.error(&format!("environment {} had {} error(s)", environment.name, errors.errors.len()));
        }
        let halt = !options.continue_on_error && !errors.is_empty();
        results.insert(environment.name.clone(), errors);
        if halt {
            reporter.warn("continue_on_error is false; stopping before remaining environments");
            break;
        }
    }
    Ok(results)
}

fn deploy_one_environment(
    root: &Path,
    manifest: &reconciler_types::ManifestDocument,
    environment: &reconciler_types::Environment,
    options: &EngineOptions,
    reporter: &dyn Reporter,
) -> Result<EnvironmentDeploymentErrors> {
    let by_project = manifest::load_all_configs(root, manifest, &environment.name)?;
    let configs: Vec<Config> = by_project.into_values().flatten().collect();

    let mut environment_auth: BTreeMap<String, Auth> = BTreeMap::new();
    environment_auth.insert(environment.name.clone(), environment.auth.clone());

    let config_refs: Vec<&Config> = configs.iter().collect();
    // No grouping-id registry exists in the loaded manifest shape today; see
    // DESIGN.md for the open-question resolution.
    let group_ids: BTreeSet<String> = BTreeSet::new();
    let validation_errors = validators::validate(&config_refs, &group_ids, &environment_auth);
    if !validation_errors.is_empty() {
        let mut errors = EnvironmentDeploymentErrors::new(&environment.name);
        for err in validation_errors {
            reporter.error(&err.to_string());
            errors.push(DeployError::Validation(err));
        }
        return Ok(errors);
    }

    let configs_by_coordinate: BTreeMap<Coordinate, Config> =
        configs.into_iter().map(|c| (c.coordinate.clone(), c)).collect();

    let mut graph = DependencyGraph::new();
    for coordinate in configs_by_coordinate.keys() {
        graph.add_vertex(coordinate.clone());
    }
    for config in configs_by_coordinate.values() {
        for dependency in config.parameters.values().flat_map(|p| p.dependencies()) {
            if configs_by_coordinate.contains_key(&dependency.coordinate) {
                graph.add_edge(&dependency.coordinate, &config.coordinate);
            }
        }
    }

    let base_url = environment.resolved_url().context("failed to resolve environment url")?;
    let auth_header = resolve_auth_header(&environment.auth)?;
    let transport = Transport::new(base_url, auth_header, options.concurrent_requests);
    let dispatcher = Dispatcher::new(&transport);
    let deployer = ConfigDeployer {
        configs: &configs_by_coordinate,
        dispatcher,
    };

    let entity_map = EntityMap::new();
    let mut report_bus = ReportBus::new();
    let sink = SharedReportSink::new();
    report_bus.subscribe(Arc::new(sink.clone()));

    let errors = deploy_environment(
        &environment.name,
        &graph,
        &deployer,
        &entity_map,
        &report_bus,
        &SchedulerOptions {
            continue_on_error: options.continue_on_error,
        },
    );

    let report_file = options.report_path.clone().unwrap_or_else(|| report_path(root));
    sink.write_to_file(&report_file).context("failed to write deployment report")?;

    Ok(errors)
}

fn resolve_auth_header(auth: &Auth) -> Result<String> {
    match auth {
        Auth::Token { token } => {
            let resolved = token.resolve().context("failed to resolve classic auth token")?;
            Ok(format!("Bearer {resolved}"))
        }
        Auth::OAuth { .. } => {
            anyhow::bail!("OAuth client-credentials exchange is out of scope; supply an already-resolved token instead")
        }
    }
}

struct ConfigDeployer<'a> {
    configs: &'a BTreeMap<Coordinate, Config>,
    dispatcher: Dispatcher<'a>,
}

impl NodeDeployer for ConfigDeployer<'_> {
    fn should_skip(&self, coordinate: &Coordinate) -> bool {
        self.configs.get(coordinate).is_none_or(|c| c.skip)
    }

    fn deploy(&self, coordinate: &Coordinate, entity_map: &EntityMap) -> std::result::Result<reconciler_types::ResolvedEntity, DeployError> {
        let config = self.configs.get(coordinate).expect("scheduler only deploys known coordinates");

        let resolved = resolve_all(&config.parameters, entity_map).map_err(|e| DeployError::ConfigResolve {
            coordinate: coordinate.clone(),
            message: e.to_string(),
        })?;

        let rendered = reconciler_types::template::render(&config.template.body, &resolved).map_err(|e| DeployError::ConfigResolve {
            coordinate: coordinate.clone(),
            message: e.to_string(),
        })?;
        let rendered_body: serde_json::Value = serde_json::from_str(&rendered).map_err(|e| DeployError::ConfigResolve {
            coordinate: coordinate.clone(),
            message: format!("rendered template is not valid JSON: {e}"),
        })?;

        self.dispatcher.dispatch(config, &rendered_body, &resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconciler_types::Indirected;

    #[test]
    fn resolve_auth_header_formats_bearer_token() {
        let auth = Auth::Token {
            token: Indirected::Value { value: "secret".into() },
        };
        assert_eq!(resolve_auth_header(&auth).unwrap(), "Bearer secret");
    }

    #[test]
    fn resolve_auth_header_rejects_oauth() {
        let auth = Auth::OAuth {
            client_id: Indirected::Value { value: "id".into() },
            client_secret: Indirected::Value { value: "secret".into() },
            token_endpoint: None,
        };
        assert!(resolve_auth_header(&auth).is_err());
    }
}
