//! Parallel-across-components, ordered-within-component deployment scheduler
//! (`spec.md` §4.F), grounded on the teacher's `thread::scope` + `Condvar`
//! worker-per-task idiom.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};

use reconciler_events::ReportBus;
use reconciler_types::{
    Coordinate, DeployError, DeployState, Detail, EnvironmentDeploymentErrors, ReportRecord, ResolvedEntity,
};

use crate::entity_map::EntityMap;
use crate::graph::DependencyGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    Pending,
    Deployed,
    Failed,
    Skipped,
}

impl NodeState {
    fn is_terminal(self) -> bool {
        !matches!(self, NodeState::Pending)
    }

    fn blocks_children(self) -> bool {
        matches!(self, NodeState::Failed | NodeState::Skipped)
    }
}

pub struct SchedulerOptions {
    pub continue_on_error: bool,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self { continue_on_error: true }
    }
}

/// One config's full deployment behaviour, invoked exactly once per
/// coordinate once its parents have settled. Returning `Err` fails the node;
/// the caller decides elsewhere whether `config.skip` should short-circuit
/// this call entirely (see `deploy_environment`'s `should_skip` callback).
pub trait NodeDeployer: Sync {
    fn should_skip(&self, coordinate: &Coordinate) -> bool;
    fn deploy(&self, coordinate: &Coordinate, entity_map: &EntityMap) -> Result<ResolvedEntity, DeployError>;
}

/// Run every component of `graph` to completion, respecting `options.continue_on_error`.
pub fn deploy_environment(
    environment: &str,
    graph: &DependencyGraph,
    deployer: &dyn NodeDeployer,
    entity_map: &EntityMap,
    report_bus: &ReportBus,
    options: &SchedulerOptions,
) -> EnvironmentDeploymentErrors {
    let components = match graph.components() {
        Ok(components) => components,
        Err(cycles) => {
            let mut errors = EnvironmentDeploymentErrors::new(environment);
            errors.push(DeployError::CyclicDependency { cycles: cycles.cycles });
            return errors;
        }
    };

    let mut states: BTreeMap<Coordinate, NodeState> = BTreeMap::new();
    for component in &components {
        for coordinate in &component.order {
            states.insert(coordinate.clone(), NodeState::Pending);
        }
    }

    let sync = NodeSync {
        states: Mutex::new(states),
        condvar: Condvar::new(),
    };
    let halt = AtomicBool::new(false);
    let errors = Mutex::new(EnvironmentDeploymentErrors::new(environment));

    std::thread::scope(|scope| {
        for component in &components {
            for coordinate in &component.order {
                let parents = graph.parents_of(coordinate);
                scope.spawn(|| {
                    run_node(
                        coordinate,
                        &parents,
                        deployer,
                        entity_map,
                        report_bus,
                        &sync,
                        &halt,
                        &errors,
                        options,
                    );
                });
            }
        }
    });

    errors.into_inner().expect("errors mutex poisoned")
}

struct NodeSync {
    states: Mutex<BTreeMap<Coordinate, NodeState>>,
    condvar: Condvar,
}

#[allow(clippy::too_many_arguments)]
fn run_node(
    coordinate: &Coordinate,
    parents: &std::collections::BTreeSet<Coordinate>,
    deployer: &dyn NodeDeployer,
    entity_map: &EntityMap,
    report_bus: &ReportBus,
    sync: &NodeSync,
    halt: &AtomicBool,
    errors: &Mutex<EnvironmentDeploymentErrors>,
    options: &SchedulerOptions,
) {
    let parent_failed = wait_for_parents(parents, sync);

    let mut states = sync.states.lock().expect("scheduler state poisoned");
    let outcome = if parent_failed {
        NodeOutcome::SkippedDueToParent
    } else if halt.load(Ordering::SeqCst) && !options.continue_on_error {
        NodeOutcome::SkippedDueToHalt
    } else if deployer.should_skip(coordinate) {
        NodeOutcome::SkippedByConfig
    } else {
        NodeOutcome::Run
    };
    drop(states);

    match outcome {
        NodeOutcome::SkippedDueToParent | NodeOutcome::SkippedDueToHalt | NodeOutcome::SkippedByConfig => {
            entity_map.put(ResolvedEntity::skipped(coordinate.clone()));
            publish(report_bus, coordinate, DeployState::Skipped, None);
            states = sync.states.lock().expect("scheduler state poisoned");
            states.insert(coordinate.clone(), NodeState::Skipped);
            drop(states);
            sync.condvar.notify_all();
        }
        NodeOutcome::Run => match deployer.deploy(coordinate, entity_map) {
            Ok(entity) => {
                entity_map.put(entity);
                publish(report_bus, coordinate, DeployState::Success, None);
                states = sync.states.lock().expect("scheduler state poisoned");
                states.insert(coordinate.clone(), NodeState::Deployed);
                drop(states);
                sync.condvar.notify_all();
            }
            Err(err) => {
                entity_map.put(ResolvedEntity::skipped(coordinate.clone()));
                publish(report_bus, coordinate, DeployState::Error, Some(err.to_string()));
                if !options.continue_on_error {
                    halt.store(true, Ordering::SeqCst);
                }
                errors.lock().expect("errors mutex poisoned").push(err);
                states = sync.states.lock().expect("scheduler state poisoned");
                states.insert(coordinate.clone(), NodeState::Failed);
                drop(states);
                sync.condvar.notify_all();
            }
        },
    }
}

enum NodeOutcome {
    Run,
    SkippedDueToParent,
    SkippedDueToHalt,
    SkippedByConfig,
}

/// Block until every parent has reached a terminal state. Returns true if any
/// parent failed or was skipped, meaning this node must skip rather than run.
fn wait_for_parents(parents: &std::collections::BTreeSet<Coordinate>, sync: &NodeSync) -> bool {
    if parents.is_empty() {
        return false;
    }
    let mut states = sync.states.lock().expect("scheduler state poisoned");
    loop {
        let all_terminal = parents.iter().all(|p| states.get(p).is_none_or(|s| s.is_terminal()));
        if all_terminal {
            return parents.iter().any(|p| states.get(p).is_some_and(|s| s.blocks_children()));
        }
        states = sync.condvar.wait(states).expect("scheduler state poisoned");
    }
}

fn publish(report_bus: &ReportBus, coordinate: &Coordinate, state: DeployState, error: Option<String>) {
    let mut record = ReportRecord::new(coordinate, state);
    if let Some(error) = error {
        record = record.with_detail(Detail::error(error.clone())).with_error(error);
    }
    report_bus.publish(record);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn coord(id: &str) -> Coordinate {
        Coordinate::new("proj", "dashboard-v2", id)
    }

    struct CountingDeployer {
        deployed: AtomicU32,
        fail: BTreeMap<Coordinate, ()>,
        skip: BTreeMap<Coordinate, ()>,
    }

    impl NodeDeployer for CountingDeployer {
        fn should_skip(&self, coordinate: &Coordinate) -> bool {
            self.skip.contains_key(coordinate)
        }

        fn deploy(&self, coordinate: &Coordinate, _entity_map: &EntityMap) -> Result<ResolvedEntity, DeployError> {
            if self.fail.contains_key(coordinate) {
                return Err(DeployError::ConfigResolve {
                    coordinate: coordinate.clone(),
                    message: "forced failure".into(),
                });
            }
            self.deployed.fetch_add(1, Ordering::SeqCst);
            Ok(ResolvedEntity::deployed(coordinate.clone(), format!("{coordinate}-id")))
        }
    }

    #[test]
    fn linear_chain_deploys_all_nodes() {
        let mut graph = DependencyGraph::new();
        graph.add_vertex(coord("a"));
        graph.add_vertex(coord("b"));
        graph.add_edge(&coord("a"), &coord("b"));

        let deployer = CountingDeployer {
            deployed: AtomicU32::new(0),
            fail: BTreeMap::new(),
            skip: BTreeMap::new(),
        };
        let entity_map = EntityMap::new();
        let report_bus = ReportBus::new();
        let errors = deploy_environment(
            "prod",
            &graph,
            &deployer,
            &entity_map,
            &report_bus,
            &SchedulerOptions::default(),
        );

        assert!(errors.is_empty());
        assert_eq!(deployer.deployed.load(Ordering::SeqCst), 2);
        assert!(entity_map.get(&coord("b")).unwrap().id().is_some());
    }

    #[test]
    fn failed_parent_skips_descendants() {
        let mut graph = DependencyGraph::new();
        graph.add_vertex(coord("a"));
        graph.add_vertex(coord("b"));
        graph.add_edge(&coord("a"), &coord("b"));

        let mut fail = BTreeMap::new();
        fail.insert(coord("a"), ());
        let deployer = CountingDeployer {
            deployed: AtomicU32::new(0),
            fail,
            skip: BTreeMap::new(),
        };
        let entity_map = EntityMap::new();
        let report_bus = ReportBus::new();
        let errors = deploy_environment(
            "prod",
            &graph,
            &deployer,
            &entity_map,
            &report_bus,
            &SchedulerOptions::default(),
        );

        assert_eq!(errors.errors.len(), 1);
        assert!(entity_map.get(&coord("b")).unwrap().skip);
    }

    #[test]
    fn skip_true_propagates_without_remote_call() {
        let mut graph = DependencyGraph::new();
        graph.add_vertex(coord("a"));
        graph.add_vertex(coord("b"));
        graph.add_edge(&coord("a"), &coord("b"));

        let mut skip = BTreeMap::new();
        skip.insert(coord("a"), ());
        let deployer = CountingDeployer {
            deployed: AtomicU32::new(0),
            fail: BTreeMap::new(),
            skip,
        };
        let entity_map = EntityMap::new();
        let report_bus = ReportBus::new();
        let errors = deploy_environment(
            "prod",
            &graph,
            &deployer,
            &entity_map,
            &report_bus,
            &SchedulerOptions::default(),
        );

        assert!(errors.is_empty());
        assert_eq!(deployer.deployed.load(Ordering::SeqCst), 0);
        assert!(entity_map.get(&coord("a")).unwrap().skip);
        assert!(entity_map.get(&coord("b")).unwrap().skip);
    }

    #[test]
    fn independent_components_both_complete() {
        let mut graph = DependencyGraph::new();
        graph.add_vertex(coord("a"));
        graph.add_vertex(coord("x"));

        let deployer = CountingDeployer {
            deployed: AtomicU32::new(0),
            fail: BTreeMap::new(),
            skip: BTreeMap::new(),
        };
        let entity_map = EntityMap::new();
        let report_bus = ReportBus::new();
        let errors = deploy_environment(
            "prod",
            &graph,
            &deployer,
            &entity_map,
            &report_bus,
            &SchedulerOptions::default(),
        );

        assert!(errors.is_empty());
        assert_eq!(deployer.deployed.load(Ordering::SeqCst), 2);
    }
}
