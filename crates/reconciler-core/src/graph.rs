//! Per-environment dependency graph construction, component splitting and
//! topological sort (`spec.md` §4.E).

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use reconciler_types::Coordinate;

/// A deployable vertex's place in the graph: its parents (other coordinates in
/// the same load this config's parameters reference) and its children.
#[derive(Debug, Clone, Default)]
struct Node {
    parents: BTreeSet<Coordinate>,
    children: BTreeSet<Coordinate>,
}

/// The dependency graph for one environment's load.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeMap<Coordinate, Node>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CyclicDependencyError {
    pub cycles: Vec<Vec<Coordinate>>,
}

impl std::fmt::Display for CyclicDependencyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} cyclic dependency group(s) detected", self.cycles.len())
    }
}

impl std::error::Error for CyclicDependencyError {}

/// One weakly-connected component, already sorted into a valid deployment
/// order (parents before children).
#[derive(Debug, Clone)]
pub struct Component {
    pub order: Vec<Coordinate>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a vertex. Safe to call more than once for the same
    /// coordinate (skipped configs are vertices too).
    pub fn add_vertex(&mut self, coordinate: Coordinate) {
        self.nodes.entry(coordinate).or_default();
    }

    /// Record that `child` depends on `parent` (edge `parent -> child`).
    /// Edges whose `parent` coordinate isn't part of this load are dropped —
    /// cross-environment or unresolved references are the scheduler's concern
    /// at resolution time, not the graph's.
    pub fn add_edge(&mut self, parent: &Coordinate, child: &Coordinate) {
        if !self.nodes.contains_key(parent) {
            return;
        }
        self.nodes.entry(child.clone()).or_default();
        self.nodes.get_mut(parent).unwrap().children.insert(child.clone());
        self.nodes.get_mut(child).unwrap().parents.insert(parent.clone());
    }

    pub fn parents_of(&self, coordinate: &Coordinate) -> BTreeSet<Coordinate> {
        self.nodes.get(coordinate).map(|n| n.parents.clone()).unwrap_or_default()
    }

    pub fn children_of(&self, coordinate: &Coordinate) -> BTreeSet<Coordinate> {
        self.nodes.get(coordinate).map(|n| n.children.clone()).unwrap_or_default()
    }

    pub fn vertex_count(&self) -> usize {
        self.nodes.len()
    }

    /// Split into weakly-connected components, each internally topologically
    /// sorted. Any vertex left with nonzero in-degree inside a component after
    /// Kahn's algorithm completes belongs to one or more cycles, reported via
    /// [`CyclicDependencyError`] rather than silently dropped or partially
    /// ordered.
    pub fn components(&self) -> Result<Vec<Component>, CyclicDependencyError> {
        let groups = self.weakly_connected_components();
        let mut components = Vec::with_capacity(groups.len());
        let mut all_cycles = Vec::new();

        for group in groups {
            match self.topo_sort_subset(&group) {
                Ok(order) => components.push(Component { order }),
                Err(cycles) => all_cycles.extend(cycles),
            }
        }

        if !all_cycles.is_empty() {
            return Err(CyclicDependencyError { cycles: all_cycles });
        }
        Ok(components)
    }

    fn weakly_connected_components(&self) -> Vec<BTreeSet<Coordinate>> {
        let mut visited: BTreeSet<Coordinate> = BTreeSet::new();
        let mut groups = Vec::new();

        for start in self.nodes.keys() {
            if visited.contains(start) {
                continue;
            }
            let mut group = BTreeSet::new();
            let mut queue = VecDeque::from([start.clone()]);
            while let Some(current) = queue.pop_front() {
                if !group.insert(current.clone()) {
                    continue;
                }
                visited.insert(current.clone());
                let node = &self.nodes[&current];
                for neighbour in node.parents.iter().chain(node.children.iter()) {
                    if !group.contains(neighbour) {
                        queue.push_back(neighbour.clone());
                    }
                }
            }
            groups.push(group);
        }
        groups
    }

    /// Kahn's algorithm restricted to `subset`. Returns the cycle's
    /// coordinates (possibly spanning more than one disjoint cycle within the
    /// same component) on failure.
    fn topo_sort_subset(&self, subset: &BTreeSet<Coordinate>) -> Result<Vec<Coordinate>, Vec<Vec<Coordinate>>> {
        let mut in_degree: BTreeMap<&Coordinate, usize> = subset
            .iter()
            .map(|c| (c, self.nodes[c].parents.intersection(subset).count()))
            .collect();

        let mut queue: VecDeque<&Coordinate> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(c, _)| *c)
            .collect();
        let mut order = Vec::with_capacity(subset.len());

        while let Some(current) = queue.pop_front() {
            order.push(current.clone());
            for child in self.nodes[current].children.intersection(subset) {
                let degree = in_degree.get_mut(child).unwrap();
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(child);
                }
            }
        }

        if order.len() == subset.len() {
            return Ok(order);
        }

        let remaining: BTreeSet<Coordinate> = in_degree
            .into_iter()
            .filter(|(_, degree)| *degree > 0)
            .map(|(c, _)| c.clone())
            .collect();
        Err(self.split_into_cycles(&remaining))
    }

    /// Split the vertices still carrying nonzero in-degree after Kahn's
    /// algorithm into their distinct cycles, via connectivity within the
    /// remaining subgraph.
    fn split_into_cycles(&self, remaining: &BTreeSet<Coordinate>) -> Vec<Vec<Coordinate>> {
        let mut visited = BTreeSet::new();
        let mut cycles = Vec::new();
        for start in remaining {
            if visited.contains(start) {
                continue;
            }
            let mut cycle = BTreeSet::new();
            let mut queue = VecDeque::from([start.clone()]);
            while let Some(current) = queue.pop_front() {
                if !cycle.insert(current.clone()) {
                    continue;
                }
                visited.insert(current.clone());
                let node = &self.nodes[&current];
                for neighbour in node.parents.intersection(remaining).chain(node.children.intersection(remaining)) {
                    if !cycle.contains(neighbour) {
                        queue.push_back(neighbour.clone());
                    }
                }
            }
            cycles.push(cycle.into_iter().collect());
        }
        cycles
    }

    /// Render a Graphviz-flavoured description for diagnostics.
    pub fn describe(&self) -> String {
        let mut lines = vec!["digraph deploy {".to_string()];
        for (coord, node) in &self.nodes {
            for child in &node.children {
                lines.push(format!("  \"{coord}\" -> \"{child}\";"));
            }
        }
        lines.push("}".to_string());
        lines.join("\n")
    }
}
