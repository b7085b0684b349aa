//! Dependency graph discovery and ordering.
//!
//! [`DependencyGraph::discover`] walks blueprints from the root type and
//! records, for every reachable type, the types its fields depend on.
//! [`TopologicalSorter`] then hands out nodes whose dependencies are all
//! done, in the `prepare` / `get_ready` / `done` style:
//!
//! ```text
//! prepare()  ──>  while is_active() { get_ready() ... done(node) }
//! ```
//!
//! Cycles are reported by `prepare()` before any node is handed out.

use std::collections::{HashMap, HashSet};

use tracing::{debug, instrument, trace, warn};

use crate::blueprint::Blueprint;
use crate::error::{CircularDependencyError, Result, TarkibError};
use crate::key::DependencyKey;

/// A discovered node: its blueprint and the types its fields require.
#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub blueprint: Blueprint,
    /// One entry per field, in declaration order (may repeat)
    pub dependencies: Vec<DependencyKey>,
}

/// Every type reachable from a root, with its dependencies.
#[derive(Debug)]
pub(crate) struct DependencyGraph {
    root: DependencyKey,
    /// Discovery order; the root comes first
    order: Vec<DependencyKey>,
    nodes: HashMap<DependencyKey, Node>,
}

impl DependencyGraph {
    /// Discovers the full graph reachable from `root`.
    ///
    /// Each type is expanded once, so discovery terminates even if the
    /// declarations are cyclic.
    ///
    /// # Errors
    /// [`TarkibError::DuplicateField`] if a blueprint repeats a field name.
    #[instrument(skip_all, name = "graph_discovery", fields(root = %root.key()))]
    pub fn discover(root: Blueprint) -> Result<Self> {
        let mut graph = Self {
            root: root.key(),
            order: Vec::new(),
            nodes: HashMap::new(),
        };
        graph.visit(root)?;

        debug!(nodes = graph.len(), "Dependency graph discovered");
        Ok(graph)
    }

    fn visit(&mut self, blueprint: Blueprint) -> Result<()> {
        let key = blueprint.key();
        if self.nodes.contains_key(&key) {
            return Ok(());
        }

        let mut seen = HashSet::new();
        for field in blueprint.fields() {
            if !seen.insert(field.name()) {
                return Err(TarkibError::DuplicateField {
                    owner: key,
                    field: field.name(),
                });
            }
        }

        let dependencies: Vec<DependencyKey> = blueprint.fields().iter().map(|f| f.key()).collect();
        let pending: Vec<Blueprint> = blueprint
            .fields()
            .iter()
            .filter(|f| !self.nodes.contains_key(&f.key()))
            .map(|f| f.dependency_blueprint())
            .collect();

        trace!(node = %key, dependencies = dependencies.len(), leaf = blueprint.is_leaf(), "Discovered node");
        self.order.push(key);
        self.nodes.insert(key, Node { blueprint, dependencies });

        for next in pending {
            self.visit(next)?;
        }
        Ok(())
    }

    /// Key of the root type.
    pub fn root(&self) -> DependencyKey {
        self.root
    }

    /// Blueprint of the root type.
    pub fn root_blueprint(&self) -> &Blueprint {
        &self.nodes[&self.root].blueprint
    }

    pub fn node(&self, key: &DependencyKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    /// Keys in discovery order.
    pub fn keys(&self) -> &[DependencyKey] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Finds one cycle, returned as a chain whose last key repeats the
    /// first key of the cycle.
    ///
    /// Depth-first search with a "visiting" set for the current path.
    pub fn find_cycle(&self) -> Option<Vec<DependencyKey>> {
        let mut search = CycleSearch {
            graph: self,
            visiting: HashSet::new(),
            checked: HashSet::new(),
            path: Vec::new(),
        };

        self.order.iter().find_map(|key| search.visit(key))
    }
}

struct CycleSearch<'g> {
    graph: &'g DependencyGraph,
    /// Currently on the DFS path
    visiting: HashSet<DependencyKey>,
    /// Fully explored, known cycle-free
    checked: HashSet<DependencyKey>,
    path: Vec<DependencyKey>,
}

impl CycleSearch<'_> {
    fn visit(&mut self, key: &DependencyKey) -> Option<Vec<DependencyKey>> {
        if self.checked.contains(key) {
            return None;
        }

        if self.visiting.contains(key) {
            let start = self.path.iter().position(|k| k == key).unwrap_or(0);
            let mut chain = self.path[start..].to_vec();
            chain.push(*key);
            return Some(chain);
        }

        self.visiting.insert(*key);
        self.path.push(*key);

        let graph = self.graph;
        if let Some(node) = graph.node(key) {
            for dependency in &node.dependencies {
                if let Some(chain) = self.visit(dependency) {
                    return Some(chain);
                }
            }
        }

        self.path.pop();
        self.visiting.remove(key);
        self.checked.insert(*key);
        None
    }
}

/// Hands out graph nodes in dependency order.
///
/// A node becomes ready once every distinct dependency has been marked
/// [`done`](TopologicalSorter::done). Nodes that become ready together are
/// returned in discovery order.
pub(crate) struct TopologicalSorter<'g> {
    graph: &'g DependencyGraph,
    /// Count of distinct dependencies not yet done
    waiting_on: HashMap<DependencyKey, usize>,
    dependents: HashMap<DependencyKey, Vec<DependencyKey>>,
    ready: Vec<DependencyKey>,
    handed_out: HashSet<DependencyKey>,
    finished: HashSet<DependencyKey>,
}

impl<'g> TopologicalSorter<'g> {
    pub fn new(graph: &'g DependencyGraph) -> Self {
        Self {
            graph,
            waiting_on: HashMap::new(),
            dependents: HashMap::new(),
            ready: Vec::new(),
            handed_out: HashSet::new(),
            finished: HashSet::new(),
        }
    }

    /// Checks for cycles and computes the first batch of ready nodes.
    ///
    /// # Errors
    /// [`TarkibError::CircularDependency`] if the graph has a cycle.
    #[instrument(skip(self), name = "graph_ordering")]
    pub fn prepare(&mut self) -> Result<()> {
        if let Some(chain) = self.graph.find_cycle() {
            warn!(cycle = ?chain, "Circular dependency detected!");
            return Err(TarkibError::CircularDependency(CircularDependencyError { chain }));
        }

        for key in self.graph.keys() {
            let mut distinct: Vec<DependencyKey> = Vec::new();
            if let Some(node) = self.graph.node(key) {
                for dependency in &node.dependencies {
                    if !distinct.contains(dependency) {
                        distinct.push(*dependency);
                    }
                }
            }

            for dependency in &distinct {
                self.dependents.entry(*dependency).or_default().push(*key);
            }
            if distinct.is_empty() {
                self.ready.push(*key);
            }
            self.waiting_on.insert(*key, distinct.len());
        }

        debug!(nodes = self.graph.len(), initially_ready = self.ready.len(), "Sorter prepared");
        Ok(())
    }

    /// `true` while some node is ready or handed out but not yet done.
    pub fn is_active(&self) -> bool {
        !self.ready.is_empty() || !self.handed_out.is_empty()
    }

    /// Returns every node that is ready now. Each node is returned once.
    pub fn get_ready(&mut self) -> Vec<DependencyKey> {
        let batch = std::mem::take(&mut self.ready);
        self.handed_out.extend(batch.iter().copied());
        batch
    }

    /// Marks a handed-out node as done, releasing its dependents.
    ///
    /// Returns `false` (and changes nothing) if `key` was not handed out
    /// or is already done.
    pub fn done(&mut self, key: &DependencyKey) -> bool {
        if !self.handed_out.remove(key) {
            warn!(node = %key, "done() for a node that is not in progress");
            return false;
        }
        self.finished.insert(*key);

        if let Some(dependents) = self.dependents.get(key) {
            for dependent in dependents {
                if let Some(count) = self.waiting_on.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        self.ready.push(*dependent);
                    }
                }
            }
        }
        true
    }

    /// Number of nodes marked done so far.
    pub fn finished(&self) -> usize {
        self.finished.len()
    }
}
