//! Working graph shared by normalization and concretization
//!
//! The graph holds one node per package name. Nodes are never removed:
//! a virtual placeholder that has been replaced by its provider stays in
//! the arena with `replaced_by` set, so indices remain stable across
//! snapshots.

use spackle_errors::{ConcretizeError, Error, NormalizeError, ParseError, SpecPath};
use spackle_spec::{NodeData, Spec};
use spackle_types::{DepTypes, VersionList};
use std::collections::{BTreeMap, BTreeSet};

/// Edge from a dependent to one of its dependencies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkEdge {
    pub child: usize,
    pub types: DepTypes,
}

/// A package (or capability) under resolution
#[derive(Debug, Clone)]
pub struct WorkNode {
    pub name: String,
    /// Accumulated constraint; the exact spec once bound
    pub constraint: Spec,
    pub is_virtual: bool,
    /// Path by which the node was first reached
    pub path: SpecPath,
    /// Every constraint merged into the node and where it came from
    pub origins: Vec<(SpecPath, Spec)>,
    pub edges: Vec<WorkEdge>,
    /// Dependency rules already materialized, by rule index
    pub applied: BTreeSet<usize>,
    pub bound: Option<NodeData>,
    /// Capabilities this node was chosen to provide
    pub provides: Vec<Spec>,
    pub replaced_by: Option<usize>,
}

impl WorkNode {
    fn new(name: &str, path: SpecPath, is_virtual: bool) -> Self {
        Self {
            name: name.to_string(),
            constraint: Spec::new(name),
            is_virtual,
            path,
            origins: Vec::new(),
            edges: Vec::new(),
            applied: BTreeSet::new(),
            bound: None,
            provides: Vec::new(),
            replaced_by: None,
        }
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.replaced_by.is_none()
    }
}

/// Arena of work nodes for one request
#[derive(Debug, Clone)]
pub struct SpecGraph {
    nodes: Vec<WorkNode>,
    by_name: BTreeMap<String, usize>,
    root: usize,
    root_name: String,
    /// `^` clauses of the request, applied when the named node appears
    requested: BTreeMap<String, Spec>,
    used: BTreeSet<String>,
}

impl SpecGraph {
    /// Start a graph from a request
    ///
    /// # Errors
    ///
    /// Returns a parse error for an anonymous request and
    /// `NormalizeError::HashReference` when any clause names a hash.
    pub fn from_request(request: &Spec, root_is_virtual: bool) -> Result<Self, Error> {
        let Some(name) = request.name.clone() else {
            return Err(ParseError::new(
                "a request must name a package",
                request.to_string(),
                0,
            )
            .into());
        };

        let hashed = std::iter::once(request).chain(request.dependencies.values());
        if let Some(prefix) = hashed.filter_map(|s| s.hash.as_ref()).next() {
            return Err(NormalizeError::HashReference {
                prefix: prefix.clone(),
            }
            .into());
        }

        let mut graph = Self {
            nodes: Vec::new(),
            by_name: BTreeMap::new(),
            root: 0,
            root_name: name.clone(),
            requested: request.dependencies.clone(),
            used: BTreeSet::new(),
        };
        let root = graph.add_node(&name, SpecPath::root(&name), root_is_virtual)?;
        graph.constrain_node(root, &request.without_dependencies(), &SpecPath::root(&name))?;
        graph.root = root;
        Ok(graph)
    }

    /// Add a node, applying any `^` clause of the request that names it
    ///
    /// # Errors
    ///
    /// Returns `ConcretizeError::DiamondConflict` if the requested clause
    /// cannot be merged.
    pub(crate) fn add_node(
        &mut self,
        name: &str,
        path: SpecPath,
        is_virtual: bool,
    ) -> Result<usize, Error> {
        let idx = self.nodes.len();
        self.nodes.push(WorkNode::new(name, path, is_virtual));
        self.by_name.insert(name.to_string(), idx);

        if let Some(clause) = self.requested.get(name).cloned() {
            self.used.insert(name.to_string());
            let origin = SpecPath::root(&self.root_name).child(format!("^{name}"));
            self.constrain_node(idx, &clause, &origin)?;
        }
        Ok(idx)
    }

    /// Merge `spec` into a node
    ///
    /// A bound node only accepts constraints it already satisfies.
    ///
    /// # Errors
    ///
    /// Returns `ConcretizeError::DiamondConflict` naming the earliest
    /// contributor that disagrees with `spec`.
    pub(crate) fn constrain_node(
        &mut self,
        idx: usize,
        spec: &Spec,
        path: &SpecPath,
    ) -> Result<bool, Error> {
        let node = &mut self.nodes[idx];
        let mut next = node.constraint.clone();
        let changed = next.constrain(spec).map_err(|conflict| {
            let first = node
                .origins
                .iter()
                .find(|(_, earlier)| !earlier.intersects(spec))
                .map_or_else(|| node.path.clone(), |(origin, _)| origin.clone());
            ConcretizeError::DiamondConflict {
                package: node.name.clone(),
                first,
                second: path.clone(),
                reason: conflict.to_string(),
            }
        })?;

        if changed && node.bound.is_some() {
            return Err(ConcretizeError::DiamondConflict {
                package: node.name.clone(),
                first: node.path.clone(),
                second: path.clone(),
                reason: format!("{} was already fixed before {spec} was required", node.constraint),
            }
            .into());
        }

        node.constraint = next;
        node.origins.push((path.clone(), spec.clone()));
        Ok(changed)
    }

    /// Add or widen the edge `parent -> child`
    pub(crate) fn add_edge(&mut self, parent: usize, child: usize, types: DepTypes) -> bool {
        let edges = &mut self.nodes[parent].edges;
        match edges.iter_mut().find(|e| e.child == child) {
            Some(edge) => {
                let merged = edge.types | types;
                let changed = merged != edge.types;
                edge.types = merged;
                changed
            }
            None => {
                edges.push(WorkEdge { child, types });
                true
            }
        }
    }

    /// Replace a virtual placeholder by its provider
    pub(crate) fn redirect(&mut self, from: usize, to: usize) {
        let mut moved = Vec::new();
        for (idx, node) in self.nodes.iter_mut().enumerate() {
            if !node.is_live() {
                continue;
            }
            node.edges.retain(|edge| {
                if edge.child == from {
                    moved.push((idx, edge.types));
                    false
                } else {
                    true
                }
            });
        }
        for (parent, types) in moved {
            self.add_edge(parent, to, types);
        }

        let capability = self.nodes[from].name.clone();
        self.nodes[from].replaced_by = Some(to);
        self.by_name.insert(capability, to);
        if self.root == from {
            self.root = to;
        }
    }

    /// Record the concrete values of a node
    pub(crate) fn bind(&mut self, idx: usize, data: NodeData) {
        let node = &mut self.nodes[idx];
        node.constraint = exact_spec(&data);
        node.bound = Some(data);
    }

    /// Whether a rule predicate holds for a node
    ///
    /// `^name` clauses of the predicate are checked against the node of
    /// that name in the graph, or against its provider once a virtual has
    /// been replaced.
    pub(crate) fn when_holds(&self, idx: usize, when: &Spec) -> bool {
        self.nodes[idx].constraint.satisfies_fields(when, true)
            && when.dependencies.iter().all(|(name, clause)| {
                self.lookup(name).is_some_and(|i| {
                    let node = &self.nodes[i];
                    node.constraint.satisfies_capability(&node.provides, clause)
                })
            })
    }

    /// First cycle reachable from the root, as a closed path of names
    pub(crate) fn find_cycle(&self) -> Option<SpecPath> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            Open,
            Done,
        }

        fn visit(
            graph: &SpecGraph,
            idx: usize,
            marks: &mut [Mark],
            stack: &mut Vec<usize>,
        ) -> Option<SpecPath> {
            marks[idx] = Mark::Open;
            stack.push(idx);
            for edge in &graph.nodes[idx].edges {
                match marks[edge.child] {
                    Mark::Open => {
                        let start = stack.iter().position(|&i| i == edge.child).unwrap_or(0);
                        let mut names: Vec<String> =
                            stack[start..].iter().map(|&i| graph.nodes[i].name.clone()).collect();
                        names.push(graph.nodes[edge.child].name.clone());
                        return Some(SpecPath(names));
                    }
                    Mark::New => {
                        if let Some(cycle) = visit(graph, edge.child, marks, stack) {
                            return Some(cycle);
                        }
                    }
                    Mark::Done => {}
                }
            }
            stack.pop();
            marks[idx] = Mark::Done;
            None
        }

        let mut marks = vec![Mark::New; self.nodes.len()];
        visit(self, self.root, &mut marks, &mut Vec::new())
    }

    /// Live nodes with an edge to `idx`, in creation order
    pub(crate) fn parents(&self, idx: usize) -> Vec<usize> {
        self.live()
            .filter(|&i| self.nodes[i].edges.iter().any(|e| e.child == idx))
            .collect()
    }

    /// Indices of nodes not replaced by a provider
    pub(crate) fn live(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.nodes.len()).filter(|&i| self.nodes[i].is_live())
    }

    pub(crate) fn node(&self, idx: usize) -> &WorkNode {
        &self.nodes[idx]
    }

    pub(crate) fn node_mut(&mut self, idx: usize) -> &mut WorkNode {
        &mut self.nodes[idx]
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn root_index(&self) -> usize {
        self.root
    }

    pub(crate) fn root_name(&self) -> &str {
        &self.root_name
    }

    pub(crate) fn requested(&self) -> &BTreeMap<String, Spec> {
        &self.requested
    }

    /// Requested `^` clauses no node has claimed
    pub(crate) fn unused_requests(&self) -> impl Iterator<Item = &str> {
        self.requested
            .keys()
            .filter(|name| !self.used.contains(*name))
            .map(String::as_str)
    }

    /// Node standing for `name`, following provider substitution
    pub(crate) fn lookup(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Current constraint on the node named `name`
    #[must_use]
    pub fn constraint(&self, name: &str) -> Option<&Spec> {
        self.lookup(name).map(|i| &self.nodes[i].constraint)
    }

    /// Names of live packages and placeholders, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.live().map(|i| self.nodes[i].name.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Whether `name` is still an unresolved virtual placeholder
    #[must_use]
    pub fn is_placeholder(&self, name: &str) -> bool {
        self.lookup(name)
            .is_some_and(|i| self.nodes[i].is_virtual && self.nodes[i].name == name)
    }

    /// Edge types of `parent -> child`, if the edge exists
    #[must_use]
    pub fn edge(&self, parent: &str, child: &str) -> Option<DepTypes> {
        let parent = self.lookup(parent)?;
        let child = self.lookup(child)?;
        self.nodes[parent]
            .edges
            .iter()
            .find(|e| e.child == child)
            .map(|e| e.types)
    }

    /// The graph as one abstract spec with a flat `^` clause per node
    #[must_use]
    pub fn to_spec(&self) -> Spec {
        let mut spec = self.nodes[self.root].constraint.clone();
        for idx in self.live().filter(|&i| i != self.root) {
            let node = &self.nodes[idx];
            spec.dependencies.insert(node.name.clone(), node.constraint.clone());
        }
        spec
    }
}

/// Spec matching exactly one set of concrete values
pub(crate) fn exact_spec(data: &NodeData) -> Spec {
    let mut spec = Spec::new(data.name.clone())
        .with_versions(VersionList::exact(data.version.clone()))
        .with_compiler(data.compiler.to_spec());
    spec.variants.clone_from(&data.variants);
    spec.arch = data.arch.to_spec();
    spec
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(text: &str) -> SpecGraph {
        SpecGraph::from_request(&Spec::parse(text).unwrap(), false).unwrap()
    }

    #[test]
    fn test_requested_clause_applied_on_creation() {
        let mut g = graph("hdf5 ^zlib@1.2.11");
        assert_eq!(g.unused_requests().collect::<Vec<_>>(), ["zlib"]);

        let zlib = g.add_node("zlib", SpecPath::root("hdf5").child("zlib"), false).unwrap();
        assert_eq!(g.node(zlib).constraint.to_string(), "zlib@1.2.11");
        assert_eq!(g.unused_requests().count(), 0);
    }

    #[test]
    fn test_diamond_names_both_paths() {
        let mut g = graph("app");
        let c = g.add_node("c", SpecPath::root("app").child("a").child("c"), false).unwrap();
        let via_a = SpecPath::root("app").child("a").child("c");
        let via_b = SpecPath::root("app").child("b").child("c");

        g.constrain_node(c, &Spec::parse("c@2.0").unwrap(), &via_a).unwrap();
        let err = g
            .constrain_node(c, &Spec::parse("c@1.0").unwrap(), &via_b)
            .unwrap_err();
        match err {
            Error::Concretize(ConcretizeError::DiamondConflict { first, second, .. }) => {
                assert_eq!(first, via_a);
                assert_eq!(second, via_b);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(g.node(c).constraint.to_string(), "c@2.0");
    }

    #[test]
    fn test_cycle_detection() {
        let mut g = graph("a");
        let b = g.add_node("b", SpecPath::root("a").child("b"), false).unwrap();
        g.add_edge(0, b, DepTypes::default());
        assert!(g.find_cycle().is_none());

        g.add_edge(b, 0, DepTypes::default());
        assert_eq!(g.find_cycle().unwrap().to_string(), "a -> b -> a");
    }

    #[test]
    fn test_redirect_merges_edges() {
        let mut g = graph("app");
        let mpi = g.add_node("mpi", SpecPath::root("app").child("mpi"), true).unwrap();
        let openmpi = g.add_node("openmpi", SpecPath::root("app").child("openmpi"), false).unwrap();
        g.add_edge(0, mpi, DepTypes::LINK);
        g.add_edge(0, openmpi, DepTypes::BUILD);

        g.redirect(mpi, openmpi);
        assert_eq!(g.node(0).edges.len(), 1);
        assert_eq!(g.edge("app", "mpi"), Some(DepTypes::BUILD | DepTypes::LINK));
        assert!(!g.is_placeholder("mpi"));
        assert_eq!(g.names(), ["app", "openmpi"]);
    }

    #[test]
    fn test_when_clause_sees_through_provider() {
        let mut g = graph("app");
        let mpi = g.add_node("mpi", SpecPath::root("app").child("mpi"), true).unwrap();
        let mpich = g.add_node("mpich", SpecPath::root("app").child("mpich"), false).unwrap();
        g.add_edge(0, mpi, DepTypes::LINK);

        let when = Spec::parse("^mpi@3:").unwrap();
        assert!(!g.when_holds(0, &when));

        g.node_mut(mpich).provides.push(Spec::parse("mpi@:4").unwrap());
        g.redirect(mpi, mpich);
        assert!(g.when_holds(0, &when));
        assert!(!g.when_holds(0, &Spec::parse("^mpi@5:").unwrap()));
        assert!(g.when_holds(0, &Spec::parse("^mpich").unwrap()));
    }

    #[test]
    fn test_hash_reference_rejected() {
        let err = SpecGraph::from_request(&Spec::parse("zlib /abcdef1").unwrap(), false).unwrap_err();
        assert!(matches!(err, Error::Normalize(NormalizeError::HashReference { .. })));
    }
}
