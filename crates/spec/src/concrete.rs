//! Concrete specs
//!
//! A concrete spec is an arena of fully bound nodes. Nodes are stored in
//! dependency order with the root last, and a node may only point at
//! nodes stored before it, so the graph is acyclic by construction. A
//! diamond is a single node referenced by several parents.

use crate::format::{self, FormatFields};
use crate::spec::Spec;
use serde::{Deserialize, Serialize};
use spackle_errors::{Error, FormatError, HashError};
use spackle_hash::{CanonicalCompiler, CanonicalDependency, CanonicalNode, Hash};
use spackle_types::{Arch, Compiler, DepTypes, VariantValue, Version, VersionList};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

/// Index of a node within a [`ConcreteSpec`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeIndex(usize);

impl NodeIndex {
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// The bound build parameters of one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeData {
    pub name: String,
    pub version: Version,
    pub variants: BTreeMap<String, VariantValue>,
    pub compiler: Compiler,
    pub arch: Arch,
}

/// A typed edge to a dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcreteEdge {
    pub name: String,
    pub types: DepTypes,
    pub node: NodeIndex,
}

/// A fully bound package in a concrete DAG
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcreteNode {
    #[serde(flatten)]
    pub data: NodeData,
    pub dependencies: Vec<ConcreteEdge>,
    pub hash: Hash,
    /// Capabilities this package was chosen to provide; not hashed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provides: Vec<Spec>,
}

impl ConcreteNode {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.data.name
    }

    /// The node as an exact abstract spec, hash included
    #[must_use]
    pub fn to_spec(&self) -> Spec {
        let mut spec = self.to_exact_spec();
        spec.hash = Some(self.hash.to_hex());
        spec
    }

    /// The node as an exact abstract spec without its hash
    #[must_use]
    pub fn to_exact_spec(&self) -> Spec {
        Spec {
            name: Some(self.data.name.clone()),
            versions: VersionList::exact(self.data.version.clone()),
            variants: self.data.variants.clone(),
            compiler: Some(self.data.compiler.to_spec()),
            arch: self.data.arch.to_spec(),
            hash: None,
            dependencies: BTreeMap::new(),
        }
    }

    pub(crate) fn fields(&self) -> FormatFields {
        FormatFields {
            name: self.data.name.clone(),
            version: self.data.version.to_string(),
            compiler_name: self.data.compiler.name.clone(),
            compiler_version: self.data.compiler.version.to_string(),
            variants: spackle_types::format_variants(&self.data.variants),
            arch: self.data.arch.to_string(),
            hash: Some(self.hash.to_hex()),
        }
    }

    /// Whether the node meets a `^` clause, by its own name or by a
    /// capability it provides
    #[must_use]
    pub fn satisfies_clause(&self, clause: &Spec) -> bool {
        self.to_spec().satisfies_capability(&self.provides, clause)
    }

    /// Render the node with the format mini-language
    ///
    /// # Errors
    ///
    /// Returns a `FormatError` for unknown tokens.
    pub fn format(&self, fmt: &str) -> Result<String, FormatError> {
        format::render(&self.fields(), fmt)
    }
}

/// Incremental construction of a [`ConcreteSpec`], leaves first
#[derive(Debug, Default)]
pub struct ConcreteSpecBuilder {
    nodes: Vec<ConcreteNode>,
    names: HashSet<String>,
}

impl ConcreteSpecBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node whose dependencies are already in the builder
    ///
    /// The node's hash is computed here from its data and its children's
    /// hashes.
    ///
    /// # Errors
    ///
    /// Returns an internal error for a duplicate package name or a
    /// dependency index that is not yet present.
    pub fn add_node(
        &mut self,
        data: NodeData,
        deps: Vec<(NodeIndex, DepTypes)>,
    ) -> Result<NodeIndex, Error> {
        if self.names.contains(&data.name) {
            return Err(Error::internal(format!(
                "package {} appears twice in one concrete spec",
                data.name
            )));
        }

        let mut dependencies = Vec::with_capacity(deps.len());
        for (node, types) in deps {
            let child = self.nodes.get(node.0).ok_or_else(|| {
                Error::internal(format!(
                    "dependency {} of {} added before its target",
                    node.0, data.name
                ))
            })?;
            dependencies.push(ConcreteEdge {
                name: child.data.name.clone(),
                types,
                node,
            });
        }
        dependencies.sort_by(|a, b| a.name.cmp(&b.name));

        let hash = self.canonical(&data, &dependencies).digest()?;
        self.names.insert(data.name.clone());
        self.nodes.push(ConcreteNode {
            data,
            dependencies,
            hash,
            provides: Vec::new(),
        });
        Ok(NodeIndex(self.nodes.len() - 1))
    }

    /// Record the capabilities a node provides
    ///
    /// # Errors
    ///
    /// Returns an internal error if `index` was not added.
    pub fn set_provides(&mut self, index: NodeIndex, provides: Vec<Spec>) -> Result<(), Error> {
        let node = self
            .nodes
            .get_mut(index.0)
            .ok_or_else(|| Error::internal(format!("node {} was never added", index.0)))?;
        node.provides = provides;
        Ok(())
    }

    fn canonical(&self, data: &NodeData, dependencies: &[ConcreteEdge]) -> CanonicalNode {
        CanonicalNode {
            name: data.name.clone(),
            version: data.version.canonical(),
            compiler: CanonicalCompiler {
                name: data.compiler.name.clone(),
                version: data.compiler.version.canonical(),
            },
            arch: data.arch.to_string(),
            variants: data
                .variants
                .iter()
                .map(|(name, value)| (name.clone(), value.canonical()))
                .collect(),
            dependencies: dependencies
                .iter()
                .map(|edge| CanonicalDependency {
                    name: edge.name.clone(),
                    types: edge.types.to_string(),
                    hash: self.nodes[edge.node.0].hash.to_hex(),
                })
                .collect(),
        }
    }

    /// Finish with `root`, keeping only the nodes it reaches
    ///
    /// # Errors
    ///
    /// Returns an internal error if `root` was not added.
    pub fn finish(self, root: NodeIndex) -> Result<ConcreteSpec, Error> {
        if root.0 >= self.nodes.len() {
            return Err(Error::internal(format!("root node {} was never added", root.0)));
        }
        Ok(ConcreteSpec::reachable(&self.nodes, root))
    }
}

/// A fully resolved build DAG
///
/// Deserialization rebuilds the DAG and rejects stored hashes that do not
/// match the contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawConcreteSpec")]
pub struct ConcreteSpec {
    nodes: Vec<ConcreteNode>,
}

/// A concrete spec as read from storage, not yet checked
#[derive(Deserialize)]
struct RawConcreteSpec {
    nodes: Vec<ConcreteNode>,
}

impl TryFrom<RawConcreteSpec> for ConcreteSpec {
    type Error = Error;

    fn try_from(raw: RawConcreteSpec) -> Result<Self, Error> {
        let malformed = |message: String| -> Error { HashError::MalformedDag { message }.into() };
        let Some(root) = raw.nodes.len().checked_sub(1) else {
            return Err(malformed("no nodes".to_string()));
        };

        let mut builder = ConcreteSpecBuilder::new();
        for (i, node) in raw.nodes.into_iter().enumerate() {
            if builder.names.contains(&node.data.name) {
                return Err(malformed(format!("{} appears twice", node.data.name)));
            }
            let mut deps = Vec::with_capacity(node.dependencies.len());
            for edge in &node.dependencies {
                match builder.nodes.get(edge.node.0) {
                    Some(target) if target.data.name == edge.name => {
                        deps.push((edge.node, edge.types));
                    }
                    Some(target) => {
                        return Err(malformed(format!(
                            "edge {} of {} points at {}",
                            edge.name, node.data.name, target.data.name
                        )));
                    }
                    None => {
                        return Err(malformed(format!(
                            "node {i} ({}) depends on later node {}",
                            node.data.name, edge.node.0
                        )));
                    }
                }
            }

            let package = node.data.name.clone();
            let index = builder.add_node(node.data, deps)?;
            let computed = builder.nodes[index.0].hash;
            if computed != node.hash {
                return Err(HashError::Mismatch {
                    package,
                    stored: node.hash.to_hex(),
                    computed: computed.to_hex(),
                }
                .into());
            }
            builder.set_provides(index, node.provides)?;
        }
        builder.finish(NodeIndex(root))
    }
}

impl ConcreteSpec {
    /// Copy the nodes reachable from `root`, renumbering them in order
    fn reachable(nodes: &[ConcreteNode], root: NodeIndex) -> Self {
        let mut keep = vec![false; nodes.len()];
        let mut stack = vec![root.0];
        while let Some(i) = stack.pop() {
            if !keep[i] {
                keep[i] = true;
                stack.extend(nodes[i].dependencies.iter().map(|e| e.node.0));
            }
        }

        // Children always precede parents, so only the root can be last
        let mut remap = HashMap::new();
        let mut kept = Vec::new();
        for (i, node) in nodes.iter().enumerate().take(root.0 + 1) {
            if !keep[i] {
                continue;
            }
            let mut node = node.clone();
            for edge in &mut node.dependencies {
                edge.node = NodeIndex(remap[&edge.node.0]);
            }
            remap.insert(i, kept.len());
            kept.push(node);
        }
        Self { nodes: kept }
    }

    /// The requested package
    #[must_use]
    pub fn root(&self) -> &ConcreteNode {
        // A ConcreteSpec is only built by `finish`, which keeps the root
        &self.nodes[self.nodes.len() - 1]
    }

    /// All nodes, dependencies before dependents
    #[must_use]
    pub fn nodes(&self) -> &[ConcreteNode] {
        &self.nodes
    }

    #[must_use]
    pub fn node(&self, index: NodeIndex) -> &ConcreteNode {
        &self.nodes[index.0]
    }

    #[must_use]
    pub fn node_by_name(&self, name: &str) -> Option<&ConcreteNode> {
        self.nodes.iter().find(|n| n.data.name == name)
    }

    /// The node providing capability `name`, if any
    #[must_use]
    pub fn provider_of(&self, name: &str) -> Option<&ConcreteNode> {
        self.nodes
            .iter()
            .find(|n| n.provides.iter().any(|p| p.name.as_deref() == Some(name)))
    }

    /// The root's DAG hash
    #[must_use]
    pub fn hash(&self) -> Hash {
        self.root().hash
    }

    /// The root's DAG hash as hex, optionally truncated for display
    #[must_use]
    pub fn dag_hash(&self, length: Option<usize>) -> String {
        match length {
            Some(len) => self.root().hash.short(len),
            None => self.root().hash.to_hex(),
        }
    }

    /// The sub-DAG rooted at `index`
    #[must_use]
    pub fn subtree(&self, index: NodeIndex) -> ConcreteSpec {
        Self::reachable(&self.nodes, index)
    }

    /// Depth-first walk from the root, children sorted by name
    ///
    /// Each node is yielded once, at the depth it is first reached.
    #[must_use]
    pub fn traverse(&self) -> Vec<(usize, &ConcreteNode)> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut stack = vec![(0usize, self.nodes.len() - 1)];
        while let Some((depth, i)) = stack.pop() {
            if !seen.insert(i) {
                continue;
            }
            let node = &self.nodes[i];
            out.push((depth, node));
            // Reverse so the alphabetically first child is visited first
            for edge in node.dependencies.iter().rev() {
                stack.push((depth + 1, edge.node.0));
            }
        }
        out
    }

    /// Whether this build matches an abstract query
    ///
    /// The query's own fields are matched against the root, and each of
    /// its `^` clauses against the node of that name anywhere in the DAG.
    #[must_use]
    pub fn satisfies(&self, query: &Spec) -> bool {
        if !self.root().to_spec().satisfies_fields(query, true) {
            return false;
        }
        query.dependencies.iter().all(|(name, dep)| {
            self.node_by_name(name)
                .or_else(|| self.provider_of(name))
                .is_some_and(|node| node.satisfies_clause(dep))
        })
    }

    /// An abstract spec pinning every node, without hashes
    ///
    /// Concretizing the result against the same recipes reproduces this
    /// spec.
    #[must_use]
    pub fn to_abstract(&self) -> Spec {
        let mut spec = self.root().to_exact_spec();
        for (_, node) in self.traverse().into_iter().skip(1) {
            spec.dependencies
                .insert(node.data.name.clone(), node.to_exact_spec());
        }
        spec
    }

    /// Render the root with the format mini-language
    ///
    /// # Errors
    ///
    /// Returns a `FormatError` for unknown tokens.
    pub fn format(&self, fmt: &str) -> Result<String, FormatError> {
        self.root().format(fmt)
    }
}

impl fmt::Display for ConcreteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_abstract())
    }
}
