//! Binding every node of a normalized graph to concrete values
//!
//! Nodes are bound top-down: a node is ready once every parent that
//! reaches it is bound, ties broken by creation order. Binding picks the
//! compiler, architecture, version and variants, checks the catalog's
//! conflict rules and then materializes any rule the concrete values
//! enable. The finished graph is emitted leaves first so hashes are
//! computed bottom-up.

use crate::graph::SpecGraph;
use crate::normalize::{expand, Context};
use crate::providers::ChoiceStack;
use spackle_errors::{ConcretizeError, Error, NormalizeError, SpecPath};
use spackle_spec::{ConcreteSpec, ConcreteSpecBuilder, NodeData, NodeIndex};
use spackle_types::{Arch, Compiler, VariantValue, Version};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

pub(crate) fn concretize(mut graph: SpecGraph, ctx: &Context<'_>) -> Result<ConcreteSpec, Error> {
    let mut choices = ChoiceStack::default();

    loop {
        let Some(idx) = next_ready(&graph)? else {
            break;
        };
        let step = if graph.node(idx).is_virtual {
            choices.choose(&mut graph, ctx, idx)
        } else {
            bind(&mut graph, ctx, idx)
        };
        if let Err(err) = step {
            graph = choices.backtrack(&graph, ctx, err)?;
            debug!(depth = choices.depth(), "resumed after backtracking");
        }
    }

    if let Some(dependency) = graph.unused_requests().next() {
        return Err(NormalizeError::InvalidDependency {
            package: graph.root_name().to_string(),
            dependency: dependency.to_string(),
        }
        .into());
    }
    emit(&graph)
}

/// Lowest-index unbound node whose parents are all bound
fn next_ready(graph: &SpecGraph) -> Result<Option<usize>, Error> {
    let mut pending = false;
    for idx in graph.live() {
        if graph.node(idx).bound.is_some() {
            continue;
        }
        pending = true;
        let parents = graph.parents(idx);
        if parents.iter().all(|&p| graph.node(p).bound.is_some()) {
            return Ok(Some(idx));
        }
    }
    if !pending {
        return Ok(None);
    }
    match graph.find_cycle() {
        Some(cycle) => Err(ConcretizeError::StaticDependencyCycle { cycle }.into()),
        None => Err(Error::internal("unbound nodes remain but none is ready")),
    }
}

fn bind(graph: &mut SpecGraph, ctx: &Context<'_>, idx: usize) -> Result<(), Error> {
    let node = graph.node(idx);
    let name = node.name.clone();
    let path = node.path.clone();
    let inherited = graph
        .parents(idx)
        .into_iter()
        .find_map(|p| graph.node(p).bound.clone());

    let compiler = choose_compiler(graph, ctx, idx, inherited.as_ref(), &path)?;
    let arch = choose_arch(graph, ctx, idx, inherited.as_ref());
    let version = choose_version(graph, ctx, idx, &path)?;
    let variants = choose_variants(graph, ctx, idx, &path)?;

    if let Some(rule) = ctx
        .provider
        .conflicts(&name, &version, &variants, &compiler, &arch)
    {
        return Err(ConcretizeError::CompilerArchConflict {
            package: name,
            compiler: compiler.to_string(),
            arch: arch.to_string(),
            rule,
            path,
        }
        .into());
    }

    debug!(package = %name, version = %version, compiler = %compiler, arch = %arch, "bound node");
    graph.bind(
        idx,
        NodeData {
            name,
            version,
            variants,
            compiler,
            arch,
        },
    );
    expand(graph, ctx)?;
    Ok(())
}

/// The inherited compiler when it fits, else the best configured one
fn choose_compiler(
    graph: &SpecGraph,
    ctx: &Context<'_>,
    idx: usize,
    inherited: Option<&NodeData>,
    path: &SpecPath,
) -> Result<Compiler, Error> {
    let constraint = graph.node(idx).constraint.compiler.as_ref();
    if let Some(parent) = inherited {
        if constraint.map_or(true, |c| c.satisfied_by(&parent.compiler)) {
            return Ok(parent.compiler.clone());
        }
    }

    ctx.prefs
        .best_compiler(constraint)
        .cloned()
        .ok_or_else(|| {
            ConcretizeError::UnavailableCompiler {
                package: graph.node(idx).name.clone(),
                constraint: constraint.map_or_else(|| "any".to_string(), ToString::to_string),
                path: path.clone(),
            }
            .into()
        })
}

/// Fill unset architecture fields from the parent, then the defaults
fn choose_arch(
    graph: &SpecGraph,
    ctx: &Context<'_>,
    idx: usize,
    inherited: Option<&NodeData>,
) -> Arch {
    let wanted = &graph.node(idx).constraint.arch;
    let fallback = inherited.map_or(&ctx.prefs.arch, |parent| &parent.arch);
    Arch::new(
        wanted.platform.clone().unwrap_or_else(|| fallback.platform.clone()),
        wanted.os.clone().unwrap_or_else(|| fallback.os.clone()),
        wanted.target.clone().unwrap_or_else(|| fallback.target.clone()),
    )
}

/// Exact request, else configured preference, else newest known match
fn choose_version(
    graph: &SpecGraph,
    ctx: &Context<'_>,
    idx: usize,
    path: &SpecPath,
) -> Result<Version, Error> {
    let node = graph.node(idx);
    let wanted = &node.constraint.versions;
    if let Some(exact) = wanted.concrete() {
        return Ok(exact.clone());
    }

    let summary = ctx.summary(&node.name)?;
    let preferred = ctx
        .prefs
        .preferred_versions(&node.name)
        .iter()
        .find(|v| wanted.contains(v) && summary.versions.contains(v));
    if let Some(version) = preferred {
        return Ok(version.clone());
    }

    summary
        .versions
        .iter()
        .rev()
        .find(|v| wanted.contains(v))
        .cloned()
        .ok_or_else(|| {
            ConcretizeError::NoVersionSatisfiesConstraint {
                package: node.name.clone(),
                constraint: wanted.to_string(),
                known: summary
                    .versions
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
                path: path.clone(),
            }
            .into()
        })
}

/// Validate explicit values and fill the rest from preferences or defaults
fn choose_variants(
    graph: &SpecGraph,
    ctx: &Context<'_>,
    idx: usize,
    path: &SpecPath,
) -> Result<BTreeMap<String, VariantValue>, Error> {
    let node = graph.node(idx);
    let summary = ctx.summary(&node.name)?;
    let not_allowed = |variant: &str, value: &VariantValue, reason: String| -> Error {
        ConcretizeError::VariantValueNotAllowed {
            package: node.name.clone(),
            variant: variant.to_string(),
            value: value.to_string(),
            reason,
            path: path.clone(),
        }
        .into()
    };

    let mut chosen = BTreeMap::new();
    for (variant, value) in &node.constraint.variants {
        let Some(decl) = summary.variants.get(variant) else {
            return Err(ConcretizeError::UnknownVariant {
                package: node.name.clone(),
                variant: variant.clone(),
                path: path.clone(),
            }
            .into());
        };
        let valid = decl
            .validate(value)
            .map_err(|reason| not_allowed(variant, value, reason))?;
        chosen.insert(variant.clone(), valid);
    }

    for (variant, decl) in &summary.variants {
        if chosen.contains_key(variant) {
            continue;
        }
        let value = ctx
            .prefs
            .preferred_variant(&node.name, variant)
            .unwrap_or(&decl.default);
        let valid = decl
            .validate(value)
            .map_err(|reason| not_allowed(variant, value, reason))?;
        chosen.insert(variant.clone(), valid);
    }
    Ok(chosen)
}

/// Build the concrete spec leaves first
fn emit(graph: &SpecGraph) -> Result<ConcreteSpec, Error> {
    fn visit(
        graph: &SpecGraph,
        idx: usize,
        builder: &mut ConcreteSpecBuilder,
        emitted: &mut HashMap<usize, NodeIndex>,
    ) -> Result<NodeIndex, Error> {
        if let Some(&done) = emitted.get(&idx) {
            return Ok(done);
        }
        let node = graph.node(idx);
        let mut edges: Vec<_> = node.edges.iter().collect();
        edges.sort_by(|a, b| graph.node(a.child).name.cmp(&graph.node(b.child).name));

        let mut deps = Vec::with_capacity(edges.len());
        for edge in edges {
            deps.push((visit(graph, edge.child, builder, emitted)?, edge.types));
        }
        let data = node
            .bound
            .clone()
            .ok_or_else(|| Error::internal(format!("{} was never bound", node.name)))?;
        let index = builder.add_node(data, deps)?;
        if !node.provides.is_empty() {
            builder.set_provides(index, node.provides.clone())?;
        }
        emitted.insert(idx, index);
        Ok(index)
    }

    let mut builder = ConcreteSpecBuilder::new();
    let mut emitted = HashMap::new();
    let root = visit(graph, graph.root_index(), &mut builder, &mut emitted)?;
    builder.finish(root)
}
