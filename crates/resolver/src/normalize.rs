//! Expansion of a request into the full set of packages it needs
//!
//! Dependency rules are materialized once their `when` predicate is
//! strictly satisfied by what is currently known about a node. The loop
//! runs until no further rule applies.

use crate::cache::{RecipeSummary, SessionCache};
use crate::graph::SpecGraph;
use crate::preferences::Preferences;
use spackle_errors::{ConcretizeError, Error, NormalizeError, SpecPath};
use spackle_repository::{DependencyRule, RecipeProvider};
use spackle_spec::Spec;
use std::sync::Arc;
use tracing::trace;

/// Collaborators consulted during one resolution
pub(crate) struct Context<'a> {
    pub provider: &'a dyn RecipeProvider,
    pub prefs: &'a Preferences,
    pub cache: &'a SessionCache,
}

impl Context<'_> {
    pub fn summary(&self, name: &str) -> Result<Arc<RecipeSummary>, Error> {
        self.cache.summary(self.provider, name)
    }
}

/// Materialize every applicable rule until nothing changes
///
/// Returns whether the graph changed.
pub(crate) fn expand(graph: &mut SpecGraph, ctx: &Context<'_>) -> Result<bool, Error> {
    let mut changed = false;
    loop {
        let mut progress = false;
        // Nodes added during the pass are visited in the same pass
        let mut idx = 0;
        while idx < graph.len() {
            if graph.node(idx).is_live() && !graph.node(idx).is_virtual {
                progress |= expand_node(graph, ctx, idx)?;
            }
            idx += 1;
        }
        if !progress {
            break;
        }
        changed = true;
    }

    if let Some(cycle) = graph.find_cycle() {
        return Err(ConcretizeError::StaticDependencyCycle { cycle }.into());
    }
    Ok(changed)
}

fn expand_node(graph: &mut SpecGraph, ctx: &Context<'_>, idx: usize) -> Result<bool, Error> {
    let summary = ctx.summary(&graph.node(idx).name)?;
    let is_root = idx == graph.root_index();
    let mut progress = false;

    for (rule_idx, rule) in summary.rules.iter().enumerate() {
        if graph.node(idx).applied.contains(&rule_idx) {
            continue;
        }
        if rule.types.is_test_only() && !ctx.prefs.wants_tests(is_root) {
            continue;
        }
        if !graph.when_holds(idx, &rule.when) {
            continue;
        }

        graph.node_mut(idx).applied.insert(rule_idx);
        materialize(graph, ctx, idx, rule)?;
        progress = true;
    }
    Ok(progress)
}

fn materialize(
    graph: &mut SpecGraph,
    ctx: &Context<'_>,
    parent: usize,
    rule: &DependencyRule,
) -> Result<(), Error> {
    let name = rule.name();
    let path = graph.node(parent).path.child(name);
    trace!(parent = %graph.node(parent).name, dependency = %rule.spec, "materializing rule");

    let child = match graph.lookup(name) {
        Some(idx) => idx,
        None => {
            if !ctx.provider.exists(name) {
                return Err(NormalizeError::UnknownPackage {
                    name: name.to_string(),
                    path,
                }
                .into());
            }
            graph.add_node(name, path.clone(), ctx.provider.is_virtual(name))?
        }
    };

    let clause = rule.spec.without_dependencies();
    if graph.node(child).name == name {
        graph.constrain_node(child, &clause, &path)?;
    } else {
        // The capability already resolved to a provider
        check_provided(graph, child, &clause, &path)?;
    }
    graph.add_edge(parent, child, rule.types);
    Ok(())
}

/// A later request for a capability must fit what its provider provides
fn check_provided(
    graph: &SpecGraph,
    provider: usize,
    clause: &Spec,
    path: &SpecPath,
) -> Result<(), Error> {
    let node = graph.node(provider);
    let fits = node
        .provides
        .iter()
        .filter(|p| p.name == clause.name)
        .any(|p| p.versions.intersects(&clause.versions));
    if fits {
        return Ok(());
    }
    Err(ConcretizeError::DiamondConflict {
        package: clause.name_or_empty().to_string(),
        first: node.path.clone(),
        second: path.clone(),
        reason: format!("{} was chosen as provider but {clause} is required", node.name),
    }
    .into())
}
