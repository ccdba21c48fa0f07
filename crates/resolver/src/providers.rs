//! Virtual provider selection with explicit choice points
//!
//! Every provider decision pushes a [`ChoicePoint`] holding a snapshot of
//! the graph taken before the decision. A later failure is traced back to
//! the newest choice point whose provider reaches the failing package;
//! that point restores its snapshot and tries its next candidate, and any
//! newer points are dropped. A failure no choice point reaches is reported
//! as it is. A choice point that runs out of candidates turns into
//! `NoProviderAvailable`, which is in turn traced back the same way.

use crate::graph::SpecGraph;
use crate::normalize::{expand, Context};
use spackle_errors::{ConcretizeError, Error, NormalizeError, RejectedProvider, SpecPath};
use spackle_repository::ProviderRule;
use std::cmp::Reverse;
use std::collections::{BTreeSet, VecDeque};
use tracing::debug;

/// A provider decision that can be revisited
#[derive(Debug)]
pub(crate) struct ChoicePoint {
    snapshot: SpecGraph,
    placeholder: usize,
    capability: String,
    path: SpecPath,
    current: Option<String>,
    /// Nodes the current provider added or changed when applied
    touched: BTreeSet<String>,
    remaining: VecDeque<ProviderRule>,
    rejected: Vec<RejectedProvider>,
}

impl ChoicePoint {
    /// Apply the next candidate that expands cleanly
    ///
    /// Returns `Ok(None)` once every candidate has been rejected.
    fn advance(&mut self, ctx: &Context<'_>) -> Result<Option<SpecGraph>, Error> {
        while let Some(rule) = self.remaining.pop_front() {
            let mut graph = self.snapshot.clone();
            match apply_provider(&mut graph, ctx, self.placeholder, &rule) {
                Ok(()) => {
                    self.touched = touched(&self.snapshot, &graph);
                    self.current = Some(rule.package);
                    return Ok(Some(graph));
                }
                Err(e @ Error::Concretize(_)) => {
                    debug!(capability = %self.capability, provider = %rule.package, error = %e, "provider rejected");
                    self.rejected.push(RejectedProvider {
                        provider: rule.package,
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    /// Whether the current provider reaches any of `culprits` in `graph`
    fn reaches(&self, graph: &SpecGraph, culprits: &BTreeSet<String>) -> bool {
        if self.current.is_none() {
            return false;
        }
        if culprits.iter().any(|name| self.touched.contains(name)) {
            return true;
        }
        let Some(provider) = graph.lookup(&self.capability) else {
            return false;
        };
        let mut seen = BTreeSet::new();
        let mut stack = vec![provider];
        while let Some(idx) = stack.pop() {
            if !seen.insert(idx) {
                continue;
            }
            let node = graph.node(idx);
            if culprits.contains(&node.name) {
                return true;
            }
            stack.extend(node.edges.iter().map(|edge| edge.child));
        }
        false
    }

    fn exhausted(self) -> Error {
        ConcretizeError::NoProviderAvailable {
            capability: self.capability,
            path: self.path,
            rejected: self.rejected,
        }
        .into()
    }
}

/// Stack of open provider decisions, newest last
#[derive(Debug, Default)]
pub(crate) struct ChoiceStack {
    points: Vec<ChoicePoint>,
}

impl ChoiceStack {
    pub fn depth(&self) -> usize {
        self.points.len()
    }

    /// Open a choice point for a placeholder with the first candidate that
    /// expands cleanly
    ///
    /// When every candidate is rejected no point is pushed and the error is
    /// `NoProviderAvailable` listing each rejection.
    pub fn choose(
        &mut self,
        graph: &mut SpecGraph,
        ctx: &Context<'_>,
        placeholder: usize,
    ) -> Result<(), Error> {
        let node = graph.node(placeholder);
        let (remaining, rejected) = candidates(graph, ctx, placeholder);
        let mut point = ChoicePoint {
            snapshot: graph.clone(),
            placeholder,
            capability: node.name.clone(),
            path: node.path.clone(),
            current: None,
            touched: BTreeSet::new(),
            remaining,
            rejected,
        };

        match point.advance(ctx)? {
            Some(next) => {
                *graph = next;
                self.points.push(point);
                Ok(())
            }
            None => Err(point.exhausted()),
        }
    }

    /// Recover from `err`, raised while working on `graph`
    ///
    /// Returns the graph to continue from, or the error to report when no
    /// choice point reaches the failure or none has an alternative left.
    /// Only concretization failures are retried.
    pub fn backtrack(
        &mut self,
        graph: &SpecGraph,
        ctx: &Context<'_>,
        mut err: Error,
    ) -> Result<SpecGraph, Error> {
        let mut failing = graph.clone();
        loop {
            let Error::Concretize(failure) = &err else {
                return Err(err);
            };
            let blamed = culprits(failure);
            let Some(at) = self
                .points
                .iter()
                .rposition(|point| point.reaches(&failing, &blamed))
            else {
                return Err(err);
            };
            self.points.truncate(at + 1);

            let Some(point) = self.points.last_mut() else {
                return Err(err);
            };
            if let Some(tried) = point.current.take() {
                debug!(capability = %point.capability, provider = %tried, error = %err, "provider rejected");
                point.rejected.push(RejectedProvider {
                    provider: tried,
                    reason: err.to_string(),
                });
            }
            if let Some(next) = point.advance(ctx)? {
                return Ok(next);
            }

            let Some(exhausted) = self.points.pop() else {
                return Err(err);
            };
            failing = exhausted.snapshot.clone();
            err = exhausted.exhausted();
        }
    }
}

/// Names of the packages a failure is attributed to
fn culprits(err: &ConcretizeError) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    match err {
        ConcretizeError::NoVersionSatisfiesConstraint { package, .. }
        | ConcretizeError::VariantValueNotAllowed { package, .. }
        | ConcretizeError::UnknownVariant { package, .. }
        | ConcretizeError::CompilerArchConflict { package, .. }
        | ConcretizeError::UnavailableCompiler { package, .. } => {
            names.insert(package.clone());
        }
        ConcretizeError::DiamondConflict {
            package,
            first,
            second,
            ..
        } => {
            names.insert(package.clone());
            names.extend(first.0.iter().cloned());
            names.extend(second.0.iter().cloned());
        }
        ConcretizeError::NoProviderAvailable { capability, .. } => {
            names.insert(capability.clone());
        }
        ConcretizeError::StaticDependencyCycle { cycle } => {
            names.extend(cycle.0.iter().cloned());
        }
        _ => names.extend(err.path().leaf().map(str::to_string)),
    }
    names
}

/// Nodes that are new in `after` or whose constraint changed
fn touched(before: &SpecGraph, after: &SpecGraph) -> BTreeSet<String> {
    (0..after.len())
        .filter(|&idx| idx >= before.len() || before.node(idx).constraint != after.node(idx).constraint)
        .map(|idx| after.node(idx).name.clone())
        .collect()
}

/// Providers to try for a placeholder, best first, plus those ruled out
/// up front
///
/// A provider named by a `^` clause of the request is the only candidate.
/// Otherwise providers already in the graph come first, then the
/// configured preference order, then the rest by name. Several rules of
/// one package are tried newest admitted version first.
fn candidates(
    graph: &SpecGraph,
    ctx: &Context<'_>,
    placeholder: usize,
) -> (VecDeque<ProviderRule>, Vec<RejectedProvider>) {
    let node = graph.node(placeholder);
    let mut rejected = Vec::new();
    let mut matching = Vec::new();

    for rule in ctx.provider.providers_of(&node.name) {
        if rule.provides.versions.intersects(&node.constraint.versions) {
            matching.push(rule);
        } else {
            rejected.push(RejectedProvider {
                reason: format!("provides {} but {} is required", rule.provides, node.constraint),
                provider: rule.package,
            });
        }
    }

    if matching
        .iter()
        .any(|r| graph.requested().contains_key(&r.package))
    {
        matching.retain(|r| graph.requested().contains_key(&r.package));
    }

    // Within one package, the rule admitting its newest version goes first
    matching.sort_by_cached_key(|rule| {
        let present = graph
            .lookup(&rule.package)
            .is_some_and(|i| graph.node(i).name == rule.package);
        let newest = ctx.summary(&rule.package).ok().and_then(|summary| {
            summary
                .versions
                .iter()
                .rev()
                .find(|v| rule.when.versions.contains(v))
                .cloned()
        });
        (
            !present,
            ctx.prefs.provider_rank(&node.name, &rule.package),
            rule.package.clone(),
            Reverse(newest),
        )
    });
    (matching.into(), rejected)
}

/// Substitute `rule.package` for the placeholder and expand its rules
fn apply_provider(
    graph: &mut SpecGraph,
    ctx: &Context<'_>,
    placeholder: usize,
    rule: &ProviderRule,
) -> Result<(), Error> {
    debug!(capability = %graph.node(placeholder).name, provider = %rule.package, "trying provider");

    let mut hops = graph.node(placeholder).path.0.clone();
    hops.pop();
    let path = SpecPath(hops).child(&rule.package);

    let target = match graph.lookup(&rule.package) {
        Some(idx) => idx,
        None => {
            if !ctx.provider.exists(&rule.package) {
                return Err(NormalizeError::UnknownPackage {
                    name: rule.package.clone(),
                    path,
                }
                .into());
            }
            graph.add_node(&rule.package, path.clone(), false)?
        }
    };

    graph.constrain_node(target, &rule.when, &path)?;
    graph.node_mut(target).provides.push(rule.provides.clone());
    graph.redirect(placeholder, target);
    expand(graph, ctx)?;
    Ok(())
}
