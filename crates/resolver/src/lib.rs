#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Dependency resolution for spackle
//!
//! This crate turns abstract requests into concrete build DAGs. A request
//! is first normalized (every applicable dependency rule materialized,
//! one node per package) and then concretized (each node bound to a
//! version, compiler, architecture and variant values, with virtual
//! dependencies resolved by backtracking over their providers).

mod cache;
mod concretize;
mod graph;
mod normalize;
mod preferences;
mod providers;

pub use cache::{RecipeSummary, SessionCache};
pub use graph::SpecGraph;
pub use preferences::Preferences;

use normalize::Context;
use spackle_config::Config;
use spackle_errors::{Error, NormalizeError, SpecPath};
use spackle_repository::RecipeProvider;
use spackle_spec::{ConcreteSpec, Spec};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::debug;

/// Dependency resolver
///
/// Cheap to clone; clones share the catalog, preferences and cache.
#[derive(Clone)]
pub struct Resolver {
    provider: Arc<dyn RecipeProvider>,
    prefs: Arc<Preferences>,
    cache: Arc<SessionCache>,
}

impl Resolver {
    /// Create new resolver over a recipe catalog
    #[must_use]
    pub fn new(provider: Arc<dyn RecipeProvider>, prefs: Preferences) -> Self {
        Self {
            provider,
            prefs: Arc::new(prefs),
            cache: Arc::new(SessionCache::new()),
        }
    }

    /// Create a resolver using the preferences of a configuration
    ///
    /// # Errors
    ///
    /// Returns a configuration error for values that do not parse.
    pub fn from_config(provider: Arc<dyn RecipeProvider>, config: &Config) -> Result<Self, Error> {
        Ok(Self::new(provider, Preferences::from_config(config)?))
    }

    /// Share an existing session cache
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<SessionCache>) -> Self {
        self.cache = cache;
        self
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<SessionCache> {
        &self.cache
    }

    #[must_use]
    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    fn context(&self) -> Context<'_> {
        Context {
            provider: self.provider.as_ref(),
            prefs: &self.prefs,
            cache: &self.cache,
        }
    }

    fn start(&self, request: &Spec) -> Result<SpecGraph, Error> {
        let is_virtual = request
            .name
            .as_deref()
            .is_some_and(|name| self.provider.is_virtual(name));
        let graph = SpecGraph::from_request(request, is_virtual)?;

        let root = graph.root_name();
        if !self.provider.exists(root) {
            return Err(NormalizeError::UnknownPackage {
                name: root.to_string(),
                path: SpecPath::root(root),
            }
            .into());
        }
        Ok(graph)
    }

    /// Expand a request into its normalized graph
    ///
    /// # Errors
    ///
    /// Returns `NormalizeError::UnknownPackage` for names without a recipe,
    /// `ConcretizeError::DiamondConflict` when two rules disagree about a
    /// package, and `ConcretizeError::StaticDependencyCycle` for cyclic
    /// rules.
    pub fn normalize(&self, request: &Spec) -> Result<SpecGraph, Error> {
        let mut graph = self.start(request)?;
        self.normalize_graph(&mut graph)?;
        Ok(graph)
    }

    /// Normalize an existing graph in place, returning whether it changed
    ///
    /// # Errors
    ///
    /// Same as [`Resolver::normalize`].
    pub fn normalize_graph(&self, graph: &mut SpecGraph) -> Result<bool, Error> {
        normalize::expand(graph, &self.context())
    }

    /// Resolve a request to a concrete DAG
    ///
    /// The result is interned in the session cache, so equal DAGs share
    /// one allocation.
    ///
    /// # Errors
    ///
    /// Returns the first normalization or concretization failure; there
    /// is no partial result.
    pub fn concretize(&self, request: &Spec) -> Result<Arc<ConcreteSpec>, Error> {
        debug!(request = %request, "concretizing");
        let graph = self.normalize(request)?;
        let concrete = concretize::concretize(graph, &self.context())?;
        debug!(request = %request, hash = %concrete.dag_hash(Some(7)), "concretized");
        Ok(self.cache.intern(concrete))
    }

    /// Resolve independent requests in parallel on the blocking pool
    ///
    /// Results are in request order.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing request in request order.
    pub async fn concretize_all(&self, requests: Vec<Spec>) -> Result<Vec<Arc<ConcreteSpec>>, Error> {
        let count = requests.len();
        let mut tasks = JoinSet::new();
        for (i, request) in requests.into_iter().enumerate() {
            let resolver = self.clone();
            tasks.spawn_blocking(move || (i, resolver.concretize(&request)));
        }

        let mut results: Vec<Option<Result<Arc<ConcreteSpec>, Error>>> =
            (0..count).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            let (i, result) =
                joined.map_err(|e| Error::internal(format!("concretization task failed: {e}")))?;
            results[i] = Some(result);
        }

        results
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| Err(Error::internal("concretization result missing"))))
            .collect()
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("prefs", &self.prefs)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
