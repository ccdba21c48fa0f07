//! Session-wide memoization shared between concretizations

use dashmap::DashMap;
use spackle_errors::Error;
use spackle_hash::Hash;
use spackle_repository::{DependencyRule, RecipeProvider};
use spackle_spec::ConcreteSpec;
use spackle_types::{VariantDeclaration, Version};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// What the resolver needs to know about one package
#[derive(Debug, Clone)]
pub struct RecipeSummary {
    /// Known versions, oldest first
    pub versions: Vec<Version>,
    pub variants: BTreeMap<String, VariantDeclaration>,
    pub rules: Vec<DependencyRule>,
}

impl RecipeSummary {
    fn fetch(provider: &dyn RecipeProvider, name: &str) -> Result<Self, Error> {
        Ok(Self {
            versions: provider.known_versions(name)?,
            variants: provider.declared_variants(name)?,
            rules: provider.dependency_rules(name)?,
        })
    }
}

/// Cache of recipe summaries and interned concrete specs
///
/// A cache must only be shared between resolvers that query the same
/// catalog.
#[derive(Debug, Default)]
pub struct SessionCache {
    recipes: DashMap<String, Arc<RecipeSummary>>,
    specs: DashMap<Hash, Arc<ConcreteSpec>>,
    hits: AtomicU64,
}

impl SessionCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Summary of a package, fetched at most once per name
    ///
    /// # Errors
    ///
    /// Returns the catalog's error for unknown packages; failures are not
    /// cached.
    pub fn summary(
        &self,
        provider: &dyn RecipeProvider,
        name: &str,
    ) -> Result<Arc<RecipeSummary>, Error> {
        if let Some(hit) = self.recipes.get(name) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(package = name, "recipe cache hit");
            return Ok(Arc::clone(&hit));
        }

        let entry = self
            .recipes
            .entry(name.to_string())
            .or_try_insert_with(|| RecipeSummary::fetch(provider, name).map(Arc::new))?;
        Ok(Arc::clone(&entry))
    }

    /// Return the shared copy of a concrete spec with the same DAG hash
    pub fn intern(&self, spec: ConcreteSpec) -> Arc<ConcreteSpec> {
        let hash = spec.hash();
        let entry = self.specs.entry(hash).or_insert_with(|| Arc::new(spec));
        Arc::clone(&entry)
    }

    /// Previously interned spec by full hash
    #[must_use]
    pub fn get(&self, hash: &Hash) -> Option<Arc<ConcreteSpec>> {
        self.specs.get(hash).map(|entry| Arc::clone(&entry))
    }

    /// Number of recipe lookups answered from the cache
    #[must_use]
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn interned(&self) -> usize {
        self.specs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spackle_repository::{InMemoryRepository, PackageRecipe};

    fn repo() -> InMemoryRepository {
        InMemoryRepository::from_recipes([PackageRecipe::builder("zlib")
            .version("1.2.11")
            .version("1.2.13")
            .build()
            .unwrap()])
        .unwrap()
    }

    #[test]
    fn test_summary_fetched_once() {
        let repo = repo();
        let cache = SessionCache::new();

        let first = cache.summary(&repo, "zlib").unwrap();
        let second = cache.summary(&repo, "zlib").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.versions.len(), 2);
        assert_eq!(cache.hits(), 1);
    }

    #[test]
    fn test_unknown_package_not_cached() {
        let repo = repo();
        let cache = SessionCache::new();
        assert!(cache.summary(&repo, "nope").is_err());
        assert!(cache.summary(&repo, "nope").is_err());
        assert_eq!(cache.hits(), 0);
    }
}
