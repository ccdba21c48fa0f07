//! Installed-spec database contract

use crate::matcher::disambiguate;
use dashmap::DashMap;
use spackle_errors::Error;
use spackle_hash::{Hash, SHORT_HASH_LEN};
use spackle_spec::{ConcreteSpec, Spec};
use std::sync::Arc;
use tracing::debug;

/// Read access to a store of installed concrete specs
pub trait SpecDatabase: Send + Sync {
    /// Every stored spec that satisfies `query`, sorted by name, version
    /// and hash
    fn query(&self, query: &Spec) -> Vec<Arc<ConcreteSpec>>;

    /// The spec stored under a full hash
    fn get(&self, hash: &Hash) -> Option<Arc<ConcreteSpec>>;

    /// The one stored spec matching `query`
    ///
    /// # Errors
    ///
    /// Returns `QueryError::NoMatch` or `QueryError::Ambiguous`.
    fn find_one(&self, query: &Spec) -> Result<Arc<ConcreteSpec>, Error> {
        let found = self.query(query);
        let hash = disambiguate(query, found.iter().map(AsRef::as_ref))?.hash();
        found
            .into_iter()
            .find(|spec| spec.hash() == hash)
            .ok_or_else(|| Error::internal("matched spec vanished from query results"))
    }
}

/// Database held in memory, keyed by full DAG hash
#[derive(Debug, Default)]
pub struct InMemoryDatabase {
    specs: DashMap<Hash, Arc<ConcreteSpec>>,
}

impl InMemoryDatabase {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a spec, returning false if it was already present
    pub fn add(&self, spec: Arc<ConcreteSpec>) -> bool {
        let hash = spec.hash();
        let added = self.specs.insert(hash, spec).is_none();
        debug!(hash = %hash.short(SHORT_HASH_LEN), added, "stored spec");
        added
    }

    pub fn remove(&self, hash: &Hash) -> Option<Arc<ConcreteSpec>> {
        self.specs.remove(hash).map(|(_, spec)| spec)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Every stored spec in query order
    #[must_use]
    pub fn all(&self) -> Vec<Arc<ConcreteSpec>> {
        self.query(&Spec::anonymous())
    }
}

impl SpecDatabase for InMemoryDatabase {
    fn query(&self, query: &Spec) -> Vec<Arc<ConcreteSpec>> {
        let mut found: Vec<Arc<ConcreteSpec>> = self
            .specs
            .iter()
            .filter(|entry| entry.value().satisfies(query))
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        found.sort_by(|a, b| {
            let (ra, rb) = (&a.root().data, &b.root().data);
            (&ra.name, &ra.version, a.hash()).cmp(&(&rb.name, &rb.version, b.hash()))
        });
        found
    }

    fn get(&self, hash: &Hash) -> Option<Arc<ConcreteSpec>> {
        self.specs.get(hash).map(|entry| Arc::clone(entry.value()))
    }
}
