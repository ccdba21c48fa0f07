//! In-memory recipe catalog

use crate::provider::RecipeProvider;
use crate::recipe::{DependencyRule, PackageRecipe, ProviderRule};
use spackle_errors::{Error, RecipeError};
use spackle_spec::Spec;
use spackle_types::{Arch, Compiler, VariantDeclaration, VariantValue, Version, VersionList};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Recipes held in memory, with an index of virtual capabilities
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    recipes: BTreeMap<String, Arc<PackageRecipe>>,
    virtuals: BTreeMap<String, Vec<ProviderRule>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from recipes
    ///
    /// # Errors
    ///
    /// Returns an error if two recipes share a name or a capability shares
    /// a name with a package.
    pub fn from_recipes(recipes: impl IntoIterator<Item = PackageRecipe>) -> Result<Self, Error> {
        let mut repo = Self::new();
        for recipe in recipes {
            repo.add(recipe)?;
        }
        Ok(repo)
    }

    /// Add one recipe
    ///
    /// # Errors
    ///
    /// Returns `RecipeError::DuplicatePackage` if the name is taken, and
    /// `RecipeError::InvalidRecipe` when a capability would shadow a package.
    pub fn add(&mut self, recipe: PackageRecipe) -> Result<(), Error> {
        if self.recipes.contains_key(&recipe.name) || self.virtuals.contains_key(&recipe.name) {
            return Err(RecipeError::DuplicatePackage { name: recipe.name }.into());
        }
        for rule in &recipe.provides {
            let capability = rule.spec.name_or_empty();
            if self.recipes.contains_key(capability) {
                return Err(RecipeError::InvalidRecipe {
                    package: recipe.name.clone(),
                    message: format!("capability {capability} is also a package"),
                }
                .into());
            }
        }

        for rule in &recipe.provides {
            let providers = self
                .virtuals
                .entry(rule.spec.name_or_empty().to_string())
                .or_default();
            providers.push(ProviderRule {
                package: recipe.name.clone(),
                provides: rule.spec.clone(),
                when: rule.when.clone(),
            });
            providers.sort_by(|a, b| a.package.cmp(&b.package));
        }
        self.recipes.insert(recipe.name.clone(), Arc::new(recipe));
        Ok(())
    }

    /// Look up a recipe
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<PackageRecipe>> {
        self.recipes.get(name)
    }

    fn recipe(&self, name: &str) -> Result<&PackageRecipe, Error> {
        self.recipes.get(name).map(AsRef::as_ref).ok_or_else(|| {
            RecipeError::UnknownPackage {
                name: name.to_string(),
            }
            .into()
        })
    }

    /// Package names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.recipes.keys().map(String::as_str)
    }

    /// Capability names, sorted
    pub fn capabilities(&self) -> impl Iterator<Item = &str> {
        self.virtuals.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }
}

impl RecipeProvider for InMemoryRepository {
    fn exists(&self, name: &str) -> bool {
        self.recipes.contains_key(name) || self.virtuals.contains_key(name)
    }

    fn is_virtual(&self, name: &str) -> bool {
        !self.recipes.contains_key(name) && self.virtuals.contains_key(name)
    }

    fn known_versions(&self, name: &str) -> Result<Vec<Version>, Error> {
        Ok(self.recipe(name)?.versions.clone())
    }

    fn declared_variants(&self, name: &str) -> Result<BTreeMap<String, VariantDeclaration>, Error> {
        Ok(self.recipe(name)?.variants.clone())
    }

    fn dependency_rules(&self, name: &str) -> Result<Vec<DependencyRule>, Error> {
        Ok(self.recipe(name)?.dependencies.clone())
    }

    fn providers_of(&self, capability: &str) -> Vec<ProviderRule> {
        self.virtuals.get(capability).cloned().unwrap_or_default()
    }

    fn conflicts(
        &self,
        name: &str,
        version: &Version,
        variants: &BTreeMap<String, VariantValue>,
        compiler: &Compiler,
        arch: &Arch,
    ) -> Option<String> {
        let recipe = self.recipes.get(name)?;
        let node = Spec {
            name: Some(name.to_string()),
            versions: VersionList::exact(version.clone()),
            variants: variants.clone(),
            compiler: Some(compiler.to_spec()),
            arch: arch.to_spec(),
            hash: None,
            dependencies: BTreeMap::new(),
        };
        recipe.conflict_for(&node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> InMemoryRepository {
        InMemoryRepository::from_recipes([
            PackageRecipe::builder("openmpi")
                .version("4.1.5")
                .provides("mpi@:3.1")
                .build()
                .unwrap(),
            PackageRecipe::builder("mpich")
                .version("3.2")
                .version("4.1")
                .provides_if("mpi@:3", "@:3")
                .provides_if("mpi@:4", "@4:")
                .build()
                .unwrap(),
            PackageRecipe::builder("hdf5")
                .version("1.12.2")
                .depends_on_if("mpi", "+mpi")
                .build()
                .unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn test_virtual_index() {
        let repo = repo();
        assert!(repo.is_virtual("mpi"));
        assert!(repo.exists("mpi"));
        assert!(!repo.is_virtual("hdf5"));
        assert!(!repo.exists("zlib"));

        let providers: Vec<_> = repo
            .providers_of("mpi")
            .into_iter()
            .map(|p| p.package)
            .collect();
        assert_eq!(providers, ["mpich", "mpich", "openmpi"]);
        assert_eq!(repo.capabilities().collect::<Vec<_>>(), ["mpi"]);
    }

    #[test]
    fn test_unknown_package() {
        let err = repo().known_versions("zlib").unwrap_err();
        assert!(matches!(
            err,
            Error::Recipe(RecipeError::UnknownPackage { ref name }) if name == "zlib"
        ));
    }

    #[test]
    fn test_duplicates_rejected() {
        let mut repo = repo();
        let dup = PackageRecipe::builder("hdf5").build().unwrap();
        assert!(matches!(
            repo.add(dup),
            Err(Error::Recipe(RecipeError::DuplicatePackage { .. }))
        ));
        let shadow = PackageRecipe::builder("mpi").build().unwrap();
        assert!(repo.add(shadow).is_err());
        let provides_package = PackageRecipe::builder("fake")
            .provides("hdf5")
            .build()
            .unwrap();
        assert!(matches!(
            repo.add(provides_package),
            Err(Error::Recipe(RecipeError::InvalidRecipe { .. }))
        ));
    }
}
