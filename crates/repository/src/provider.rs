//! The catalog interface the resolver queries

use crate::recipe::{DependencyRule, ProviderRule};
use spackle_errors::Error;
use spackle_types::{Arch, Compiler, VariantDeclaration, VariantValue, Version};
use std::collections::BTreeMap;

/// Read-only access to package recipes
///
/// Implementations must be deterministic: the same question always gets
/// the same answer in the same order.
pub trait RecipeProvider: Send + Sync {
    /// Whether a real package or a virtual capability has this name
    fn exists(&self, name: &str) -> bool;

    /// Whether `name` is a capability rather than a package
    fn is_virtual(&self, name: &str) -> bool;

    /// Known versions, oldest first
    ///
    /// # Errors
    ///
    /// Returns `RecipeError::UnknownPackage` for names without a recipe.
    fn known_versions(&self, name: &str) -> Result<Vec<Version>, Error>;

    /// # Errors
    ///
    /// Returns `RecipeError::UnknownPackage` for names without a recipe.
    fn declared_variants(&self, name: &str) -> Result<BTreeMap<String, VariantDeclaration>, Error>;

    /// # Errors
    ///
    /// Returns `RecipeError::UnknownPackage` for names without a recipe.
    fn dependency_rules(&self, name: &str) -> Result<Vec<DependencyRule>, Error>;

    /// Packages providing a capability, sorted by package name
    fn providers_of(&self, capability: &str) -> Vec<ProviderRule>;

    /// Description of the first conflict rule a bound node triggers
    fn conflicts(
        &self,
        name: &str,
        version: &Version,
        variants: &BTreeMap<String, VariantValue>,
        compiler: &Compiler,
        arch: &Arch,
    ) -> Option<String>;
}
