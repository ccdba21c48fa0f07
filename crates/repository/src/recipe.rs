//! Package recipes
//!
//! A recipe declares what can be built for one package: its versions, its
//! variants, and rules that apply when a build matches a `when` predicate.
//! Predicates are anonymous specs such as `+mpi` or `@2:%gcc`.

use serde::{Deserialize, Serialize};
use spackle_errors::{Error, RecipeError};
use spackle_spec::Spec;
use spackle_types::{DepTypes, VariantDeclaration, Version};
use std::collections::BTreeMap;

/// `depends_on(spec, type=..., when=...)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRule {
    pub spec: Spec,
    pub types: DepTypes,
    pub when: Spec,
}

impl DependencyRule {
    /// Name of the required package or capability
    #[must_use]
    pub fn name(&self) -> &str {
        self.spec.name_or_empty()
    }
}

/// `provides(capability, when=...)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvidesRule {
    pub spec: Spec,
    pub when: Spec,
}

/// A package able to satisfy a virtual capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRule {
    pub package: String,
    pub provides: Spec,
    pub when: Spec,
}

/// `conflicts(constraint, when=..., msg=...)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRule {
    pub constraint: Spec,
    pub when: Spec,
    pub msg: Option<String>,
}

impl ConflictRule {
    /// The text reported when the rule fires
    #[must_use]
    pub fn describe(&self) -> String {
        match &self.msg {
            Some(msg) => msg.clone(),
            None if self.when == Spec::anonymous() => format!("conflicts with {}", self.constraint),
            None => format!("{} conflicts with {}", self.when, self.constraint),
        }
    }
}

/// Everything known about how to build one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecipe {
    pub name: String,
    pub description: String,
    /// Known versions, oldest first
    pub versions: Vec<Version>,
    pub variants: BTreeMap<String, VariantDeclaration>,
    pub dependencies: Vec<DependencyRule>,
    pub provides: Vec<ProvidesRule>,
    pub conflicts: Vec<ConflictRule>,
}

impl PackageRecipe {
    /// Start a recipe for `name`
    pub fn builder(name: impl Into<String>) -> RecipeBuilder {
        RecipeBuilder::new(name)
    }

    /// The first conflict rule a bound node triggers
    ///
    /// `node` must be exact in every field a rule may test.
    #[must_use]
    pub fn conflict_for(&self, node: &Spec) -> Option<String> {
        self.conflicts
            .iter()
            .find(|rule| node.satisfies(&rule.when, true) && node.satisfies(&rule.constraint, true))
            .map(ConflictRule::describe)
    }
}

/// Builder for [`PackageRecipe`]
///
/// Spec text is parsed as it is added; the first error is kept and
/// returned by [`RecipeBuilder::build`].
#[derive(Debug)]
pub struct RecipeBuilder {
    recipe: PackageRecipe,
    error: Option<Error>,
}

impl RecipeBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            recipe: PackageRecipe {
                name: name.into(),
                description: String::new(),
                versions: Vec::new(),
                variants: BTreeMap::new(),
                dependencies: Vec::new(),
                provides: Vec::new(),
                conflicts: Vec::new(),
            },
            error: None,
        }
    }

    fn record<T>(&mut self, result: Result<T, Error>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.error.get_or_insert(e);
                None
            }
        }
    }

    fn predicate(&mut self, text: &str) -> Option<Spec> {
        if text.trim().is_empty() {
            return Some(Spec::anonymous());
        }
        self.record(Spec::parse(text))
    }

    #[must_use]
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.recipe.description = text.into();
        self
    }

    #[must_use]
    pub fn version(mut self, version: &str) -> Self {
        if let Some(v) = self.record(Version::parse(version).map_err(Error::from)) {
            self.recipe.versions.push(v);
        }
        self
    }

    #[must_use]
    pub fn variant(mut self, decl: VariantDeclaration) -> Self {
        self.recipe.variants.insert(decl.name.clone(), decl);
        self
    }

    /// Unconditional build and link dependency
    #[must_use]
    pub fn depends_on(self, spec: &str) -> Self {
        self.dependency(spec, DepTypes::default(), "")
    }

    /// Build and link dependency applying when the build matches `when`
    #[must_use]
    pub fn depends_on_if(self, spec: &str, when: &str) -> Self {
        self.dependency(spec, DepTypes::default(), when)
    }

    /// Dependency with explicit types and an optional predicate
    #[must_use]
    pub fn dependency(mut self, spec: &str, types: DepTypes, when: &str) -> Self {
        let spec = self.record(Spec::parse(spec));
        let when = self.predicate(when);
        if let (Some(spec), Some(when)) = (spec, when) {
            self.recipe.dependencies.push(DependencyRule { spec, types, when });
        }
        self
    }

    #[must_use]
    pub fn provides(self, capability: &str) -> Self {
        self.provides_if(capability, "")
    }

    #[must_use]
    pub fn provides_if(mut self, capability: &str, when: &str) -> Self {
        let spec = self.record(Spec::parse(capability));
        let when = self.predicate(when);
        if let (Some(spec), Some(when)) = (spec, when) {
            self.recipe.provides.push(ProvidesRule { spec, when });
        }
        self
    }

    #[must_use]
    pub fn conflicts(mut self, constraint: &str, when: &str, msg: Option<&str>) -> Self {
        let constraint = self.record(Spec::parse(constraint));
        let when = self.predicate(when);
        if let (Some(constraint), Some(when)) = (constraint, when) {
            self.recipe.conflicts.push(ConflictRule {
                constraint,
                when,
                msg: msg.map(str::to_string),
            });
        }
        self
    }

    /// Validate and finish the recipe
    ///
    /// # Errors
    ///
    /// Returns the first spec parse error, or `RecipeError::InvalidRecipe`
    /// for an empty name, duplicate versions, an unnamed or self-referential
    /// dependency, an unnamed capability, or a predicate naming another
    /// package.
    pub fn build(self) -> Result<PackageRecipe, Error> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let mut recipe = self.recipe;
        let name = recipe.name.clone();
        let invalid_for = |message: String| -> Error {
            RecipeError::InvalidRecipe {
                package: name.clone(),
                message,
            }
            .into()
        };

        if name.trim().is_empty() {
            return Err(invalid_for("recipe has no name".to_string()));
        }

        recipe.versions.sort();
        if let Some(pair) = recipe.versions.windows(2).find(|w| w[0] == w[1]) {
            return Err(invalid_for(format!("version {} declared twice", pair[1])));
        }

        for rule in &recipe.dependencies {
            match rule.spec.name.as_deref() {
                None => return Err(invalid_for(format!("dependency '{}' has no name", rule.spec))),
                Some(dep) if dep == name => {
                    return Err(invalid_for("package depends on itself".to_string()))
                }
                Some(_) => {}
            }
        }

        if let Some(rule) = recipe.provides.iter().find(|r| r.spec.is_anonymous()) {
            return Err(invalid_for(format!("capability '{}' has no name", rule.spec)));
        }

        let predicates = recipe
            .dependencies
            .iter()
            .map(|r| &r.when)
            .chain(recipe.provides.iter().map(|r| &r.when))
            .chain(recipe.conflicts.iter().map(|r| &r.when));
        for when in predicates {
            if when.name.as_deref().is_some_and(|n| n != name) {
                return Err(invalid_for(format!("predicate '{when}' names another package")));
            }
        }

        Ok(recipe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spackle_types::VariantValue;

    fn geant4() -> PackageRecipe {
        PackageRecipe::builder("geant4")
            .version("10.03.p03")
            .version("10.04")
            .variant(VariantDeclaration::boolean("qt", false))
            .variant(VariantDeclaration::single("cxxstd", "11", &["11", "14", "17"]))
            .depends_on("clhep@2.3.3.0:")
            .depends_on_if("qt@5:", "+qt")
            .dependency("cmake@3.5:", DepTypes::BUILD, "")
            .conflicts("%intel", "cxxstd=17", None)
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder() {
        let recipe = geant4();
        assert_eq!(recipe.versions.len(), 2);
        assert_eq!(recipe.dependencies.len(), 3);
        assert_eq!(recipe.dependencies[1].when.variants["qt"], VariantValue::Bool(true));
        assert_eq!(recipe.dependencies[2].types, DepTypes::BUILD);
        assert_eq!(recipe.dependencies[0].name(), "clhep");
    }

    #[test]
    fn test_conflict_for() {
        let recipe = geant4();
        let hit = Spec::parse("geant4@10.04%intel@19 cxxstd=17").unwrap();
        assert_eq!(
            recipe.conflict_for(&hit).as_deref(),
            Some("cxxstd=17 conflicts with %intel")
        );
        let miss = Spec::parse("geant4@10.04%gcc@9 cxxstd=17").unwrap();
        assert_eq!(recipe.conflict_for(&miss), None);
    }

    #[test]
    fn test_build_errors() {
        let err = PackageRecipe::builder("a").depends_on("@1.0").build().unwrap_err();
        assert!(err.to_string().contains("has no name"));

        let err = PackageRecipe::builder("a").depends_on("a").build().unwrap_err();
        assert!(err.to_string().contains("depends on itself"));

        let err = PackageRecipe::builder("a")
            .version("1.0")
            .version("1.0")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("declared twice"));

        let err = PackageRecipe::builder("a")
            .depends_on_if("b", "c+x")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("names another package"));

        let err = PackageRecipe::builder("a").depends_on("b@@").build().unwrap_err();
        assert!(matches!(err, Error::Parse(_)));

        assert!(PackageRecipe::builder(" ").build().is_err());
    }
}
