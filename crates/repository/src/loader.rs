//! Recipes stored as TOML files
//!
//! ```toml
//! name = "hdf5"
//! description = "HDF5 data model, library, and file format"
//! versions = ["1.10.7", "1.12.2"]
//!
//! [[variants]]
//! name = "mpi"
//! default = true
//!
//! [[variants]]
//! name = "api"
//! default = "default"
//! values = ["default", "v18", "v110"]
//!
//! [[depends_on]]
//! spec = "mpi"
//! when = "+mpi"
//!
//! [[depends_on]]
//! spec = "cmake@3.12:"
//! type = "build"
//!
//! [[provides]]
//! spec = "..."
//!
//! [[conflicts]]
//! spec = "%intel"
//! when = "api=v18"
//! msg = "..."
//! ```

use crate::memory::InMemoryRepository;
use crate::recipe::{PackageRecipe, RecipeBuilder};
use serde::Deserialize;
use spackle_errors::{Error, RecipeError};
use spackle_types::{AllowedValues, DepTypes, VariantDeclaration, VariantValue};
use std::path::Path;
use tokio::fs;
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRecipe {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    versions: Vec<String>,
    #[serde(default)]
    variants: Vec<RawVariant>,
    #[serde(default)]
    depends_on: Vec<RawDependency>,
    #[serde(default)]
    provides: Vec<RawRule>,
    #[serde(default)]
    conflicts: Vec<RawConflict>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDefault {
    Switch(bool),
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawVariant {
    name: String,
    default: RawDefault,
    values: Option<Vec<String>>,
    #[serde(default)]
    multi: bool,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDependency {
    spec: String,
    #[serde(rename = "type")]
    types: Option<String>,
    #[serde(default)]
    when: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRule {
    spec: String,
    #[serde(default)]
    when: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConflict {
    spec: String,
    #[serde(default)]
    when: String,
    msg: Option<String>,
}

impl RawVariant {
    fn into_declaration(self, package: &str) -> Result<VariantDeclaration, Error> {
        let invalid = |message: String| -> Error {
            RecipeError::InvalidRecipe {
                package: package.to_string(),
                message,
            }
            .into()
        };

        let (default, allowed) = match (self.default, self.values) {
            (RawDefault::Switch(b), None) => (VariantValue::Bool(b), AllowedValues::Bool),
            (RawDefault::Switch(_), Some(_)) => {
                return Err(invalid(format!(
                    "boolean variant {} cannot list values",
                    self.name
                )))
            }
            (RawDefault::One(v), values) => (VariantValue::single(v), allowed_from(values)),
            (RawDefault::Many(vs), values) => (VariantValue::from_values(vs), allowed_from(values)),
        };

        let decl = VariantDeclaration {
            name: self.name,
            default,
            allowed,
            multi: self.multi,
            description: self.description,
        };
        // The default must itself be a legal value
        decl.validate(&decl.default)
            .map_err(|reason| invalid(format!("default of {}: {reason}", decl.name)))?;
        Ok(decl)
    }
}

fn allowed_from(values: Option<Vec<String>>) -> AllowedValues {
    match values {
        Some(values) => AllowedValues::Values(values.into_iter().collect()),
        None => AllowedValues::Any,
    }
}

impl PackageRecipe {
    /// Parse a recipe from TOML text
    ///
    /// # Errors
    ///
    /// Returns `RecipeError::InvalidRecipe` for malformed TOML or
    /// declarations, and parse errors for malformed spec text.
    pub fn from_toml_str(text: &str) -> Result<Self, Error> {
        let raw: RawRecipe = toml::from_str(text).map_err(|e| RecipeError::InvalidRecipe {
            package: "<toml>".to_string(),
            message: e.to_string(),
        })?;

        let mut builder: RecipeBuilder =
            PackageRecipe::builder(raw.name.clone()).description(raw.description);
        for version in &raw.versions {
            builder = builder.version(version);
        }
        for variant in raw.variants {
            builder = builder.variant(variant.into_declaration(&raw.name)?);
        }
        for dep in &raw.depends_on {
            let types = match &dep.types {
                Some(text) => text.parse()?,
                None => DepTypes::default(),
            };
            builder = builder.dependency(&dep.spec, types, &dep.when);
        }
        for rule in &raw.provides {
            builder = builder.provides_if(&rule.spec, &rule.when);
        }
        for rule in &raw.conflicts {
            builder = builder.conflicts(&rule.spec, &rule.when, rule.msg.as_deref());
        }
        builder.build()
    }

    /// Load a recipe file
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or any error of
    /// [`PackageRecipe::from_toml_str`].
    pub async fn load_file(path: &Path) -> Result<Self, Error> {
        let text = fs::read_to_string(path)
            .await
            .map_err(|e| Error::io_with_path(&e, path))?;
        Self::from_toml_str(&text).map_err(|e| match e {
            Error::Recipe(RecipeError::InvalidRecipe { package, message }) if package == "<toml>" => {
                RecipeError::InvalidRecipe {
                    package: path.display().to_string(),
                    message,
                }
                .into()
            }
            other => other,
        })
    }
}

impl InMemoryRepository {
    /// Load every `*.toml` recipe in a directory
    ///
    /// Files are read in name order so duplicate detection is stable.
    ///
    /// # Errors
    ///
    /// Returns the first I/O, parse or catalog error encountered.
    pub async fn load_dir(dir: &Path) -> Result<Self, Error> {
        let mut paths = Vec::new();
        let mut rd = fs::read_dir(dir)
            .await
            .map_err(|e| Error::io_with_path(&e, dir))?;
        while let Some(entry) = rd.next_entry().await? {
            let path = entry.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("toml") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut repo = Self::new();
        for path in paths {
            let recipe = PackageRecipe::load_file(&path).await?;
            debug!(package = %recipe.name, path = %path.display(), "loaded recipe");
            repo.add(recipe)?;
        }
        Ok(repo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HDF5: &str = r#"
name = "hdf5"
versions = ["1.12.2", "1.10.7"]

[[variants]]
name = "mpi"
default = true

[[variants]]
name = "api"
default = "default"
values = ["default", "v18", "v110"]

[[variants]]
name = "langs"
default = ["c"]
values = ["c", "cxx", "fortran"]
multi = true

[[depends_on]]
spec = "mpi"
when = "+mpi"

[[depends_on]]
spec = "cmake@3.12:"
type = "build"

[[conflicts]]
spec = "%intel"
when = "api=v18"
"#;

    #[test]
    fn test_from_toml() {
        let recipe = PackageRecipe::from_toml_str(HDF5).unwrap();
        assert_eq!(recipe.versions[0].to_string(), "1.10.7");
        assert!(recipe.variants["mpi"].is_bool());
        assert!(recipe.variants["langs"].multi);
        assert_eq!(recipe.dependencies[1].types, DepTypes::BUILD);
        assert_eq!(recipe.conflicts.len(), 1);
    }

    #[test]
    fn test_bad_default_rejected() {
        let text = r#"
name = "x"
[[variants]]
name = "api"
default = "v99"
values = ["v18"]
"#;
        let err = PackageRecipe::from_toml_str(text).unwrap_err();
        assert!(err.to_string().contains("default of api"));
    }

    #[test]
    fn test_bad_dependency_type() {
        let text = r#"
name = "x"
[[depends_on]]
spec = "y"
type = "runtime"
"#;
        assert!(matches!(
            PackageRecipe::from_toml_str(text),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = PackageRecipe::from_toml_str("name = \"x\"\nversoins = []\n").unwrap_err();
        assert!(matches!(err, Error::Recipe(RecipeError::InvalidRecipe { .. })));
    }
}
