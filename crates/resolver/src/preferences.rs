//! Tie-breaking inputs taken from configuration

use spackle_config::{Config, TestScope};
use spackle_errors::{ConfigError, Error};
use spackle_spec::Spec;
use spackle_types::{Arch, Compiler, CompilerSpec, VariantValue, Version};
use std::cmp::Reverse;
use std::collections::BTreeMap;

/// Everything the concretizer consults when a spec leaves a choice open
#[derive(Debug, Clone)]
pub struct Preferences {
    /// Available compilers in declaration order
    pub compilers: Vec<Compiler>,
    /// Compiler names, most preferred first
    pub compiler_order: Vec<String>,
    /// Capability to provider names, most preferred first
    pub providers: BTreeMap<String, Vec<String>>,
    pub versions: BTreeMap<String, Vec<Version>>,
    pub variants: BTreeMap<String, BTreeMap<String, VariantValue>>,
    pub arch: Arch,
    pub tests: TestScope,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            compilers: Vec::new(),
            compiler_order: Vec::new(),
            providers: BTreeMap::new(),
            versions: BTreeMap::new(),
            variants: BTreeMap::new(),
            arch: spackle_config::ArchDefaults::default().to_arch(),
            tests: TestScope::None,
        }
    }
}

impl Preferences {
    /// Collect preferences from a loaded configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for compiler or package versions
    /// and package variant settings that do not parse.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let mut versions = BTreeMap::new();
        let mut variants = BTreeMap::new();
        for (name, pref) in &config.packages {
            let parsed = pref
                .versions
                .iter()
                .map(|v| {
                    Version::parse(v).map_err(|_| ConfigError::InvalidValue {
                        field: format!("packages.{name}.versions"),
                        value: v.clone(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            if !parsed.is_empty() {
                versions.insert(name.clone(), parsed);
            }

            if let Some(text) = &pref.variants {
                let spec = Spec::parse(text).map_err(|_| ConfigError::InvalidValue {
                    field: format!("packages.{name}.variants"),
                    value: text.clone(),
                })?;
                variants.insert(name.clone(), spec.variants);
            }
        }

        Ok(Self {
            compilers: config.compilers()?,
            compiler_order: config.preferences.compilers.clone(),
            providers: config.preferences.providers.clone(),
            versions,
            variants,
            arch: config.defaults.to_arch(),
            tests: config.concretizer.tests,
        })
    }

    #[must_use]
    pub fn with_compiler(mut self, compiler: Compiler) -> Self {
        self.compilers.push(compiler);
        self
    }

    #[must_use]
    pub fn with_tests(mut self, tests: TestScope) -> Self {
        self.tests = tests;
        self
    }

    #[must_use]
    pub fn prefer_provider(mut self, capability: &str, provider: &str) -> Self {
        self.providers
            .entry(capability.to_string())
            .or_default()
            .push(provider.to_string());
        self
    }

    /// Best available compiler satisfying `constraint`
    ///
    /// Ranked by the configured name order, then newest version, then
    /// declaration order.
    #[must_use]
    pub fn best_compiler(&self, constraint: Option<&CompilerSpec>) -> Option<&Compiler> {
        self.compilers
            .iter()
            .enumerate()
            .filter(|(_, c)| constraint.map_or(true, |spec| spec.satisfied_by(c)))
            .min_by_key(|(declared, c)| {
                let rank = self
                    .compiler_order
                    .iter()
                    .position(|name| *name == c.name)
                    .unwrap_or(usize::MAX);
                (rank, Reverse(&c.version), *declared)
            })
            .map(|(_, c)| c)
    }

    /// Position of `provider` in the preference list for `capability`
    #[must_use]
    pub fn provider_rank(&self, capability: &str, provider: &str) -> usize {
        self.providers
            .get(capability)
            .and_then(|names| names.iter().position(|n| n == provider))
            .unwrap_or(usize::MAX)
    }

    #[must_use]
    pub fn preferred_versions(&self, package: &str) -> &[Version] {
        self.versions.get(package).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn preferred_variant(&self, package: &str, variant: &str) -> Option<&VariantValue> {
        self.variants.get(package)?.get(variant)
    }

    /// Whether test-only dependencies of a node are wanted
    #[must_use]
    pub fn wants_tests(&self, is_root: bool) -> bool {
        match self.tests {
            TestScope::None => false,
            TestScope::Root => is_root,
            TestScope::All => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiler(name: &str, version: &str) -> Compiler {
        Compiler::new(name, Version::parse(version).unwrap())
    }

    #[test]
    fn test_compiler_ranking() {
        let prefs = Preferences::default()
            .with_compiler(compiler("gcc", "9.4.0"))
            .with_compiler(compiler("gcc", "12.2.0"))
            .with_compiler(compiler("intel", "19.0.4"));

        assert_eq!(prefs.best_compiler(None).unwrap().to_string(), "gcc@12.2.0");

        let ordered = Preferences {
            compiler_order: vec!["intel".to_string()],
            ..prefs.clone()
        };
        assert_eq!(ordered.best_compiler(None).unwrap().to_string(), "intel@19.0.4");

        let old_gcc = CompilerSpec::new("gcc").with_versions(":9".parse().unwrap());
        assert_eq!(
            ordered.best_compiler(Some(&old_gcc)).unwrap().to_string(),
            "gcc@9.4.0"
        );
        assert!(prefs.best_compiler(Some(&CompilerSpec::new("clang"))).is_none());
    }

    #[test]
    fn test_from_config() {
        let config = Config::from_toml_str(
            r#"
[concretizer]
tests = "root"

[[compilers]]
name = "gcc"
version = "12.2.0"

[preferences.providers]
mpi = ["mpich"]

[packages.zlib]
versions = ["1.2.11"]
variants = "~shared"
"#,
        )
        .unwrap();

        let prefs = Preferences::from_config(&config).unwrap();
        assert_eq!(prefs.compilers.len(), 1);
        assert_eq!(prefs.provider_rank("mpi", "mpich"), 0);
        assert_eq!(prefs.provider_rank("mpi", "openmpi"), usize::MAX);
        assert_eq!(prefs.preferred_versions("zlib")[0].to_string(), "1.2.11");
        assert_eq!(
            prefs.preferred_variant("zlib", "shared"),
            Some(&VariantValue::Bool(false))
        );
        assert!(prefs.wants_tests(true));
        assert!(!prefs.wants_tests(false));
    }
}
