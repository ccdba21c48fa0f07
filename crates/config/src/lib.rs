#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for spackle
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded, host architecture detected)
//! - Configuration file (~/.config/spackle/config.toml)
//! - Environment variables

pub mod core;

pub use crate::core::{
    ArchDefaults, CompilerEntry, ConcretizerConfig, GeneralConfig, PackagePreference,
    Preferences, TestScope,
};

use serde::{Deserialize, Serialize};
use spackle_errors::{ConfigError, Error};
use spackle_types::{ColorChoice, Compiler, Version};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub concretizer: ConcretizerConfig,

    #[serde(default)]
    pub compilers: Vec<CompilerEntry>,

    #[serde(default)]
    pub defaults: ArchDefaults,

    #[serde(default)]
    pub preferences: Preferences,

    #[serde(default)]
    pub packages: BTreeMap<String, PackagePreference>,
}

impl Config {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir.join("spackle").join("config.toml"))
    }

    /// Parse configuration from TOML text and validate it
    ///
    /// # Errors
    ///
    /// Returns an error for invalid TOML or values that do not parse.
    pub fn from_toml_str(contents: &str) -> Result<Self, Error> {
        let config: Self = toml::from_str(contents).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the file contents
    /// contain invalid TOML syntax that cannot be parsed.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        Self::from_toml_str(&contents)
    }

    /// Load configuration with fallback to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML syntax.
    pub async fn load() -> Result<Self, Error> {
        let config_path = Self::default_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path).await
        } else {
            debug!(path = %config_path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from an optional path or use default
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values
    /// that cannot be parsed into the expected types.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        // SPACKLE_COLOR
        if let Ok(color) = std::env::var("SPACKLE_COLOR") {
            self.general.color = color.parse::<ColorChoice>().map_err(|_| {
                ConfigError::InvalidValue {
                    field: "SPACKLE_COLOR".to_string(),
                    value: color.clone(),
                }
            })?;
        }

        // SPACKLE_TESTS
        if let Ok(tests) = std::env::var("SPACKLE_TESTS") {
            self.concretizer.tests = tests.parse().map_err(|_| ConfigError::InvalidValue {
                field: "SPACKLE_TESTS".to_string(),
                value: tests.clone(),
            })?;
        }

        // SPACKLE_PLATFORM / SPACKLE_OS / SPACKLE_TARGET
        for (var, field) in [
            ("SPACKLE_PLATFORM", &mut self.defaults.platform),
            ("SPACKLE_OS", &mut self.defaults.os),
            ("SPACKLE_TARGET", &mut self.defaults.target),
        ] {
            if let Ok(value) = std::env::var(var) {
                if value.is_empty() || value.contains(char::is_whitespace) || value.contains('-') {
                    return Err(ConfigError::InvalidValue {
                        field: var.to_string(),
                        value,
                    }
                    .into());
                }
                *field = value;
            }
        }

        Ok(())
    }

    /// Check values serde cannot
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for unparsable compiler or
    /// package versions, and `ConfigError::Invalid` for duplicate compilers.
    pub fn validate(&self) -> Result<(), Error> {
        let compilers = self.compilers()?;
        for (i, compiler) in compilers.iter().enumerate() {
            if compilers[..i].contains(compiler) {
                return Err(ConfigError::Invalid {
                    message: format!("compiler {compiler} listed twice"),
                }
                .into());
            }
        }

        for (name, pref) in &self.packages {
            for version in &pref.versions {
                Version::parse(version).map_err(|_| ConfigError::InvalidValue {
                    field: format!("packages.{name}.versions"),
                    value: version.clone(),
                })?;
            }
        }
        Ok(())
    }

    /// Configured compilers in declaration order
    ///
    /// # Errors
    ///
    /// Returns an error if any compiler version does not parse.
    pub fn compilers(&self) -> Result<Vec<Compiler>, Error> {
        self.compilers.iter().map(CompilerEntry::to_compiler).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.concretizer.tests, TestScope::None);
        assert_eq!(config.defaults.target, std::env::consts::ARCH);
        assert!(config.compilers.is_empty());
    }

    #[test]
    fn test_sections() {
        let config = Config::from_toml_str(
            r#"
[concretizer]
tests = "root"

[[compilers]]
name = "gcc"
version = "12.2.0"

[[compilers]]
name = "intel"
version = "19.0.4"

[defaults]
platform = "linux"
os = "centos7"

[preferences]
compilers = ["intel", "gcc"]

[preferences.providers]
mpi = ["openmpi", "mpich"]

[packages.zlib]
versions = ["1.2.11"]
variants = "+shared"
"#,
        )
        .unwrap();

        assert_eq!(config.concretizer.tests, TestScope::Root);
        assert_eq!(config.compilers().unwrap()[1].to_string(), "intel@19.0.4");
        assert_eq!(config.defaults.os, "centos7");
        assert_eq!(config.defaults.target, std::env::consts::ARCH);
        assert_eq!(config.preferences.providers["mpi"], ["openmpi", "mpich"]);
        assert_eq!(config.packages["zlib"].variants.as_deref(), Some("+shared"));
    }

    #[test]
    fn test_validation() {
        let err = Config::from_toml_str("[[compilers]]\nname = \"gcc\"\nversion = \"9 4\"\n")
            .unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::InvalidValue { .. })));

        let err = Config::from_toml_str("[packages.zlib]\nversions = [\"1..@\"]\n").unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::InvalidValue { .. })));

        let twice = "[[compilers]]\nname = \"gcc\"\nversion = \"9\"\n[[compilers]]\nname = \"gcc\"\nversion = \"9\"\n";
        assert!(matches!(
            Config::from_toml_str(twice),
            Err(Error::Config(ConfigError::Invalid { .. }))
        ));

        assert!(matches!(
            Config::from_toml_str("[concretizer]\ntests = \"some\"\n"),
            Err(Error::Config(ConfigError::ParseError { .. }))
        ));
    }
}
