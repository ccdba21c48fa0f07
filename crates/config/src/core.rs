//! Configuration sections

use serde::{Deserialize, Serialize};
use spackle_errors::{ConfigError, Error};
use spackle_types::{Arch, ColorChoice, Compiler, Version};
use std::collections::BTreeMap;

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_color_choice")]
    pub color: ColorChoice,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            color: ColorChoice::Auto,
        }
    }
}

fn default_color_choice() -> ColorChoice {
    ColorChoice::Auto
}

/// Which packages get their test-only dependencies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestScope {
    #[default]
    None,
    Root,
    All,
}

impl std::str::FromStr for TestScope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "root" => Ok(Self::Root),
            "all" => Ok(Self::All),
            _ => Err(ConfigError::InvalidValue {
                field: "tests".to_string(),
                value: s.to_string(),
            }
            .into()),
        }
    }
}

/// Concretizer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConcretizerConfig {
    #[serde(default)]
    pub tests: TestScope,
}

/// An available compiler toolchain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerEntry {
    pub name: String,
    pub version: String,
}

impl CompilerEntry {
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the version does not parse.
    pub fn to_compiler(&self) -> Result<Compiler, Error> {
        let version = Version::parse(&self.version).map_err(|_| ConfigError::InvalidValue {
            field: format!("compilers.{}.version", self.name),
            value: self.version.clone(),
        })?;
        Ok(Compiler::new(self.name.clone(), version))
    }
}

/// Architecture used when a spec leaves it open
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchDefaults {
    #[serde(default = "default_platform")]
    pub platform: String,
    #[serde(default = "default_os")]
    pub os: String,
    #[serde(default = "default_target")]
    pub target: String,
}

impl Default for ArchDefaults {
    fn default() -> Self {
        Self {
            platform: default_platform(),
            os: default_os(),
            target: default_target(),
        }
    }
}

impl ArchDefaults {
    #[must_use]
    pub fn to_arch(&self) -> Arch {
        Arch::new(self.platform.clone(), self.os.clone(), self.target.clone())
    }
}

fn default_platform() -> String {
    std::env::consts::OS.to_string()
}

fn default_os() -> String {
    std::env::consts::OS.to_string()
}

fn default_target() -> String {
    std::env::consts::ARCH.to_string()
}

/// Tie-breaking preferences
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Preferences {
    /// Compiler names, most preferred first
    #[serde(default)]
    pub compilers: Vec<String>,
    /// Capability name to provider names, most preferred first
    #[serde(default)]
    pub providers: BTreeMap<String, Vec<String>>,
}

/// Per-package preferences
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackagePreference {
    /// Versions to pick first, in order
    #[serde(default)]
    pub versions: Vec<String>,
    /// Variant settings in spec notation, e.g. `+shared~debug`
    pub variants: Option<String>,
}
