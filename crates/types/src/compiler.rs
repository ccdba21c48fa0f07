//! Compiler constraints and concrete compilers

use crate::version::{Version, VersionList};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A compiler requirement such as `%gcc@9:`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompilerSpec {
    pub name: String,
    pub versions: VersionList,
}

impl CompilerSpec {
    /// Any version of the named compiler
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            versions: VersionList::any(),
        }
    }

    /// Restrict to a version list
    #[must_use]
    pub fn with_versions(mut self, versions: VersionList) -> Self {
        self.versions = versions;
        self
    }

    /// Whether a concrete compiler meets this requirement
    #[must_use]
    pub fn satisfied_by(&self, compiler: &Compiler) -> bool {
        self.name == compiler.name && self.versions.contains(&compiler.version)
    }

    /// Whether this requirement is at least as narrow as `other`
    #[must_use]
    pub fn satisfies(&self, other: &Self, strict: bool) -> bool {
        if self.name != other.name {
            return false;
        }
        if strict {
            self.versions.is_subset_of(&other.versions)
        } else {
            self.versions.intersects(&other.versions)
        }
    }

    /// Narrow both requirements into one, or `None` when they conflict
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        if self.name != other.name {
            return None;
        }
        let versions = self.versions.intersection(&other.versions);
        (!versions.is_empty()).then(|| Self {
            name: self.name.clone(),
            versions,
        })
    }
}

impl fmt::Display for CompilerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.versions.is_any() {
            write!(f, "@{}", self.versions)?;
        }
        Ok(())
    }
}

/// A configured compiler toolchain
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Compiler {
    pub name: String,
    pub version: Version,
}

impl Compiler {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    /// The exact requirement naming this compiler
    #[must_use]
    pub fn to_spec(&self) -> CompilerSpec {
        CompilerSpec {
            name: self.name.clone(),
            versions: VersionList::exact(self.version.clone()),
        }
    }
}

impl fmt::Display for Compiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gcc(v: &str) -> Compiler {
        Compiler::new("gcc", Version::parse(v).unwrap())
    }

    #[test]
    fn test_satisfied_by() {
        let spec = CompilerSpec::new("gcc").with_versions("9:".parse().unwrap());
        assert!(spec.satisfied_by(&gcc("12.2.0")));
        assert!(!spec.satisfied_by(&gcc("8.5")));
        assert!(!spec.satisfied_by(&Compiler::new("clang", Version::parse("15").unwrap())));
    }

    #[test]
    fn test_intersection() {
        let a = CompilerSpec::new("gcc").with_versions("9:".parse().unwrap());
        let b = CompilerSpec::new("gcc").with_versions(":11".parse().unwrap());
        assert_eq!(a.intersection(&b).unwrap().to_string(), "gcc@9:11");
        assert!(a.intersection(&CompilerSpec::new("intel")).is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(CompilerSpec::new("gcc").to_string(), "gcc");
        assert_eq!(gcc("9.4.0").to_string(), "gcc@9.4.0");
        assert_eq!(gcc("9.4.0").to_spec().to_string(), "gcc@9.4.0");
    }
}
