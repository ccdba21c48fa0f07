//! Abstract specs
//!
//! An abstract spec is a partial description of a build: any field may be
//! left open. Dependency clauses (`^dep`) are flat. Each one constrains the
//! node of that name wherever it ends up in the resolved DAG.

use crate::parser;
use serde::{Deserialize, Serialize};
use spackle_errors::{Error, ParseError};
use spackle_types::{format_variants, ArchSpec, CompilerSpec, VariantValue, VersionList};
use std::collections::BTreeMap;
use std::fmt;

/// A partially constrained build description
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Spec {
    pub name: Option<String>,
    pub versions: VersionList,
    pub variants: BTreeMap<String, VariantValue>,
    pub compiler: Option<CompilerSpec>,
    pub arch: ArchSpec,
    /// Lowercase hex prefix of a DAG hash
    pub hash: Option<String>,
    pub dependencies: BTreeMap<String, Spec>,
}

/// The field on which two specs disagree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub field: String,
    pub detail: String,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.detail)
    }
}

impl Spec {
    /// An unconstrained spec for a package
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// A spec without a package name, used as a predicate
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Parse exactly one spec
    ///
    /// # Errors
    ///
    /// Returns a parse error for malformed text or when the text holds zero
    /// or several specs.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let mut specs = parser::parse_specs(text)?;
        if specs.len() != 1 {
            return Err(ParseError::new(
                format!("expected exactly one spec, found {}", specs.len()),
                text,
                0,
            )
            .into());
        }
        Ok(specs.remove(0))
    }

    #[must_use]
    pub fn with_versions(mut self, versions: VersionList) -> Self {
        self.versions = versions;
        self
    }

    #[must_use]
    pub fn with_variant(mut self, name: impl Into<String>, value: VariantValue) -> Self {
        self.variants.insert(name.into(), value);
        self
    }

    #[must_use]
    pub fn with_compiler(mut self, compiler: CompilerSpec) -> Self {
        self.compiler = Some(compiler);
        self
    }

    #[must_use]
    pub fn with_dependency(mut self, dep: Spec) -> Self {
        if let Some(name) = dep.name.clone() {
            self.dependencies.insert(name, dep);
        }
        self
    }

    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.name.is_none()
    }

    /// The package name, or the empty string for anonymous specs
    #[must_use]
    pub fn name_or_empty(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    /// Compare own fields, ignoring dependency clauses
    ///
    /// Strict satisfaction means every build matching `self` matches
    /// `other`. Non-strict means some build could match both.
    #[must_use]
    pub fn satisfies_fields(&self, other: &Self, strict: bool) -> bool {
        let name_ok = match (&self.name, &other.name) {
            (_, None) => true,
            (Some(mine), Some(theirs)) => mine == theirs,
            (None, Some(_)) => !strict,
        };

        let versions_ok = if strict {
            self.versions.is_subset_of(&other.versions)
        } else {
            self.versions.intersects(&other.versions)
        };

        let compiler_ok = match (&self.compiler, &other.compiler) {
            (_, None) => true,
            (Some(mine), Some(theirs)) => mine.satisfies(theirs, strict),
            (None, Some(_)) => !strict,
        };

        let variants_ok = other.variants.iter().all(|(name, theirs)| {
            match self.variants.get(name) {
                Some(mine) if strict => mine.satisfies(theirs),
                Some(mine) => mine.merge(theirs).is_some(),
                None => !strict,
            }
        });

        let hash_ok = match (&self.hash, &other.hash) {
            (_, None) => true,
            (Some(mine), Some(theirs)) if strict => mine.starts_with(theirs.as_str()),
            (Some(mine), Some(theirs)) => {
                mine.starts_with(theirs.as_str()) || theirs.starts_with(mine.as_str())
            }
            (None, Some(_)) => !strict,
        };

        name_ok
            && versions_ok
            && compiler_ok
            && variants_ok
            && hash_ok
            && self.arch.satisfies(&other.arch, strict)
    }

    /// Whether `self` satisfies `other`, including dependency clauses
    #[must_use]
    pub fn satisfies(&self, other: &Self, strict: bool) -> bool {
        self.satisfies_fields(other, strict)
            && other.dependencies.iter().all(|(name, theirs)| {
                match self.dependencies.get(name) {
                    Some(mine) => mine.satisfies(theirs, strict),
                    None => !strict,
                }
            })
    }

    /// Whether a provider of `provides` meets a clause on a capability
    ///
    /// A clause naming a capability rather than the package itself is
    /// matched by name and version against what the package provides, and
    /// by its remaining fields against the package.
    #[must_use]
    pub fn satisfies_capability(&self, provides: &[Spec], clause: &Self) -> bool {
        if clause.name.is_none() || clause.name == self.name {
            return self.satisfies_fields(clause, true);
        }
        let provided = provides
            .iter()
            .any(|p| p.name == clause.name && p.versions.intersects(&clause.versions));
        let rest = Self {
            name: None,
            versions: VersionList::any(),
            ..clause.without_dependencies()
        };
        provided && self.satisfies_fields(&rest, true)
    }

    /// Whether some build could satisfy both specs
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.clone().constrain(other).is_ok()
    }

    /// Narrow `self` by everything `other` requires
    ///
    /// Returns whether anything changed. On conflict `self` is left as it
    /// was.
    ///
    /// # Errors
    ///
    /// Returns the first field on which the specs cannot agree.
    pub fn constrain(&mut self, other: &Self) -> Result<bool, Conflict> {
        let mut next = self.clone();
        next.constrain_fields(other)?;

        for (name, theirs) in &other.dependencies {
            match next.dependencies.get_mut(name) {
                Some(mine) => {
                    mine.constrain(theirs).map_err(|c| Conflict {
                        field: format!("^{name} {}", c.field),
                        detail: c.detail,
                    })?;
                }
                None => {
                    next.dependencies.insert(name.clone(), theirs.clone());
                }
            }
        }

        let changed = next != *self;
        *self = next;
        Ok(changed)
    }

    fn constrain_fields(&mut self, other: &Self) -> Result<(), Conflict> {
        match (&self.name, &other.name) {
            (Some(mine), Some(theirs)) if mine != theirs => {
                return Err(conflict("name", mine, theirs));
            }
            (None, Some(theirs)) => self.name = Some(theirs.clone()),
            _ => {}
        }

        let versions = self.versions.intersection(&other.versions);
        if versions.is_empty() {
            return Err(conflict("version", &self.versions, &other.versions));
        }
        self.versions = versions;

        match (&self.compiler, &other.compiler) {
            (Some(mine), Some(theirs)) => {
                let merged = mine
                    .intersection(theirs)
                    .ok_or_else(|| conflict("compiler", mine, theirs))?;
                self.compiler = Some(merged);
            }
            (None, Some(theirs)) => self.compiler = Some(theirs.clone()),
            _ => {}
        }

        for (name, theirs) in &other.variants {
            match self.variants.get(name) {
                Some(mine) => {
                    let merged = mine
                        .merge(theirs)
                        .ok_or_else(|| conflict(&format!("variant {name}"), mine, theirs))?;
                    self.variants.insert(name.clone(), merged);
                }
                None => {
                    self.variants.insert(name.clone(), theirs.clone());
                }
            }
        }

        let arch_before = self.arch.clone();
        self.arch
            .constrain(&other.arch)
            .map_err(|field| conflict(field, &arch_before, &other.arch))?;

        match (&self.hash, &other.hash) {
            (Some(mine), Some(theirs)) => {
                if theirs.starts_with(mine.as_str()) {
                    self.hash = Some(theirs.clone());
                } else if !mine.starts_with(theirs.as_str()) {
                    return Err(conflict("hash", mine, theirs));
                }
            }
            (None, Some(theirs)) => self.hash = Some(theirs.clone()),
            _ => {}
        }

        Ok(())
    }

    /// This spec without its dependency clauses
    #[must_use]
    pub fn without_dependencies(&self) -> Self {
        Self {
            dependencies: BTreeMap::new(),
            ..self.clone()
        }
    }

    /// Render own fields in spec notation, without `^` clauses
    pub(crate) fn fmt_node(&self, f: &mut impl fmt::Write) -> fmt::Result {
        let mut out = String::new();
        if let Some(name) = &self.name {
            out.push_str(name);
        }
        if !self.versions.is_any() {
            out.push('@');
            out.push_str(&self.versions.to_string());
        }
        if let Some(compiler) = &self.compiler {
            out.push('%');
            out.push_str(&compiler.to_string());
        }
        out.push_str(&format_variants(&self.variants));
        if !self.arch.is_empty() {
            out.push_str(" arch=");
            out.push_str(&self.arch.to_string());
        }
        if let Some(hash) = &self.hash {
            out.push_str(" /");
            out.push_str(hash);
        }
        f.write_str(out.trim_start())
    }
}

fn conflict(field: &str, mine: &dyn fmt::Display, theirs: &dyn fmt::Display) -> Conflict {
    Conflict {
        field: field.to_string(),
        detail: format!("{mine} vs {theirs}"),
    }
}

impl fmt::Display for Spec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_node(f)?;
        for dep in self.dependencies.values() {
            f.write_str(" ^")?;
            dep.fmt_node(f)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for Spec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn spec(text: &str) -> Spec {
        Spec::parse(text).unwrap()
    }

    #[test]
    fn test_strict_versus_loose() {
        let narrow = spec("foo@1.2");
        let wide = spec("foo@1:2");
        assert!(narrow.satisfies(&wide, true));
        assert!(!wide.satisfies(&narrow, true));
        assert!(wide.satisfies(&narrow, false));
        assert!(!spec("foo").satisfies(&spec("+shared"), true));
        assert!(spec("foo").satisfies(&spec("+shared"), false));
    }

    #[test]
    fn test_anonymous_predicates() {
        let when = spec("+mpi");
        assert!(spec("hdf5+mpi").satisfies(&when, true));
        assert!(!spec("hdf5~mpi").satisfies(&when, false));
        assert!(spec("root cxxstd=17").satisfies(&spec("cxxstd=17"), true));
        assert!(!spec("root cxxstd=11").satisfies(&spec("cxxstd=17"), false));
        assert!(spec("foo%intel@19").satisfies(&spec("%intel"), true));
    }

    #[test]
    fn test_dependency_clauses() {
        let full = spec("app ^mpich@3.2 ^zlib");
        assert!(full.satisfies(&spec("app ^mpich@3:"), true));
        assert!(!full.satisfies(&spec("app ^openmpi"), true));
        assert!(full.satisfies(&spec("app ^openmpi"), false));
    }

    #[test]
    fn test_constrain_reports_field() {
        let mut a = spec("foo@1.0:2.0+shared");
        assert_eq!(a.constrain(&spec("foo@1.5:")), Ok(true));
        assert_eq!(a.to_string(), "foo@1.5:2.0+shared");
        assert_eq!(a.constrain(&spec("foo@1.5:")), Ok(false));

        let err = a.constrain(&spec("foo~shared")).unwrap_err();
        assert_eq!(err.field, "variant shared");
        let err = a.constrain(&spec("foo@3.0")).unwrap_err();
        assert_eq!(err.field, "version");
        assert_eq!(a.to_string(), "foo@1.5:2.0+shared");

        let mut b = spec("x arch=linux--");
        assert_eq!(b.constrain(&spec("x arch=darwin--")).unwrap_err().field, "platform");
    }

    #[test]
    fn test_intersects() {
        assert!(spec("foo@1.0:").intersects(&spec("foo@:1.5")));
        assert!(!spec("foo").intersects(&spec("bar")));
        assert!(!spec("foo%gcc").intersects(&spec("foo%intel")));
        assert!(spec("foo /abc").intersects(&spec("foo /abcdef")));
    }

    #[test]
    fn test_display_round_trips() {
        for text in [
            "foo",
            "foo@1.2:1.4%gcc@9:~debug+shared cxxstd=17 arch=linux-ubuntu22-x86_64 ^bar@2.0 ^baz+mpi",
            "+mpi",
            "%intel",
            "cxxstd=17",
            "foo /abcdef1",
        ] {
            assert_eq!(spec(text).to_string(), text);
        }
    }

    #[test]
    fn test_parse_rejects_multiple() {
        assert!(Spec::parse("foo bar").is_err());
        assert!(Spec::parse("").is_err());
    }

    #[test]
    fn test_capability_clause_checks_provided_range() {
        let mpich = spec("mpich@4.1%gcc@12.2.0+shared");
        let provides = [spec("mpi@:4")];
        assert!(mpich.satisfies_capability(&provides, &spec("mpi@3:")));
        assert!(mpich.satisfies_capability(&provides, &spec("mpi+shared")));
        assert!(!mpich.satisfies_capability(&provides, &spec("mpi@5:")));
        assert!(!mpich.satisfies_capability(&provides, &spec("mpi%intel")));
        assert!(!mpich.satisfies_capability(&provides, &spec("blas")));
        assert!(mpich.satisfies_capability(&[], &spec("mpich@4:")));
    }

    fn versions() -> impl Strategy<Value = String> {
        let version = "[1-3](\\.[0-3]){0,2}";
        prop_oneof![
            version.prop_map(|v| format!("@{v}")),
            version.prop_map(|v| format!("@:{v}")),
            version.prop_map(|v| format!("@{v}:")),
            (version, version).prop_map(|(lo, hi)| format!("@{lo}:{hi}")),
            Just(String::new()),
        ]
    }

    fn spec_text() -> impl Strategy<Value = String> {
        (
            versions(),
            prop_oneof![Just(""), Just("%gcc"), Just("%intel")],
            versions(),
            prop_oneof![Just(""), Just("+shared"), Just("~shared")],
            prop_oneof![Just(""), Just(" cxxstd=11"), Just(" cxxstd=17")],
            prop_oneof![Just(""), Just(" arch=linux--"), Just(" arch=-centos7-")],
            prop_oneof![Just(String::new()), versions().prop_map(|v| format!(" ^zlib{v}"))],
        )
            .prop_map(|(v, compiler, cv, shared, std, arch, dep)| {
                let compiler = if compiler.is_empty() {
                    String::new()
                } else {
                    format!("{compiler}{cv}")
                };
                format!("foo{v}{compiler}{shared}{std}{arch}{dep}")
            })
    }

    proptest! {
        #[test]
        fn prop_constrain_satisfies_both(a in spec_text(), b in spec_text()) {
            let (a, b) = (spec(&a), spec(&b));
            let mut merged = a.clone();
            if merged.constrain(&b).is_ok() {
                prop_assert!(merged.satisfies(&a, true), "{} does not satisfy {}", merged, a);
                prop_assert!(merged.satisfies(&b, true), "{} does not satisfy {}", merged, b);
            } else {
                prop_assert_eq!(merged, a);
            }
        }
    }
}
