//! Build variants
//!
//! A variant is a named build option. Boolean variants are written `+name`
//! or `~name`; valued variants `name=value` or `name=v1,v2` when the
//! variant accepts several values at once.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A value assigned to a variant
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariantValue {
    Bool(bool),
    Values(BTreeSet<String>),
}

impl VariantValue {
    /// A single string value
    pub fn single(value: impl Into<String>) -> Self {
        Self::Values(BTreeSet::from([value.into()]))
    }

    /// A value set from several strings
    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Values(values.into_iter().map(Into::into).collect())
    }

    /// Interpret `true` / `false` spelled as a value
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Values(set) if set.len() == 1 => match set.iter().next().map(String::as_str) {
                Some("true") => Some(true),
                Some("false") => Some(false),
                _ => None,
            },
            Self::Values(_) => None,
        }
    }

    /// The value as text: `true`/`false`, or sorted values joined by commas
    #[must_use]
    pub fn canonical(&self) -> String {
        match self.as_bool() {
            Some(b) => b.to_string(),
            None => match self {
                Self::Values(set) => set.iter().cloned().collect::<Vec<_>>().join(","),
                Self::Bool(b) => b.to_string(),
            },
        }
    }

    /// Whether `self` provides everything `other` asks for
    ///
    /// Booleans must match; a value set must contain every requested value.
    #[must_use]
    pub fn satisfies(&self, other: &Self) -> bool {
        match (self.as_bool(), other.as_bool()) {
            (Some(a), Some(b)) => a == b,
            (None, None) => match (self, other) {
                (Self::Values(mine), Self::Values(theirs)) => theirs.is_subset(mine),
                _ => false,
            },
            _ => false,
        }
    }

    /// Combine two requirements, or `None` when they cannot both hold
    ///
    /// Value sets are compatible when one contains the other; the larger
    /// one wins.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Option<Self> {
        if self.satisfies(other) {
            Some(self.clone())
        } else if other.satisfies(self) {
            Some(other.clone())
        } else {
            None
        }
    }
}

impl fmt::Display for VariantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// Values a variant may take
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllowedValues {
    Bool,
    Values(BTreeSet<String>),
    Any,
}

/// A variant as declared by a package recipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantDeclaration {
    pub name: String,
    pub default: VariantValue,
    pub allowed: AllowedValues,
    #[serde(default)]
    pub multi: bool,
    #[serde(default)]
    pub description: String,
}

impl VariantDeclaration {
    /// A `+name` / `~name` switch
    pub fn boolean(name: impl Into<String>, default: bool) -> Self {
        Self {
            name: name.into(),
            default: VariantValue::Bool(default),
            allowed: AllowedValues::Bool,
            multi: false,
            description: String::new(),
        }
    }

    /// A variant taking exactly one of `allowed`
    pub fn single(name: impl Into<String>, default: &str, allowed: &[&str]) -> Self {
        Self {
            name: name.into(),
            default: VariantValue::single(default),
            allowed: AllowedValues::Values(allowed.iter().map(|s| (*s).to_string()).collect()),
            multi: false,
            description: String::new(),
        }
    }

    /// A variant taking any subset of `allowed`
    pub fn multi(name: impl Into<String>, defaults: &[&str], allowed: &[&str]) -> Self {
        Self {
            name: name.into(),
            default: VariantValue::from_values(defaults.iter().copied()),
            allowed: AllowedValues::Values(allowed.iter().map(|s| (*s).to_string()).collect()),
            multi: true,
            description: String::new(),
        }
    }

    /// Attach a description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Whether this is a boolean switch
    #[must_use]
    pub fn is_bool(&self) -> bool {
        matches!(self.allowed, AllowedValues::Bool)
    }

    /// Check a requested value against the declaration
    ///
    /// Returns the value in canonical form (`x=true` becomes `+x` for
    /// boolean variants).
    ///
    /// # Errors
    ///
    /// Returns the reason the value is rejected.
    pub fn validate(&self, value: &VariantValue) -> Result<VariantValue, String> {
        match &self.allowed {
            AllowedValues::Bool => value.as_bool().map(VariantValue::Bool).ok_or_else(|| {
                format!("'{}' is a boolean variant, expected true or false", self.name)
            }),
            AllowedValues::Values(allowed) => {
                let values = Self::as_values(value);
                self.check_count(&values)?;
                if let Some(bad) = values.iter().find(|v| !allowed.contains(*v)) {
                    let allowed: Vec<_> = allowed.iter().map(String::as_str).collect();
                    return Err(format!("'{bad}' is not one of: {}", allowed.join(", ")));
                }
                Ok(VariantValue::Values(values))
            }
            AllowedValues::Any => {
                let values = Self::as_values(value);
                self.check_count(&values)?;
                Ok(VariantValue::Values(values))
            }
        }
    }

    // `x=true` on a valued variant arrives as a switch
    fn as_values(value: &VariantValue) -> BTreeSet<String> {
        match value {
            VariantValue::Bool(b) => BTreeSet::from([b.to_string()]),
            VariantValue::Values(values) => values.clone(),
        }
    }

    fn check_count(&self, values: &BTreeSet<String>) -> Result<(), String> {
        if values.is_empty() {
            return Err(format!("'{}' needs at least one value", self.name));
        }
        if !self.multi && values.len() > 1 {
            return Err(format!("'{}' accepts only one value", self.name));
        }
        Ok(())
    }
}

/// Render a variant map in spec notation
///
/// Switches come first and are written contiguously (`+a~b`); valued
/// variants follow, each preceded by a space (` k=v1,v2`).
#[must_use]
pub fn format_variants(variants: &BTreeMap<String, VariantValue>) -> String {
    let mut switches = String::new();
    let mut valued = String::new();
    for (name, value) in variants {
        match value.as_bool() {
            Some(true) => {
                switches.push('+');
                switches.push_str(name);
            }
            Some(false) => {
                switches.push('~');
                switches.push_str(name);
            }
            None => {
                valued.push(' ');
                valued.push_str(name);
                valued.push('=');
                valued.push_str(&value.canonical());
            }
        }
    }
    switches + &valued
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_spelled_as_value() {
        let decl = VariantDeclaration::boolean("shared", true);
        assert_eq!(
            decl.validate(&VariantValue::single("false")),
            Ok(VariantValue::Bool(false))
        );
        assert!(decl.validate(&VariantValue::single("yes")).is_err());
    }

    #[test]
    fn test_single_valued_rejects_many() {
        let decl = VariantDeclaration::single("cxxstd", "11", &["11", "14", "17"]);
        assert!(decl.validate(&VariantValue::single("17")).is_ok());
        let err = decl
            .validate(&VariantValue::from_values(["11", "17"]))
            .unwrap_err();
        assert!(err.contains("only one value"));
        let err = decl.validate(&VariantValue::single("20")).unwrap_err();
        assert!(err.contains("'20' is not one of"));
        assert!(decl.validate(&VariantValue::Bool(true)).is_err());

        let any = VariantDeclaration {
            allowed: AllowedValues::Any,
            ..VariantDeclaration::single("tag", "x", &[])
        };
        assert_eq!(
            any.validate(&VariantValue::single("anything")),
            Ok(VariantValue::single("anything"))
        );
    }

    #[test]
    fn test_multi_valued() {
        let decl = VariantDeclaration::multi("languages", &["c"], &["c", "cxx", "fortran"]);
        assert!(decl
            .validate(&VariantValue::from_values(["c", "fortran"]))
            .is_ok());
        assert_eq!(decl.default.canonical(), "c");
    }

    #[test]
    fn test_satisfies_and_merge() {
        let both = VariantValue::from_values(["c", "cxx"]);
        let c = VariantValue::single("c");
        assert!(both.satisfies(&c));
        assert!(!c.satisfies(&both));
        assert_eq!(c.merge(&both), Some(both.clone()));
        assert_eq!(
            VariantValue::single("11").merge(&VariantValue::single("17")),
            None
        );
        // Overlap is not enough; one set must contain the other
        let partial = VariantValue::from_values(["cxx", "fortran"]);
        assert_eq!(both.merge(&partial), None);
        assert!(VariantValue::Bool(true).satisfies(&VariantValue::single("true")));
        assert!(!VariantValue::Bool(true).satisfies(&VariantValue::Bool(false)));
    }

    #[test]
    fn test_format_variants() {
        let variants = BTreeMap::from([
            ("shared".to_string(), VariantValue::Bool(true)),
            ("cxxstd".to_string(), VariantValue::single("17")),
            ("debug".to_string(), VariantValue::Bool(false)),
            ("langs".to_string(), VariantValue::from_values(["fortran", "c"])),
        ]);
        assert_eq!(
            format_variants(&variants),
            "~debug+shared cxxstd=17 langs=c,fortran"
        );
    }
}
