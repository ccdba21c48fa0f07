//! Architecture triplets: `platform-os-target`

use serde::{Deserialize, Serialize};
use std::fmt;

/// A partial architecture; unset fields are unconstrained
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArchSpec {
    pub platform: Option<String>,
    pub os: Option<String>,
    pub target: Option<String>,
}

impl ArchSpec {
    /// Parse `platform-os-target`, where any field may be empty
    ///
    /// Returns `None` unless the text has exactly three fields.
    #[must_use]
    pub fn from_triplet(text: &str) -> Option<Self> {
        let mut parts = text.split('-');
        let field = |s: Option<&str>| s.filter(|s| !s.is_empty()).map(str::to_string);
        let (platform, os, target) = (parts.next(), parts.next(), parts.next());
        if target.is_none() || parts.next().is_some() {
            return None;
        }
        Some(Self {
            platform: field(platform),
            os: field(os),
            target: field(target),
        })
    }

    /// True when no field is constrained
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.platform.is_none() && self.os.is_none() && self.target.is_none()
    }

    fn fields(&self) -> [(&'static str, Option<&String>); 3] {
        [
            ("platform", self.platform.as_ref()),
            ("os", self.os.as_ref()),
            ("target", self.target.as_ref()),
        ]
    }

    /// Whether a concrete architecture matches every set field
    #[must_use]
    pub fn satisfied_by(&self, arch: &Arch) -> bool {
        self.satisfies(&arch.to_spec(), false)
    }

    /// Whether every field `other` sets is matched here
    ///
    /// Strictly, the field must also be set here; otherwise an unset field
    /// could still take the required value.
    #[must_use]
    pub fn satisfies(&self, other: &Self, strict: bool) -> bool {
        self.fields()
            .iter()
            .zip(other.fields())
            .all(|((_, mine), (_, theirs))| match (mine, theirs) {
                (_, None) => true,
                (Some(a), Some(b)) => *a == b,
                (None, Some(_)) => !strict,
            })
    }

    /// Merge `other` into `self`
    ///
    /// # Errors
    ///
    /// Returns the name of the first field set differently on both sides.
    pub fn constrain(&mut self, other: &Self) -> Result<(), &'static str> {
        for ((name, mine), (_, theirs)) in self.fields().into_iter().zip(other.fields()) {
            if let (Some(a), Some(b)) = (mine, theirs) {
                if a != b {
                    return Err(name);
                }
            }
        }
        if self.platform.is_none() {
            self.platform.clone_from(&other.platform);
        }
        if self.os.is_none() {
            self.os.clone_from(&other.os);
        }
        if self.target.is_none() {
            self.target.clone_from(&other.target);
        }
        Ok(())
    }
}

impl fmt::Display for ArchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = |s: &Option<String>| s.clone().unwrap_or_default();
        write!(
            f,
            "{}-{}-{}",
            field(&self.platform),
            field(&self.os),
            field(&self.target)
        )
    }
}

/// A fully specified architecture
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Arch {
    pub platform: String,
    pub os: String,
    pub target: String,
}

impl Arch {
    pub fn new(platform: impl Into<String>, os: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            os: os.into(),
            target: target.into(),
        }
    }

    #[must_use]
    pub fn to_spec(&self) -> ArchSpec {
        ArchSpec {
            platform: Some(self.platform.clone()),
            os: Some(self.os.clone()),
            target: Some(self.target.clone()),
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.platform, self.os, self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triplet_with_empty_fields() {
        let spec = ArchSpec::from_triplet("linux--x86_64").unwrap();
        assert_eq!(spec.platform.as_deref(), Some("linux"));
        assert_eq!(spec.os, None);
        assert_eq!(spec.target.as_deref(), Some("x86_64"));
        assert_eq!(spec.to_string(), "linux--x86_64");
        assert!(ArchSpec::from_triplet("linux-x86_64").is_none());
        assert!(ArchSpec::from_triplet("a-b-c-d").is_none());
        assert!(ArchSpec::from_triplet("--").unwrap().is_empty());
    }

    #[test]
    fn test_constrain_reports_field() {
        let mut spec = ArchSpec::from_triplet("linux--").unwrap();
        spec.constrain(&ArchSpec::from_triplet("-ubuntu22-").unwrap())
            .unwrap();
        assert_eq!(spec.to_string(), "linux-ubuntu22-");
        let err = spec
            .constrain(&ArchSpec::from_triplet("darwin--").unwrap())
            .unwrap_err();
        assert_eq!(err, "platform");
    }

    #[test]
    fn test_satisfies() {
        let arch = Arch::new("linux", "ubuntu22", "x86_64");
        let partial = ArchSpec::from_triplet("--x86_64").unwrap();
        assert!(partial.satisfied_by(&arch));
        assert!(!ArchSpec::from_triplet("--aarch64").unwrap().satisfied_by(&arch));
        assert!(!ArchSpec::default().satisfies(&partial, true));
        assert!(ArchSpec::default().satisfies(&partial, false));
    }
}
