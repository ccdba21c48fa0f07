//! Concretization error types
//!
//! Every variant carries the path from the requested root to the node that
//! failed, so the caller can point at the offending dependency.

use std::borrow::Cow;
use std::fmt;

use crate::UserFacingError;
use thiserror::Error;

/// Chain of package names from the root of a request to a node
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpecPath(pub Vec<String>);

impl SpecPath {
    /// Path consisting of the root only
    pub fn root(name: impl Into<String>) -> Self {
        Self(vec![name.into()])
    }

    /// Extend the path by one hop
    #[must_use]
    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut hops = self.0.clone();
        hops.push(name.into());
        Self(hops)
    }

    /// Name of the node the path ends at
    #[must_use]
    pub fn leaf(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }
}

impl fmt::Display for SpecPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" -> "))
    }
}

/// A provider that was tried for a virtual dependency and discarded
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RejectedProvider {
    pub provider: String,
    pub reason: String,
}

impl fmt::Display for RejectedProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.provider, self.reason)
    }
}

fn list_rejected(rejected: &[RejectedProvider]) -> String {
    if rejected.is_empty() {
        "no candidates".to_string()
    } else {
        rejected
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum ConcretizeError {
    #[error("no version of {package} satisfies @{constraint} (at {path}); known versions: {known}")]
    NoVersionSatisfiesConstraint {
        package: String,
        constraint: String,
        known: String,
        path: SpecPath,
    },

    #[error("variant {variant}={value} is not allowed for {package} (at {path}): {reason}")]
    VariantValueNotAllowed {
        package: String,
        variant: String,
        value: String,
        reason: String,
        path: SpecPath,
    },

    #[error("package {package} has no variant named {variant} (at {path})")]
    UnknownVariant {
        package: String,
        variant: String,
        path: SpecPath,
    },

    #[error("{package} conflicts with its configuration %{compiler} arch={arch} (at {path}): {rule}")]
    CompilerArchConflict {
        package: String,
        compiler: String,
        arch: String,
        rule: String,
        path: SpecPath,
    },

    #[error("no configured compiler satisfies %{constraint} for {package} (at {path})")]
    UnavailableCompiler {
        package: String,
        constraint: String,
        path: SpecPath,
    },

    #[error("conflicting constraints on {package} reached via {first} and {second}: {reason}")]
    DiamondConflict {
        package: String,
        first: SpecPath,
        second: SpecPath,
        reason: String,
    },

    #[error("no provider available for virtual {capability} (at {path}): {}", list_rejected(.rejected))]
    NoProviderAvailable {
        capability: String,
        path: SpecPath,
        rejected: Vec<RejectedProvider>,
    },

    #[error("dependency cycle: {cycle}")]
    StaticDependencyCycle { cycle: SpecPath },
}

impl ConcretizeError {
    /// Path of the node the failure is attributed to
    #[must_use]
    pub fn path(&self) -> &SpecPath {
        match self {
            Self::NoVersionSatisfiesConstraint { path, .. }
            | Self::VariantValueNotAllowed { path, .. }
            | Self::UnknownVariant { path, .. }
            | Self::CompilerArchConflict { path, .. }
            | Self::UnavailableCompiler { path, .. }
            | Self::NoProviderAvailable { path, .. } => path,
            Self::DiamondConflict { second, .. } => second,
            Self::StaticDependencyCycle { cycle } => cycle,
        }
    }
}

impl UserFacingError for ConcretizeError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::NoVersionSatisfiesConstraint { .. } => {
                Some("Relax the version requirement or add the version to the recipe.")
            }
            Self::VariantValueNotAllowed { .. } | Self::UnknownVariant { .. } => {
                Some("Check the variants the recipe declares and their allowed values.")
            }
            Self::CompilerArchConflict { .. } => {
                Some("Pick a different compiler, target, or variant combination.")
            }
            Self::UnavailableCompiler { .. } => Some("Add a matching compiler to the configuration."),
            Self::DiamondConflict { .. } => {
                Some("Two dependents disagree on this package; constrain one of them explicitly.")
            }
            Self::NoProviderAvailable { .. } => {
                Some("Request a specific provider with ^name or configure provider preferences.")
            }
            Self::StaticDependencyCycle { .. } => Some("Break the cycle in the recipe dependency rules."),
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::NoVersionSatisfiesConstraint { .. } => "concretize.no_version",
            Self::VariantValueNotAllowed { .. } => "concretize.variant_value",
            Self::UnknownVariant { .. } => "concretize.unknown_variant",
            Self::CompilerArchConflict { .. } => "concretize.compiler_arch_conflict",
            Self::UnavailableCompiler { .. } => "concretize.unavailable_compiler",
            Self::DiamondConflict { .. } => "concretize.diamond_conflict",
            Self::NoProviderAvailable { .. } => "concretize.no_provider",
            Self::StaticDependencyCycle { .. } => "concretize.dependency_cycle",
        };
        Some(code)
    }
}
