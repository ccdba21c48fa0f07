//! Normalization error types

use std::borrow::Cow;

use crate::{SpecPath, UserFacingError};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum NormalizeError {
    #[error("unknown package {name} required by {path}")]
    UnknownPackage { name: String, path: SpecPath },

    #[error("{package} does not depend on {dependency}")]
    InvalidDependency { package: String, dependency: String },

    #[error("hash reference /{prefix} cannot be concretized; look it up in a database instead")]
    HashReference { prefix: String },
}

impl UserFacingError for NormalizeError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::UnknownPackage { .. } => Some("Add a recipe for the package or fix the dependency name."),
            Self::InvalidDependency { .. } => {
                Some("Only constrain dependencies that the requested package actually pulls in.")
            }
            Self::HashReference { .. } => Some("Use the installed-spec query interface for /hash lookups."),
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::UnknownPackage { .. } => "normalize.unknown_package",
            Self::InvalidDependency { .. } => "normalize.invalid_dependency",
            Self::HashReference { .. } => "normalize.hash_reference",
        };
        Some(code)
    }
}
