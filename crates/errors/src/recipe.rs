//! Recipe catalog error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum RecipeError {
    #[error("unknown package: {name}")]
    UnknownPackage { name: String },

    #[error("invalid recipe for {package}: {message}")]
    InvalidRecipe { package: String, message: String },

    #[error("duplicate recipe: {name}")]
    DuplicatePackage { name: String },
}

impl UserFacingError for RecipeError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::UnknownPackage { .. } => Some("Check the package name against the recipe catalog."),
            Self::InvalidRecipe { .. } => Some("Fix the recipe declaration noted in the error message."),
            Self::DuplicatePackage { .. } => Some("Remove one of the recipes declaring this package."),
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::UnknownPackage { .. } => "recipe.unknown_package",
            Self::InvalidRecipe { .. } => "recipe.invalid_recipe",
            Self::DuplicatePackage { .. } => "recipe.duplicate_package",
        };
        Some(code)
    }
}
