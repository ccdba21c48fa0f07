//! Installed-spec query error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum QueryError {
    #[error("spec '{query}' matches no installed packages")]
    NoMatch { query: String },

    #[error("spec '{query}' matches multiple packages:\n  {}", .matches.join("\n  "))]
    Ambiguous { query: String, matches: Vec<String> },
}

impl UserFacingError for QueryError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::NoMatch { .. } => Some("List installed packages to see what is available."),
            Self::Ambiguous { .. } => Some("Use a more specific spec, or a /hash prefix."),
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::NoMatch { .. } => "query.no_match",
            Self::Ambiguous { .. } => "query.ambiguous",
        };
        Some(code)
    }
}
