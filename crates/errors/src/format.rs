//! Format-string error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum FormatError {
    #[error("unknown format token '{token}' at offset {offset}")]
    UnknownToken { token: String, offset: usize },

    #[error("unterminated format token at offset {offset}")]
    Unterminated { offset: usize },
}

impl UserFacingError for FormatError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        Some("Valid tokens: $_ $@ $% $%@ $+ $= $# $/ $$ and ${PACKAGE} ${VERSION} ${HASH:n}.")
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::UnknownToken { .. } => "format.unknown_token",
            Self::Unterminated { .. } => "format.unterminated",
        };
        Some(code)
    }
}
