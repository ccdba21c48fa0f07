//! Spec text parse errors

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

/// A malformed spec string.
///
/// `offset` is the character column of the offending token within `input`,
/// so callers can point at it with [`ParseError::diagnostic`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[error("{message} (column {offset})")]
pub struct ParseError {
    pub message: String,
    pub input: String,
    pub offset: usize,
}

impl ParseError {
    /// Create a parse error for `input` at `offset`
    pub fn new(message: impl Into<String>, input: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            input: input.into(),
            offset,
        }
    }

    /// Render the message, the input and a `^` marker under the error column
    #[must_use]
    pub fn diagnostic(&self) -> String {
        format!(
            "{}\n{}\n{}^",
            self.message,
            self.input,
            " ".repeat(self.offset)
        )
    }
}

impl UserFacingError for ParseError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.diagnostic())
    }

    fn user_hint(&self) -> Option<&'static str> {
        Some("Specs look like `name@1.2:1.4%gcc@9 +variant key=value arch=platform-os-target ^dep`.")
    }

    fn user_code(&self) -> Option<&'static str> {
        Some("parse.invalid_spec")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_marks_column() {
        let err = ParseError::new("unexpected character '!'", "foo@1.0 !bar", 8);
        assert_eq!(
            err.diagnostic(),
            "unexpected character '!'\nfoo@1.0 !bar\n        ^"
        );
    }
}
