//! Hash decoding error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum HashError {
    #[error("invalid hex: {message}")]
    InvalidHex { message: String },

    #[error("hash must be {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("stored hash {stored} of {package} does not match its contents ({computed})")]
    Mismatch {
        package: String,
        stored: String,
        computed: String,
    },

    #[error("malformed concrete spec: {message}")]
    MalformedDag { message: String },
}

impl UserFacingError for HashError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::InvalidHex { .. } => "hash.invalid_hex",
            Self::InvalidLength { .. } => "hash.invalid_length",
            Self::Mismatch { .. } => "hash.mismatch",
            Self::MalformedDag { .. } => "hash.malformed_dag",
        };
        Some(code)
    }
}
