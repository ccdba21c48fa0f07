//! Version and constraint parsing error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum VersionError {
    #[error("invalid version: {input}")]
    InvalidVersion { input: String },

    #[error("invalid version constraint: {input}")]
    InvalidConstraint { input: String },

    #[error("version segment out of range: {segment}")]
    SegmentOverflow { segment: String },
}

impl UserFacingError for VersionError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::InvalidVersion { .. } | Self::SegmentOverflow { .. } => {
                Some("Versions are dotted segments of digits and letters, such as 1.2.3 or 10.03.p03.")
            }
            Self::InvalidConstraint { .. } => {
                Some("Use exact versions (1.2), ranges (1.2:1.4, :1.4, 1.2:) or comma-separated lists.")
            }
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::InvalidVersion { .. } => "version.invalid_version",
            Self::InvalidConstraint { .. } => "version.invalid_constraint",
            Self::SegmentOverflow { .. } => "version.segment_overflow",
        };
        Some(code)
    }
}
