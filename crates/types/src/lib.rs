#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for the spackle resolver
//!
//! This crate provides the value types every other crate builds on:
//! versions and version lists, variants, compilers, architectures and
//! dependency types.

pub mod arch;
pub mod compiler;
pub mod deptypes;
pub mod variant;
pub mod version;

// Re-export commonly used types
pub use arch::{Arch, ArchSpec};
pub use compiler::{Compiler, CompilerSpec};
pub use deptypes::DepTypes;
pub use variant::{format_variants, AllowedValues, VariantDeclaration, VariantValue};
pub use version::{Version, VersionItem, VersionList, VersionRange};

use serde::{Deserialize, Serialize};

/// Color output choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorChoice {
    Always,
    #[default]
    Auto,
    Never,
}

impl std::str::FromStr for ColorChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "always" => Ok(Self::Always),
            "auto" => Ok(Self::Auto),
            "never" => Ok(Self::Never),
            other => Err(format!("invalid color choice '{other}'")),
        }
    }
}
