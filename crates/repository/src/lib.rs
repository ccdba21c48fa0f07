#![warn(mismatched_lifetime_syntaxes)]
#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Package recipe catalog
//!
//! The resolver only sees recipes through [`RecipeProvider`]. This crate
//! provides the recipe model, an in-memory catalog and a loader for
//! directories of TOML recipe files.

mod loader;
pub mod memory;
pub mod provider;
pub mod recipe;

pub use memory::InMemoryRepository;
pub use provider::RecipeProvider;
pub use recipe::{
    ConflictRule, DependencyRule, PackageRecipe, ProviderRule, ProvidesRule, RecipeBuilder,
};
