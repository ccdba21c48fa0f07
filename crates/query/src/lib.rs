#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Queries over installed concrete specs
//!
//! Matches abstract queries against a database of installed builds,
//! refuses to guess when a query is ambiguous, and renders collections of
//! specs grouped by architecture and compiler.

mod database;
mod display;
mod matcher;

pub use database::{InMemoryDatabase, SpecDatabase};
pub use display::{
    display_specs, elide_list, install_prefix, DisplayMode, DisplayOptions, INSTALL_LAYOUT,
};
pub use matcher::{disambiguate, distinguishing_prefix};
