#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Spec representation for the spackle resolver
//!
//! Abstract specs describe what a user asks for; concrete specs describe
//! exactly what gets built. This crate parses and renders both.

pub mod concrete;
pub mod format;
pub mod parser;
pub mod spec;

pub use concrete::{ConcreteEdge, ConcreteNode, ConcreteSpec, ConcreteSpecBuilder, NodeData, NodeIndex};
pub use format::{render, tree, FormatFields, TreeOptions, DEFAULT_FORMAT};
pub use parser::parse_specs;
pub use spec::{Conflict, Spec};
