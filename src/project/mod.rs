//! Minimal build driver: manifest parsing and package-order resolution.
//!
//! The driver is deliberately interface-thin: it resolves inter-package
//! dependency order and runs the front end (lex, parse, expand) on each
//! package's root source. There is no code generation, no registry, and no
//! incremental recompilation.

pub mod build;
pub mod manifest;

pub use build::{build_order, find_project_root, run_front_end, BuildError, ParsedCrate};
pub use manifest::{DependencySpec, Manifest, Package};
