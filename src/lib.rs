//! Canvasgen - Library for expanding declarative canvas test definitions
//! into standalone browser conformance test files.
//!
//! This library provides functionality to:
//! - Expand shorthand `@` directives in test code into executable statements
//! - Expand variant dimensions into a cross-product of concrete tests
//! - Render page templates to a fixed point so parameters can reference
//!   each other transitively
//! - Emit one output file per hosting context and test kind, guarded by a
//!   uniqueness registry

pub mod cli;
pub mod directives;
pub mod error;
pub mod finalize;
pub mod generator;
pub mod models;
pub mod output;
pub mod raster;
pub mod registry;
pub mod template;
pub mod variants;
