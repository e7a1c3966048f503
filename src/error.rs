//! Error types for the test generation pipeline.

use thiserror::Error;

/// Error type for test expansion and emission failures.
///
/// Every malformed-input condition (bad directive syntax, bad `variants`
/// shape, invalid `size`, conflicting reference fields, unknown canvas
/// types, missing directory mapping, duplicate test registration) is a
/// `Definition` error; the generator aborts the run on the first one.
#[derive(Debug, Error)]
pub enum GenError {
    /// The test definition itself is malformed.
    #[error("invalid test definition: {0}")]
    Definition(String),

    /// Template syntax or rendering failure.
    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),

    /// Fixed-point rendering did not stabilize within the pass limit.
    #[error("template rendering did not converge after {0} passes")]
    NonConvergence(usize),

    /// A directive marker survived the rewrite chain. This is a bug in the
    /// expander, not in the test definition.
    #[error("unexpanded directive remains in code near: {0}")]
    UnexpandedDirective(String),

    /// YAML parse failure in a definition or mapping file.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image encoding error while writing an expected PNG.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

impl GenError {
    /// Shorthand for building a `Definition` error from any message.
    pub fn definition(msg: impl Into<String>) -> Self {
        GenError::Definition(msg.into())
    }
}
