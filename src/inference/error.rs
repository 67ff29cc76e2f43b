//! Error types for type inference

use thiserror::Error;

/// Errors raised by a type enhancer
///
/// The engine absorbs these per enhancer; they never abort a schema.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    /// An enhancer could not process a field
    #[error("Enhancer '{enhancer}' failed on '{field}': {message}")]
    EnhancerFailed {
        enhancer: String,
        field: String,
        message: String,
    },

    /// Maximum depth exceeded
    #[error("Maximum nesting depth exceeded: {depth} > {max}")]
    MaxDepthExceeded { depth: usize, max: usize },

    /// A sample value could not be interpreted
    #[error("Invalid sample for '{field}': {message}")]
    InvalidSample { field: String, message: String },

    /// Enhancer removed evidence recorded by an earlier one
    #[error("Enhancer '{0}' removed existing confidence factors")]
    FactorsRemoved(String),

    /// Invalid configuration
    #[error("Invalid inference configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for type inference
pub type InferenceResult<T> = Result<T, InferenceError>;
