//! Error types for format parsing

use thiserror::Error;

/// Errors a format parser can report for malformed or unsupported input
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Content violates the format grammar
    #[error("{format} syntax error: {message}")]
    Syntax { format: String, message: String },

    /// Content is not valid text in a supported encoding
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Nothing to parse
    #[error("Empty {0} document")]
    Empty(String),

    /// Valid input using a feature this parser does not handle
    #[error("Unsupported {format} content: {message}")]
    Unsupported { format: String, message: String },

    /// Maximum depth exceeded
    #[error("Maximum nesting depth exceeded: {depth} > {max}")]
    MaxDepthExceeded { depth: usize, max: usize },
}

impl ParseError {
    pub fn syntax(format: &str, message: impl ToString) -> Self {
        ParseError::Syntax {
            format: format.to_string(),
            message: message.to_string(),
        }
    }

    pub fn unsupported(format: &str, message: impl ToString) -> Self {
        ParseError::Unsupported {
            format: format.to_string(),
            message: message.to_string(),
        }
    }
}

/// Result type for parse operations
pub type ParseResult<T> = Result<T, ParseError>;
