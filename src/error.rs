//! Top-level error type

use thiserror::Error;

use crate::formats::ParseError;
use crate::relationships::RelationshipError;

/// Errors that make a requested discovery operation impossible
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// The format registry has no parsers
    #[error("No format parsers registered")]
    NoParsers,

    /// Content did not match any registered format with enough confidence
    #[error(
        "Unknown format for {}: best confidence {confidence:.2}",
        .filename.as_deref().unwrap_or("<content>")
    )]
    UnknownFormat {
        filename: Option<String>,
        confidence: f64,
    },

    /// A format id was requested that no parser provides
    #[error("Unknown format id: {0}")]
    UnknownFormatId(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Parse error
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Relationship detection error
    #[error(transparent)]
    Relationship(#[from] RelationshipError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for discovery operations
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DiscoveryError::UnknownFormat {
            filename: Some("data.bin".to_string()),
            confidence: 0.25,
        };
        assert_eq!(err.to_string(), "Unknown format for data.bin: best confidence 0.25");

        let err = DiscoveryError::UnknownFormatId("cobol".to_string());
        assert!(err.to_string().contains("cobol"));

        let err: DiscoveryError = ParseError::Empty("json".to_string()).into();
        assert!(err.to_string().contains("Empty json"));
    }
}
