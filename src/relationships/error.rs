//! Error types for relationship detection

use thiserror::Error;

/// Errors that can occur during relationship detection
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RelationshipError {
    /// Detection was requested over an empty schema set
    #[error("No schemas provided for relationship detection")]
    NoSchemas,

    /// A strategy could not complete
    #[error("Strategy '{strategy}' failed: {message}")]
    StrategyFailed { strategy: String, message: String },

    /// Input too large for a bounded strategy
    #[error("Strategy '{strategy}' skipped: {count} {what} exceeds the limit of {limit}")]
    LimitExceeded {
        strategy: String,
        what: &'static str,
        count: usize,
        limit: usize,
    },

    /// Invalid detection options
    #[error("Invalid detection options: {0}")]
    InvalidOptions(String),
}

/// Result type for relationship detection
pub type RelationshipResult<T> = Result<T, RelationshipError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RelationshipError::NoSchemas;
        assert!(err.to_string().contains("No schemas"));

        let err = RelationshipError::LimitExceeded {
            strategy: "structural_similarity".to_string(),
            what: "schemas",
            count: 300,
            limit: 200,
        };
        assert_eq!(
            err.to_string(),
            "Strategy 'structural_similarity' skipped: 300 schemas exceeds the limit of 200"
        );
    }
}
